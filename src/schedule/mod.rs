pub mod closures;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::types::{LevelId, TemplateId};

pub use closures::{ClassCancellation, ClosureCalendar, Holiday, HolidayScope};

/// weekly class template
///
/// a template describes one recurring slot (e.g. mondays 09:00). an enrolment
/// holds one or more templates, and the scheduler expands them into dated
/// occurrences on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTemplate {
    pub id: TemplateId,
    /// weekday the class runs on, none for placeholder slots that never occur
    pub day_of_week: Option<Weekday>,
    /// first day the template is effective, none for always
    pub start_date: Option<DayKey>,
    /// last day the template is effective, none for open-ended
    pub end_date: Option<DayKey>,
    /// minutes after local midnight
    pub start_minute: u16,
    pub end_minute: u16,
    pub level_id: Option<LevelId>,
    pub capacity: u32,
}

impl ClassTemplate {
    /// open-ended weekly slot at the default morning time
    pub fn weekly(id: TemplateId, day_of_week: Weekday) -> Self {
        Self {
            id,
            day_of_week: Some(day_of_week),
            start_date: None,
            end_date: None,
            start_minute: 9 * 60,
            end_minute: 9 * 60 + 30,
            level_id: None,
            capacity: 8,
        }
    }

    pub fn with_bounds(mut self, start: Option<DayKey>, end: Option<DayKey>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_level(mut self, level_id: LevelId) -> Self {
        self.level_id = Some(level_id);
        self
    }

    /// whether an occurrence of this template falls on the given day
    pub fn runs_on(&self, day: DayKey) -> bool {
        let weekday = match self.day_of_week {
            Some(weekday) => weekday,
            None => return false,
        };
        if day.weekday() != weekday {
            return false;
        }
        if let Some(start) = self.start_date {
            if day < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if day > end {
                return false;
            }
        }
        true
    }
}

/// one dated class occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub template_id: TemplateId,
    pub day: DayKey,
}

/// date window occurrences are generated within
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceWindow {
    pub start: DayKey,
    /// inclusive end, none for unbounded walks capped by the horizon
    pub end: Option<DayKey>,
    /// hard cap for unbounded walks
    pub horizon: DayKey,
}

impl OccurrenceWindow {
    pub fn new(start: DayKey, horizon: DayKey) -> Self {
        Self {
            start,
            end: None,
            horizon,
        }
    }

    pub fn bounded(start: DayKey, end: DayKey) -> Self {
        Self {
            start,
            end: Some(end),
            horizon: end,
        }
    }

    /// last day the walk may visit
    pub fn last_day(&self) -> DayKey {
        match self.end {
            Some(end) if end < self.horizon => end,
            _ => self.horizon,
        }
    }
}

struct TemplateCursor<'a> {
    slot: &'a ClassTemplate,
    next: DayKey,
    last: DayKey,
}

/// lazy date-ordered walk over the occurrences of a set of templates
///
/// days the skip predicate matches are passed over without being yielded.
/// ties on the same day yield in template order, deterministically.
pub struct OccurrenceIter<'a, F>
where
    F: Fn(&ClassTemplate, DayKey) -> bool,
{
    cursors: Vec<TemplateCursor<'a>>,
    skip: F,
}

impl<'a, F> Iterator for OccurrenceIter<'a, F>
where
    F: Fn(&ClassTemplate, DayKey) -> bool,
{
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        loop {
            let mut chosen: Option<usize> = None;
            for (idx, cursor) in self.cursors.iter().enumerate() {
                let earlier = match chosen {
                    Some(best) => cursor.next < self.cursors[best].next,
                    None => true,
                };
                if earlier {
                    chosen = Some(idx);
                }
            }
            let idx = chosen?;

            let day = self.cursors[idx].next;
            let template = self.cursors[idx].slot;
            let template_id = template.id;
            let skipped = (self.skip)(template, day);

            // cursors only ever hold days within bounds
            let following = day.add_days(7);
            if following > self.cursors[idx].last {
                self.cursors.remove(idx);
            } else {
                self.cursors[idx].next = following;
            }

            if skipped {
                continue;
            }
            return Some(Occurrence { template_id, day });
        }
    }
}

/// walk the dated occurrences of `templates` within `window`, oldest first
pub fn occurrences<'a, F>(
    templates: &'a [ClassTemplate],
    window: OccurrenceWindow,
    skip: F,
) -> OccurrenceIter<'a, F>
where
    F: Fn(&ClassTemplate, DayKey) -> bool,
{
    let last_day = window.last_day();
    let mut cursors = Vec::with_capacity(templates.len());
    for template in templates {
        let weekday = match template.day_of_week {
            Some(weekday) => weekday,
            None => continue,
        };
        let mut earliest = window.start;
        if let Some(start) = template.start_date {
            if start > earliest {
                earliest = start;
            }
        }
        let mut last = last_day;
        if let Some(end) = template.end_date {
            if end < last {
                last = end;
            }
        }
        let first = earliest.next_on_or_after(weekday);
        if first > last {
            continue;
        }
        cursors.push(TemplateCursor {
            slot: template,
            next: first,
            last,
        });
    }
    OccurrenceIter { cursors, skip }
}

/// scheduled classes per week across a set of templates
pub fn weekly_frequency(templates: &[ClassTemplate]) -> u32 {
    templates.iter().filter(|t| t.day_of_week.is_some()).count() as u32
}
