use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::schedule::ClassTemplate;
use crate::types::{LevelId, TemplateId};

/// which classes a holiday closes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HolidayScope {
    /// whole centre closed
    Global,
    /// only the listed templates
    Templates(Vec<TemplateId>),
    /// only templates teaching the listed levels
    Levels(Vec<LevelId>),
}

/// inclusive closure period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub start: DayKey,
    pub end: DayKey,
    pub scope: HolidayScope,
}

impl Holiday {
    pub fn global(name: &str, start: DayKey, end: DayKey) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
            scope: HolidayScope::Global,
        }
    }

    pub fn for_templates(name: &str, start: DayKey, end: DayKey, templates: Vec<TemplateId>) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
            scope: HolidayScope::Templates(templates),
        }
    }

    pub fn for_levels(name: &str, start: DayKey, end: DayKey, levels: Vec<LevelId>) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
            scope: HolidayScope::Levels(levels),
        }
    }

    pub fn contains(&self, day: DayKey) -> bool {
        day >= self.start && day <= self.end
    }

    pub fn applies_to(&self, template: &ClassTemplate) -> bool {
        match &self.scope {
            HolidayScope::Global => true,
            HolidayScope::Templates(ids) => ids.contains(&template.id),
            HolidayScope::Levels(levels) => match template.level_id {
                Some(level) => levels.contains(&level),
                None => false,
            },
        }
    }
}

/// one-off cancellation of a single dated class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCancellation {
    pub template_id: TemplateId,
    pub day: DayKey,
    pub reason: String,
}

/// holidays and cancellations that suppress scheduled occurrences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosureCalendar {
    pub holidays: Vec<Holiday>,
    pub cancellations: Vec<ClassCancellation>,
}

impl ClosureCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holiday(mut self, holiday: Holiday) -> Self {
        self.holidays.push(holiday);
        self
    }

    pub fn add_holiday(&mut self, holiday: Holiday) {
        self.holidays.push(holiday);
    }

    pub fn add_cancellation(&mut self, template_id: TemplateId, day: DayKey, reason: &str) {
        self.cancellations.push(ClassCancellation {
            template_id,
            day,
            reason: reason.to_string(),
        });
    }

    /// whether the dated class is closed by a holiday or cancelled outright
    pub fn is_closed(&self, template: &ClassTemplate, day: DayKey) -> bool {
        let on_holiday = self
            .holidays
            .iter()
            .any(|h| h.contains(day) && h.applies_to(template));
        if on_holiday {
            return true;
        }
        self.cancellations
            .iter()
            .any(|c| c.template_id == template.id && c.day == day)
    }

    /// skip predicate for the occurrence walk
    pub fn skip_fn(&self) -> impl Fn(&ClassTemplate, DayKey) -> bool + '_ {
        move |template, day| self.is_closed(template, day)
    }
}
