pub mod block;
pub mod remap;

use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::errors::{BillingError, Result};
use crate::schedule::{occurrences, ClassTemplate, ClosureCalendar, Occurrence, OccurrenceWindow};

pub use block::{block_pay_ahead_coverage, BlockCoverage, BlockPayAhead};
pub use remap::{paid_through_after_template_change, TemplateChange};

/// span of schedule a paid entitlement covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageWindow {
    /// first billable occurrence consumed
    pub start: DayKey,
    /// last billable occurrence consumed, the paid-through day
    pub end: DayKey,
    /// occurrences actually consumed, may fall short of the entitlement
    pub consumed: u32,
}

/// walks schedules to answer which day a paid entitlement covers through
///
/// occurrences suppressed by the closure calendar are not billable and never
/// consume entitlement, so coverage stretches past holidays for free.
pub struct CoverageEngine<'a> {
    closures: &'a ClosureCalendar,
}

impl<'a> CoverageEngine<'a> {
    pub fn new(closures: &'a ClosureCalendar) -> Self {
        Self { closures }
    }

    /// window covering `sessions` billable occurrences starting at `from`
    ///
    /// `end` caps the walk (enrolment or template end), `horizon` bounds it
    /// when `end` is open. returns Ok(None) when the schedule yields nothing
    /// at all, and a short window when it runs out part way.
    pub fn coverage_window(
        &self,
        templates: &[ClassTemplate],
        from: DayKey,
        sessions: u32,
        end: Option<DayKey>,
        horizon: DayKey,
    ) -> Result<Option<CoverageWindow>> {
        if sessions == 0 {
            return Err(BillingError::InvalidEntitlement { requested: 0 });
        }
        let window = OccurrenceWindow {
            start: from,
            end,
            horizon,
        };

        let mut first: Option<DayKey> = None;
        let mut last = from;
        let mut consumed = 0u32;
        for occurrence in occurrences(templates, window, self.closures.skip_fn()) {
            if first.is_none() {
                first = Some(occurrence.day);
            }
            last = occurrence.day;
            consumed += 1;
            if consumed == sessions {
                break;
            }
        }

        Ok(first.map(|start| CoverageWindow {
            start,
            end: last,
            consumed,
        }))
    }

    /// day the entitlement covers through, the last consumed occurrence
    pub fn coverage_end_day(
        &self,
        templates: &[ClassTemplate],
        from: DayKey,
        sessions: u32,
        end: Option<DayKey>,
        horizon: DayKey,
    ) -> Result<Option<DayKey>> {
        Ok(self
            .coverage_window(templates, from, sessions, end, horizon)?
            .map(|w| w.end))
    }

    /// billable occurrences between two days inclusive
    pub fn count_sessions(&self, templates: &[ClassTemplate], start: DayKey, end: DayKey) -> u32 {
        if end < start {
            return 0;
        }
        let window = OccurrenceWindow::bounded(start, end);
        occurrences(templates, window, self.closures.skip_fn()).count() as u32
    }

    /// first billable occurrence on or after `from`
    pub fn first_occurrence_on_or_after(
        &self,
        templates: &[ClassTemplate],
        from: DayKey,
        horizon: DayKey,
    ) -> Option<Occurrence> {
        let window = OccurrenceWindow::new(from, horizon);
        occurrences(templates, window, self.closures.skip_fn()).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Holiday;
    use chrono::Weekday;
    use uuid::Uuid;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    fn mondays() -> Vec<ClassTemplate> {
        vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)]
    }

    #[test]
    fn test_coverage_end_after_n_sessions() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        let window = engine
            .coverage_window(&mondays(), day("2026-01-05"), 4, None, day("2026-06-30"))
            .unwrap()
            .unwrap();

        assert_eq!(window.start, day("2026-01-05"));
        assert_eq!(window.end, day("2026-01-26"));
        assert_eq!(window.consumed, 4);
    }

    #[test]
    fn test_holiday_week_extends_coverage() {
        let closures = ClosureCalendar::new()
            .with_holiday(Holiday::global("term break", day("2026-01-12"), day("2026-01-18")));
        let engine = CoverageEngine::new(&closures);

        // the monday of the closed week is free, coverage runs a week longer
        let end = engine
            .coverage_end_day(&mondays(), day("2026-01-05"), 4, None, day("2026-06-30"))
            .unwrap();

        assert_eq!(end, Some(day("2026-02-02")));
    }

    #[test]
    fn test_holiday_on_the_start_day_shifts_the_whole_window() {
        let closures = ClosureCalendar::new()
            .with_holiday(Holiday::global("public holiday", day("2026-01-05"), day("2026-01-05")));
        let engine = CoverageEngine::new(&closures);

        // the first consumed occurrence moves to jan 12, so four sessions
        // run a week past the no-holiday answer of jan 26
        let window = engine
            .coverage_window(&mondays(), day("2026-01-05"), 4, None, day("2026-06-30"))
            .unwrap()
            .unwrap();

        assert_eq!(window.start, day("2026-01-12"));
        assert_eq!(window.end, day("2026-02-02"));
        assert_eq!(window.consumed, 4);
    }

    #[test]
    fn test_zero_sessions_is_rejected() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        let err = engine
            .coverage_window(&mondays(), day("2026-01-05"), 0, None, day("2026-06-30"))
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidEntitlement { requested: 0 }));
    }

    #[test]
    fn test_empty_schedule_yields_no_window() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        let window = engine
            .coverage_window(&[], day("2026-01-05"), 4, None, day("2026-06-30"))
            .unwrap();
        assert!(window.is_none());
    }

    #[test]
    fn test_enrolment_end_caps_the_walk() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        let window = engine
            .coverage_window(
                &mondays(),
                day("2026-01-05"),
                4,
                Some(day("2026-01-13")),
                day("2026-06-30"),
            )
            .unwrap()
            .unwrap();

        assert_eq!(window.consumed, 2);
        assert_eq!(window.end, day("2026-01-12"));
    }

    #[test]
    fn test_count_sessions_excluding_holidays() {
        let closures = ClosureCalendar::new()
            .with_holiday(Holiday::global("term break", day("2026-01-12"), day("2026-01-18")));
        let engine = CoverageEngine::new(&closures);

        assert_eq!(
            engine.count_sessions(&mondays(), day("2026-01-05"), day("2026-02-01")),
            3,
        );
        // inverted range counts nothing
        assert_eq!(
            engine.count_sessions(&mondays(), day("2026-02-01"), day("2026-01-05")),
            0,
        );
    }

    #[test]
    fn test_first_occurrence_skips_closures() {
        let closures = ClosureCalendar::new()
            .with_holiday(Holiday::global("closed", day("2026-01-12"), day("2026-01-12")));
        let engine = CoverageEngine::new(&closures);

        let next = engine
            .first_occurrence_on_or_after(&mondays(), day("2026-01-06"), day("2026-06-30"))
            .unwrap();
        assert_eq!(next.day, day("2026-01-19"));
    }
}
