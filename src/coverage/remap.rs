use crate::calendar::DayKey;
use crate::coverage::CoverageEngine;
use crate::errors::Result;
use crate::schedule::{weekly_frequency, ClassTemplate};

/// inputs for remapping paid coverage onto a changed schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateChange {
    pub enrolment_start: DayKey,
    pub enrolment_end: Option<DayKey>,
    /// paid-through day earned under the old templates
    pub old_paid_through: DayKey,
}

/// recompute the paid-through day after a schedule change
///
/// the family keeps the number of sessions they paid for, not the calendar
/// span: sessions entitled under the old templates are re-walked onto the
/// new ones. the walk horizon is sized from the new weekly frequency plus
/// slack, never clipped to the old window, so moving to a sparser schedule
/// pushes paid-through out rather than silently truncating it.
pub fn paid_through_after_template_change(
    engine: &CoverageEngine<'_>,
    old_templates: &[ClassTemplate],
    new_templates: &[ClassTemplate],
    change: TemplateChange,
    slack_weeks: u32,
) -> Result<Option<DayKey>> {
    let entitled = engine.count_sessions(
        old_templates,
        change.enrolment_start,
        change.old_paid_through,
    );
    if entitled == 0 {
        return Ok(None);
    }

    let per_week = weekly_frequency(new_templates);
    if per_week == 0 {
        return Ok(None);
    }

    let weeks = (entitled + per_week - 1) / per_week + slack_weeks;
    let horizon = change.enrolment_start.add_days(i64::from(weeks) * 7);

    engine.coverage_end_day(
        new_templates,
        change.enrolment_start,
        entitled,
        change.enrolment_end,
        horizon,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ClosureCalendar, Holiday};
    use chrono::Weekday;
    use uuid::Uuid;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    fn weekly(weekday: Weekday) -> Vec<ClassTemplate> {
        vec![ClassTemplate::weekly(Uuid::new_v4(), weekday)]
    }

    fn change_through(paid_through: &str) -> TemplateChange {
        TemplateChange {
            enrolment_start: day("2026-01-05"),
            enrolment_end: None,
            old_paid_through: day(paid_through),
        }
    }

    #[test]
    fn test_day_move_preserves_session_count() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        // four mondays paid, remapped to four wednesdays
        let new_paid_through = paid_through_after_template_change(
            &engine,
            &weekly(Weekday::Mon),
            &weekly(Weekday::Wed),
            change_through("2026-01-26"),
            4,
        )
        .unwrap();

        assert_eq!(new_paid_through, Some(day("2026-01-28")));
    }

    #[test]
    fn test_doubling_frequency_halves_the_span() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        let new_templates = vec![
            ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon),
            ClassTemplate::weekly(Uuid::new_v4(), Weekday::Wed),
        ];
        let new_paid_through = paid_through_after_template_change(
            &engine,
            &weekly(Weekday::Mon),
            &new_templates,
            change_through("2026-01-26"),
            4,
        )
        .unwrap();

        // four sessions now land mon 5, wed 7, mon 12, wed 14
        assert_eq!(new_paid_through, Some(day("2026-01-14")));
    }

    #[test]
    fn test_remap_is_not_capped_to_the_old_window() {
        // three wednesdays closed, coverage must run well past the old day
        let closures = ClosureCalendar::new()
            .with_holiday(Holiday::global("refit", day("2026-01-07"), day("2026-01-07")))
            .with_holiday(Holiday::global("refit", day("2026-01-14"), day("2026-01-14")))
            .with_holiday(Holiday::global("refit", day("2026-01-21"), day("2026-01-21")));
        let engine = CoverageEngine::new(&closures);

        let new_paid_through = paid_through_after_template_change(
            &engine,
            &weekly(Weekday::Mon),
            &weekly(Weekday::Wed),
            change_through("2026-01-26"),
            4,
        )
        .unwrap()
        .unwrap();

        assert_eq!(new_paid_through, day("2026-02-18"));
        assert!(new_paid_through > day("2026-01-26"));
    }

    #[test]
    fn test_nothing_entitled_or_no_new_slots() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        // paid-through before the first old occurrence
        let remapped = paid_through_after_template_change(
            &engine,
            &weekly(Weekday::Mon),
            &weekly(Weekday::Wed),
            change_through("2026-01-04"),
            4,
        )
        .unwrap();
        assert!(remapped.is_none());

        // new schedule has no active slots
        let mut placeholder = ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon);
        placeholder.day_of_week = None;
        let remapped = paid_through_after_template_change(
            &engine,
            &weekly(Weekday::Mon),
            &[placeholder],
            change_through("2026-01-26"),
            4,
        )
        .unwrap();
        assert!(remapped.is_none());
    }
}
