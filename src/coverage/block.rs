use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::coverage::CoverageEngine;
use crate::errors::Result;
use crate::schedule::ClassTemplate;

/// inputs for projecting block purchases onto the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPayAhead {
    /// coverage already paid for, next block starts after it
    pub current_paid_through: Option<DayKey>,
    pub enrolment_start: DayKey,
    pub enrolment_end: Option<DayKey>,
    pub blocks_purchased: u32,
    /// credits granted per block
    pub block_class_count: u32,
}

/// projected coverage for a block purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCoverage {
    pub coverage_start: DayKey,
    pub coverage_end: DayKey,
    pub credits_purchased: u32,
    /// occurrences the blocks actually map onto the schedule
    pub sessions_covered: u32,
}

/// project purchased blocks onto the schedule, stacking past paid coverage
///
/// blocks anchor at the day after the current paid-through day so repeat
/// purchases extend rather than overlap. returns Ok(None) when the blocks
/// grant nothing or the schedule has no upcoming occurrences.
pub fn block_pay_ahead_coverage(
    engine: &CoverageEngine<'_>,
    templates: &[ClassTemplate],
    request: BlockPayAhead,
    horizon: DayKey,
) -> Result<Option<BlockCoverage>> {
    let credits = request.blocks_purchased * request.block_class_count;
    if credits == 0 {
        return Ok(None);
    }

    let anchor = match request.current_paid_through {
        Some(paid_through) if paid_through >= request.enrolment_start => paid_through.succ(),
        _ => request.enrolment_start,
    };

    let window = engine.coverage_window(templates, anchor, credits, request.enrolment_end, horizon)?;
    Ok(window.map(|w| BlockCoverage {
        coverage_start: w.start,
        coverage_end: w.end,
        credits_purchased: credits,
        sessions_covered: w.consumed,
    }))
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

    fn mondays() -> Vec<ClassTemplate> {
        vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)]
    }

    #[test]
    fn test_single_block_from_enrolment_start() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        let coverage = block_pay_ahead_coverage(
            &engine,
            &mondays(),
            BlockPayAhead {
                current_paid_through: None,
                enrolment_start: day("2026-01-05"),
                enrolment_end: None,
                blocks_purchased: 1,
                block_class_count: 4,
            },
            day("2026-06-30"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(coverage.coverage_start, day("2026-01-05"));
        assert_eq!(coverage.coverage_end, day("2026-01-26"));
        assert_eq!(coverage.credits_purchased, 4);
        assert_eq!(coverage.sessions_covered, 4);
    }

    #[test]
    fn test_blocks_stack_after_existing_coverage() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        // already paid through jan 26, next block starts at feb 2
        let coverage = block_pay_ahead_coverage(
            &engine,
            &mondays(),
            BlockPayAhead {
                current_paid_through: Some(day("2026-01-26")),
                enrolment_start: day("2026-01-05"),
                enrolment_end: None,
                blocks_purchased: 2,
                block_class_count: 2,
            },
            day("2026-06-30"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(coverage.coverage_start, day("2026-02-02"));
        assert_eq!(coverage.coverage_end, day("2026-02-23"));
        assert_eq!(coverage.credits_purchased, 4);
    }

    #[test]
    fn test_holidays_push_block_coverage_out() {
        let closures = ClosureCalendar::new()
            .with_holiday(Holiday::global("term break", day("2026-01-12"), day("2026-01-18")));
        let engine = CoverageEngine::new(&closures);

        let coverage = block_pay_ahead_coverage(
            &engine,
            &mondays(),
            BlockPayAhead {
                current_paid_through: None,
                enrolment_start: day("2026-01-05"),
                enrolment_end: None,
                blocks_purchased: 1,
                block_class_count: 4,
            },
            day("2026-06-30"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(coverage.coverage_end, day("2026-02-02"));
    }

    #[test]
    fn test_zero_blocks_cover_nothing() {
        let closures = ClosureCalendar::new();
        let engine = CoverageEngine::new(&closures);

        let coverage = block_pay_ahead_coverage(
            &engine,
            &mondays(),
            BlockPayAhead {
                current_paid_through: None,
                enrolment_start: day("2026-01-05"),
                enrolment_end: None,
                blocks_purchased: 0,
                block_class_count: 10,
            },
            day("2026-06-30"),
        )
        .unwrap();

        assert!(coverage.is_none());
    }
}
