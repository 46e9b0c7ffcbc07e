use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::config::BillingSettings;
use crate::enrolment::Enrolment;
use crate::errors::{BillingError, Result};
use crate::schedule::{
    occurrences, weekly_frequency, ClassTemplate, ClosureCalendar, Occurrence, OccurrenceWindow,
};
use crate::types::{AwayPeriodId, EnrolmentId};

/// inclusive away window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwayWindow {
    pub start: DayKey,
    pub end: DayKey,
}

/// a recorded family absence and the shift it applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwayPeriod {
    pub id: AwayPeriodId,
    pub enrolment_id: EnrolmentId,
    pub start: DayKey,
    pub end: DayKey,
    /// billable occurrences the absence covered
    pub missed_sessions: u32,
    /// days paid-through was pushed out when applied
    pub applied_delta_days: i64,
    /// paid-through day the shift landed on, rebuilds compare against it
    pub shifted_paid_through: Option<DayKey>,
    /// false once removed, the shift has been reverted
    pub active: bool,
}

impl AwayPeriod {
    pub fn window(&self) -> AwayWindow {
        AwayWindow {
            start: self.start,
            end: self.end,
        }
    }
}

/// planned outcome of an away period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwayAdjustment {
    /// billable occurrences inside the window
    pub missed: Vec<Occurrence>,
    /// days to push paid-through out
    pub delta_days: i64,
}

impl AwayAdjustment {
    pub fn missed_sessions(&self) -> u32 {
        self.missed.len() as u32
    }
}

/// plans and applies paid-through shifts for family absences
///
/// a missed class is not a lost class. for single-slot enrolments every
/// missed occurrence pushes paid-through a week. multi-slot enrolments
/// can't use the week rule (two slots a week make 7 days worth two
/// sessions), so the shift lands paid-through on the nth billable
/// occurrence past it instead.
pub struct AwayPlanner<'a> {
    closures: &'a ClosureCalendar,
    settings: &'a BillingSettings,
}

impl<'a> AwayPlanner<'a> {
    pub fn new(closures: &'a ClosureCalendar, settings: &'a BillingSettings) -> Self {
        Self { closures, settings }
    }

    /// billable occurrences falling inside the window
    ///
    /// days already closed by a holiday or cancellation were never billable
    /// and do not count as missed.
    pub fn missed_occurrences(
        &self,
        templates: &[ClassTemplate],
        window: AwayWindow,
    ) -> Vec<Occurrence> {
        let walk = OccurrenceWindow::bounded(window.start, window.end);
        occurrences(templates, walk, self.closures.skip_fn()).collect()
    }

    /// days paid-through must shift to compensate `missed` occurrences
    pub fn delta_days(
        &self,
        templates: &[ClassTemplate],
        missed: u32,
        paid_through: DayKey,
        enrolment_end: Option<DayKey>,
    ) -> Result<i64> {
        if missed == 0 {
            return Ok(0);
        }
        if weekly_frequency(templates) <= 1 {
            return Ok(i64::from(missed) * 7);
        }
        let target = self.future_occurrence(templates, paid_through, missed, enrolment_end)?;
        Ok(paid_through.days_until(target.day))
    }

    /// nth billable occurrence strictly after `anchor`
    ///
    /// the search horizon starts one retry step out and widens step by step
    /// up to the configured attempts, so sparse schedules resolve without
    /// walking years of calendar up front.
    fn future_occurrence(
        &self,
        templates: &[ClassTemplate],
        anchor: DayKey,
        nth: u32,
        enrolment_end: Option<DayKey>,
    ) -> Result<Occurrence> {
        let step = self.settings.horizon_retry_step_days;
        let start = anchor.succ();
        let mut horizon = anchor.add_days(step);
        let mut best_found = 0u32;

        for _ in 0..=self.settings.horizon_retry_attempts {
            let window = OccurrenceWindow {
                start,
                end: enrolment_end,
                horizon,
            };
            let mut found = 0u32;
            for occurrence in occurrences(templates, window, self.closures.skip_fn()) {
                found += 1;
                if found == nth {
                    return Ok(occurrence);
                }
            }
            best_found = best_found.max(found);
            if let Some(end) = enrolment_end {
                if horizon >= end {
                    break;
                }
            }
            horizon = horizon.add_days(step);
        }

        Err(BillingError::ScheduleExhausted {
            needed: nth,
            found: best_found,
        })
    }

    /// plan the adjustment for an away window
    ///
    /// `makeup_days` are already-promised makeup classes, an absence may not
    /// swallow one. the delta is zero when nothing was missed or no paid
    /// coverage exists to shift.
    pub fn plan(
        &self,
        templates: &[ClassTemplate],
        window: AwayWindow,
        paid_through: Option<DayKey>,
        enrolment_end: Option<DayKey>,
        makeup_days: &[DayKey],
    ) -> Result<AwayAdjustment> {
        if window.end < window.start {
            return Err(BillingError::InvalidConfiguration {
                message: format!(
                    "away period ends {} before it starts {}",
                    window.end, window.start
                ),
            });
        }
        if let Some(day) = makeup_days
            .iter()
            .copied()
            .find(|d| *d >= window.start && *d <= window.end)
        {
            return Err(BillingError::AwayOverlapsMakeupCredit { day });
        }

        let missed = self.missed_occurrences(templates, window);
        let delta_days = match paid_through {
            Some(paid_through) if !missed.is_empty() => self.delta_days(
                templates,
                missed.len() as u32,
                paid_through,
                enrolment_end,
            )?,
            _ => 0,
        };

        Ok(AwayAdjustment { missed, delta_days })
    }

    /// push the enrolment's paid-through out, returning the delta applied
    pub fn apply(&self, enrolment: &mut Enrolment, adjustment: &AwayAdjustment) -> i64 {
        match enrolment.paid_through {
            Some(paid_through) if adjustment.delta_days != 0 => {
                enrolment.paid_through = Some(paid_through.add_days(adjustment.delta_days));
                adjustment.delta_days
            }
            _ => 0,
        }
    }

    /// undo a previously applied shift
    pub fn revert(&self, enrolment: &mut Enrolment, applied_delta_days: i64) {
        if applied_delta_days == 0 {
            return;
        }
        if let Some(paid_through) = enrolment.paid_through {
            enrolment.paid_through = Some(paid_through.add_days(-applied_delta_days));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnrolmentPlan;
    use crate::schedule::Holiday;
    use chrono::Weekday;
    use uuid::Uuid;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    fn window(start: &str, end: &str) -> AwayWindow {
        AwayWindow {
            start: day(start),
            end: day(end),
        }
    }

    fn mondays() -> Vec<ClassTemplate> {
        vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)]
    }

    fn mon_wed() -> Vec<ClassTemplate> {
        vec![
            ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon),
            ClassTemplate::weekly(Uuid::new_v4(), Weekday::Wed),
        ]
    }

    fn enrolment_with(templates: &[ClassTemplate], paid_through: Option<&str>) -> Enrolment {
        let mut enrolment = Enrolment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            templates.iter().map(|t| t.id).collect(),
            day("2026-01-05"),
            EnrolmentPlan::term_weekly(),
        );
        enrolment.paid_through = paid_through.map(day);
        enrolment
    }

    #[test]
    fn test_missed_occurrences_in_window() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);

        let missed = planner.missed_occurrences(&mondays(), window("2026-01-10", "2026-01-20"));
        let days: Vec<String> = missed.iter().map(|o| o.day.to_string()).collect();
        assert_eq!(days, vec!["2026-01-12", "2026-01-19"]);
    }

    #[test]
    fn test_closed_days_are_not_missed() {
        let closures = ClosureCalendar::new()
            .with_holiday(Holiday::global("closed", day("2026-01-12"), day("2026-01-12")));
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);

        let missed = planner.missed_occurrences(&mondays(), window("2026-01-10", "2026-01-20"));
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].day, day("2026-01-19"));
    }

    #[test]
    fn test_single_slot_delta_is_a_week_per_miss() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);

        let adjustment = planner
            .plan(
                &mondays(),
                window("2026-01-10", "2026-01-13"),
                Some(day("2026-01-12")),
                None,
                &[],
            )
            .unwrap();
        assert_eq!(adjustment.missed_sessions(), 1);
        assert_eq!(adjustment.delta_days, 7);

        let two_weeks = planner
            .plan(
                &mondays(),
                window("2026-01-10", "2026-01-20"),
                Some(day("2026-01-26")),
                None,
                &[],
            )
            .unwrap();
        assert_eq!(two_weeks.missed_sessions(), 2);
        assert_eq!(two_weeks.delta_days, 14);
    }

    #[test]
    fn test_multi_slot_delta_lands_on_future_occurrence() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);

        // paid through wed jan 7, away misses mon 12 and wed 14. the second
        // occurrence past jan 7 is wed jan 14, a 7 day shift, not 14.
        let adjustment = planner
            .plan(
                &mon_wed(),
                window("2026-01-08", "2026-01-18"),
                Some(day("2026-01-07")),
                None,
                &[],
            )
            .unwrap();
        assert_eq!(adjustment.missed_sessions(), 2);
        assert_eq!(adjustment.delta_days, 7);
    }

    #[test]
    fn test_plan_rejects_inverted_window() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);

        let err = planner
            .plan(&mondays(), window("2026-01-20", "2026-01-10"), None, None, &[])
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_plan_rejects_makeup_overlap() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);

        let err = planner
            .plan(
                &mondays(),
                window("2026-01-10", "2026-01-20"),
                Some(day("2026-01-26")),
                None,
                &[day("2026-01-19")],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::AwayOverlapsMakeupCredit { day } if day == DayKey::parse("2026-01-19").unwrap()
        ));
    }

    #[test]
    fn test_no_paid_coverage_means_no_shift() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);

        let adjustment = planner
            .plan(&mondays(), window("2026-01-10", "2026-01-20"), None, None, &[])
            .unwrap();
        assert_eq!(adjustment.missed_sessions(), 2);
        assert_eq!(adjustment.delta_days, 0);
    }

    #[test]
    fn test_apply_then_revert_round_trips() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);
        let templates = mondays();
        let mut enrolment = enrolment_with(&templates, Some("2026-01-26"));

        let adjustment = planner
            .plan(
                &templates,
                window("2026-01-10", "2026-01-20"),
                enrolment.paid_through,
                None,
                &[],
            )
            .unwrap();

        let applied = planner.apply(&mut enrolment, &adjustment);
        assert_eq!(applied, 14);
        assert_eq!(enrolment.paid_through, Some(day("2026-02-09")));

        planner.revert(&mut enrolment, applied);
        assert_eq!(enrolment.paid_through, Some(day("2026-01-26")));

        // reapplying lands on the same day, edits are revert-then-replan
        let applied_again = planner.apply(&mut enrolment, &adjustment);
        assert_eq!(applied_again, 14);
        assert_eq!(enrolment.paid_through, Some(day("2026-02-09")));
    }

    #[test]
    fn test_future_walk_exhausts_bounded_schedule() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let planner = AwayPlanner::new(&closures, &settings);

        // both slots end jan 31, only one occurrence remains past jan 26
        let templates: Vec<ClassTemplate> = mon_wed()
            .into_iter()
            .map(|t| t.with_bounds(None, Some(day("2026-01-31"))))
            .collect();

        let err = planner
            .delta_days(&templates, 4, day("2026-01-26"), Some(day("2026-01-31")))
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::ScheduleExhausted { needed: 4, found: 1 }
        ));
    }
}
