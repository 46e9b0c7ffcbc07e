use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::DayKey;
use crate::config::EnrolmentPlan;
use crate::errors::{BillingError, Result};
use crate::types::{BillingType, EnrolmentId, EnrolmentStatus, FamilyId, StudentId, TemplateId};

/// a student's enrolment into one or more weekly class slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrolment {
    // identification
    pub id: EnrolmentId,
    pub family_id: FamilyId,
    pub student_id: StudentId,

    // schedule
    pub template_ids: Vec<TemplateId>,
    pub start_date: DayKey,
    /// last day of the enrolment, none for ongoing
    pub end_date: Option<DayKey>,

    // entitlement
    /// last scheduled day paid coverage extends through
    pub paid_through: Option<DayKey>,
    /// class credit balance, meaningful for per-class plans
    pub credits_remaining: i64,

    // billing
    pub plan: EnrolmentPlan,
    pub status: EnrolmentStatus,
    pub status_changed_at: Option<DateTime<Utc>>,
}

impl Enrolment {
    pub fn new(
        family_id: FamilyId,
        student_id: StudentId,
        template_ids: Vec<TemplateId>,
        start_date: DayKey,
        plan: EnrolmentPlan,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            student_id,
            template_ids,
            start_date,
            end_date: None,
            paid_through: None,
            credits_remaining: 0,
            plan,
            status: EnrolmentStatus::Active,
            status_changed_at: None,
        }
    }

    pub fn with_end_date(mut self, end_date: DayKey) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn billing_type(&self) -> BillingType {
        self.plan.billing_type()
    }

    /// payments are accepted while active or mid schedule changeover
    pub fn can_bill(&self) -> bool {
        matches!(
            self.status,
            EnrolmentStatus::Active | EnrolmentStatus::Changeover
        )
    }

    pub fn require_billable(&self) -> Result<()> {
        if self.can_bill() {
            Ok(())
        } else {
            Err(BillingError::EnrolmentNotBillable {
                status: self.status,
            })
        }
    }

    pub fn update_status(&mut self, status: EnrolmentStatus, timestamp: DateTime<Utc>) {
        self.status = status;
        self.status_changed_at = Some(timestamp);
    }

    /// whether paid coverage or a credit entitles attendance on the day
    pub fn entitled_on(&self, day: DayKey) -> bool {
        match self.billing_type() {
            BillingType::PerWeek => match self.paid_through {
                Some(paid_through) => day >= self.start_date && day <= paid_through,
                None => false,
            },
            BillingType::PerClass => self.credits_remaining > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    fn weekly_enrolment() -> Enrolment {
        Enrolment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![Uuid::new_v4()],
            day("2026-01-05"),
            EnrolmentPlan::term_weekly(),
        )
    }

    #[test]
    fn test_billable_states() {
        let mut enrolment = weekly_enrolment();
        assert!(enrolment.require_billable().is_ok());

        enrolment.update_status(EnrolmentStatus::Changeover, Utc::now());
        assert!(enrolment.require_billable().is_ok());

        enrolment.update_status(EnrolmentStatus::Cancelled, Utc::now());
        let err = enrolment.require_billable().unwrap_err();
        assert!(matches!(err, BillingError::EnrolmentNotBillable { .. }));
        assert!(enrolment.status_changed_at.is_some());
    }

    #[test]
    fn test_entitlement_by_paid_through() {
        let mut enrolment = weekly_enrolment();
        assert!(!enrolment.entitled_on(day("2026-01-05")));

        enrolment.paid_through = Some(day("2026-01-26"));
        assert!(enrolment.entitled_on(day("2026-01-05")));
        assert!(enrolment.entitled_on(day("2026-01-26")));
        assert!(!enrolment.entitled_on(day("2026-01-27")));
        assert!(!enrolment.entitled_on(day("2026-01-04")));
    }

    #[test]
    fn test_entitlement_by_credits() {
        let mut enrolment = Enrolment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![Uuid::new_v4()],
            day("2026-01-05"),
            EnrolmentPlan::flexi_ten(),
        );
        assert!(!enrolment.entitled_on(day("2026-01-05")));

        enrolment.credits_remaining = 1;
        assert!(enrolment.entitled_on(day("2026-01-05")));
    }
}
