use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::money::Money;
use crate::types::{
    AwayPeriodId, EnrolmentId, EnrolmentStatus, FamilyId, InvoiceId, InvoiceStatus, PaymentId,
};

/// all events that can be emitted by billing operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        family_id: FamilyId,
        amount: Money,
        idempotency_key: String,
        timestamp: DateTime<Utc>,
    },
    PaymentVoided {
        payment_id: PaymentId,
        family_id: FamilyId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    InvoiceIssued {
        invoice_id: InvoiceId,
        family_id: FamilyId,
        amount_owed: Money,
        amount_paid: Money,
        timestamp: DateTime<Utc>,
    },
    InvoiceStatusChanged {
        invoice_id: InvoiceId,
        old_status: InvoiceStatus,
        new_status: InvoiceStatus,
        timestamp: DateTime<Utc>,
    },

    // coverage events
    CoverageExtended {
        enrolment_id: EnrolmentId,
        previous_paid_through: Option<DayKey>,
        new_paid_through: DayKey,
        sessions: u32,
        timestamp: DateTime<Utc>,
    },
    PaidThroughRebuilt {
        enrolment_id: EnrolmentId,
        previous: Option<DayKey>,
        current: Option<DayKey>,
        timestamp: DateTime<Utc>,
    },
    PaidThroughOverridden {
        enrolment_id: EnrolmentId,
        previous: Option<DayKey>,
        current: Option<DayKey>,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // credit events
    CreditsPurchased {
        enrolment_id: EnrolmentId,
        invoice_id: InvoiceId,
        credits: u32,
        balance_after: i64,
        timestamp: DateTime<Utc>,
    },
    CreditsAdjusted {
        enrolment_id: EnrolmentId,
        delta: i64,
        balance_after: i64,
        note: String,
        timestamp: DateTime<Utc>,
    },
    CreditConsumed {
        enrolment_id: EnrolmentId,
        day: DayKey,
        balance_after: i64,
        timestamp: DateTime<Utc>,
    },
    CreditsRebuilt {
        enrolment_id: EnrolmentId,
        previous: i64,
        current: i64,
        timestamp: DateTime<Utc>,
    },

    // away period events
    AwayPeriodApplied {
        away_period_id: AwayPeriodId,
        enrolment_id: EnrolmentId,
        start: DayKey,
        end: DayKey,
        missed_sessions: u32,
        delta_days: i64,
        timestamp: DateTime<Utc>,
    },
    AwayPeriodEdited {
        away_period_id: AwayPeriodId,
        enrolment_id: EnrolmentId,
        start: DayKey,
        end: DayKey,
        missed_sessions: u32,
        delta_days: i64,
        timestamp: DateTime<Utc>,
    },
    AwayPeriodRemoved {
        away_period_id: AwayPeriodId,
        enrolment_id: EnrolmentId,
        reverted_delta_days: i64,
        timestamp: DateTime<Utc>,
    },

    // template change events
    TemplateChangeRemapped {
        enrolment_id: EnrolmentId,
        previous_paid_through: Option<DayKey>,
        new_paid_through: Option<DayKey>,
        timestamp: DateTime<Utc>,
    },

    // status change events
    EnrolmentStatusChanged {
        enrolment_id: EnrolmentId,
        old_status: EnrolmentStatus,
        new_status: EnrolmentStatus,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
