use thiserror::Error;

use crate::calendar::DayKey;
use crate::money::Money;
use crate::types::{AwayPeriodId, EnrolmentId, EnrolmentStatus, InvoiceId, PaymentId};

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("invalid date format: {input} (expected YYYY-MM-DD)")]
    InvalidDateFormat {
        input: String,
    },

    #[error("invalid entitlement: requested {requested} sessions")]
    InvalidEntitlement {
        requested: u32,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("payment below plan price: price {price}, provided {provided}")]
    PaymentBelowPlanPrice {
        price: Money,
        provided: Money,
    },

    #[error("block length below plan minimum: minimum {minimum}, requested {requested}")]
    BlockLengthBelowMinimum {
        minimum: u32,
        requested: u32,
    },

    #[error("schedule exhausted: needed {needed} occurrences, found {found}")]
    ScheduleExhausted {
        needed: u32,
        found: u32,
    },

    #[error("away period overlaps a makeup credit on {day}")]
    AwayOverlapsMakeupCredit {
        day: DayKey,
    },

    #[error("ambiguous class assignment: {message}")]
    AmbiguousClassAssignment {
        message: String,
    },

    #[error("enrolment not found: {id}")]
    EnrolmentNotFound {
        id: EnrolmentId,
    },

    #[error("enrolment not billable: current status is {status:?}")]
    EnrolmentNotBillable {
        status: EnrolmentStatus,
    },

    #[error("enrolment does not belong to family: {enrolment_id}")]
    FamilyMismatch {
        enrolment_id: EnrolmentId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    #[error("invoice not found: {id}")]
    InvoiceNotFound {
        id: InvoiceId,
    },

    #[error("away period not found: {id}")]
    AwayPeriodNotFound {
        id: AwayPeriodId,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, BillingError>;
