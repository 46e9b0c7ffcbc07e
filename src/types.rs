use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a family account
pub type FamilyId = Uuid;

/// unique identifier for a student
pub type StudentId = Uuid;

/// unique identifier for an enrolment
pub type EnrolmentId = Uuid;

/// unique identifier for a class template
pub type TemplateId = Uuid;

/// unique identifier for a teaching level
pub type LevelId = Uuid;

/// unique identifier for a payment
pub type PaymentId = Uuid;

/// unique identifier for an invoice
pub type InvoiceId = Uuid;

/// unique identifier for an away period
pub type AwayPeriodId = Uuid;

/// unique identifier for a credit ledger event
pub type CreditEventId = Uuid;

/// unique allocation identifier
pub type AllocationId = Uuid;

/// enrolment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrolmentStatus {
    /// attending and billable
    Active,
    /// temporarily suspended, no billing
    Paused,
    /// moving between classes, still billable
    Changeover,
    /// finished, no billing
    Cancelled,
}

/// how an enrolment is billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingType {
    /// price buys weeks of scheduled classes, tracked by a paid-through date
    PerWeek,
    /// price buys a block of class credits, tracked by a credit ledger
    PerClass,
}

/// payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// money received and applied
    Cleared,
    /// undone, effects removed
    Void,
}

/// how a payment arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    DirectDebit,
    BankTransfer,
    Cash,
}

/// invoice status, always derived from paid versus owed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Unpaid,
    PartPaid,
    Paid,
    Void,
}

/// what an invoice line item charges for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineItemKind {
    /// enrolment fees, carries the entitlement granted
    Enrolment,
    /// merchandise and other one-off charges
    Product,
    /// manual corrections
    Adjustment,
}

/// kind of credit ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditEventKind {
    /// credits bought through an invoice
    Purchase,
    /// admin correction, positive or negative
    ManualAdjust,
    /// a credit burnt by attendance
    Consumption,
}
