pub mod recorder;
pub mod statement;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::DayKey;
use crate::money::Money;
use crate::types::{
    AllocationId, CreditEventId, CreditEventKind, EnrolmentId, FamilyId, InvoiceId, InvoiceStatus,
    LineItemKind, PaymentId, PaymentMethod, PaymentStatus,
};

pub use recorder::{PaymentRecorder, RecordPayment};
pub use statement::{EnrolmentEntitlementView, FamilyStatement, InvoiceView, PaymentView};
pub use store::{BillingStore, MemoryStore};

/// money received from a family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub family_id: FamilyId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// caller-supplied key, retries with the same key are returned as-is
    pub idempotency_key: String,
    pub received_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_void(&self) -> bool {
        self.status == PaymentStatus::Void
    }
}

/// one line of an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub description: String,
    pub amount: Money,
    pub enrolment_id: Option<EnrolmentId>,
    pub coverage_start: Option<DayKey>,
    pub coverage_end: Option<DayKey>,
    pub credits_purchased: Option<u32>,
}

impl LineItem {
    /// merchandise or one-off product charge
    pub fn product(description: &str, amount: Money) -> Self {
        Self {
            kind: LineItemKind::Product,
            description: description.to_string(),
            amount,
            enrolment_id: None,
            coverage_start: None,
            coverage_end: None,
            credits_purchased: None,
        }
    }

    /// manual adjustment, negative amounts discount the invoice
    pub fn adjustment(description: &str, amount: Money) -> Self {
        Self {
            kind: LineItemKind::Adjustment,
            description: description.to_string(),
            amount,
            enrolment_id: None,
            coverage_start: None,
            coverage_end: None,
            credits_purchased: None,
        }
    }
}

/// invoice issued against a family at payment time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub family_id: FamilyId,
    pub issued_at: DateTime<Utc>,
    pub line_items: Vec<LineItem>,
    pub amount_paid: Money,
    pub status: InvoiceStatus,
}

impl Invoice {
    pub fn new(family_id: FamilyId, line_items: Vec<LineItem>, issued_at: DateTime<Utc>) -> Self {
        let mut invoice = Self {
            id: Uuid::new_v4(),
            family_id,
            issued_at,
            line_items,
            amount_paid: Money::ZERO,
            status: InvoiceStatus::Unpaid,
        };
        invoice.status = invoice.derive_status();
        invoice
    }

    /// sum of line item amounts
    pub fn amount_owed(&self) -> Money {
        self.line_items
            .iter()
            .fold(Money::ZERO, |total, item| total + item.amount)
    }

    /// status from the paid amount, void stays void
    pub fn derive_status(&self) -> InvoiceStatus {
        if self.status == InvoiceStatus::Void {
            return InvoiceStatus::Void;
        }
        let owed = self.amount_owed();
        if self.amount_paid >= owed {
            InvoiceStatus::Paid
        } else if self.amount_paid.is_positive() {
            InvoiceStatus::PartPaid
        } else {
            InvoiceStatus::Unpaid
        }
    }

    pub fn set_amount_paid(&mut self, amount: Money) {
        self.amount_paid = amount;
        self.status = self.derive_status();
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// enrolment line items charged to the given enrolment
    pub fn enrolment_items(&self, enrolment_id: EnrolmentId) -> impl Iterator<Item = &LineItem> {
        self.line_items.iter().filter(move |item| {
            item.kind == LineItemKind::Enrolment && item.enrolment_id == Some(enrolment_id)
        })
    }
}

/// how much of a payment settled a given invoice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub id: AllocationId,
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
}

/// signed movement on an enrolment's class credit ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditEvent {
    pub id: CreditEventId,
    pub enrolment_id: EnrolmentId,
    pub kind: CreditEventKind,
    pub delta: i64,
    /// purchase events point back at the invoice that granted them
    pub invoice_id: Option<InvoiceId>,
    pub recorded_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl CreditEvent {
    pub fn purchase(
        enrolment_id: EnrolmentId,
        credits: u32,
        invoice_id: InvoiceId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            enrolment_id,
            kind: CreditEventKind::Purchase,
            delta: i64::from(credits),
            invoice_id: Some(invoice_id),
            recorded_at,
            note: None,
        }
    }

    pub fn manual_adjust(
        enrolment_id: EnrolmentId,
        delta: i64,
        note: &str,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            enrolment_id,
            kind: CreditEventKind::ManualAdjust,
            delta,
            invoice_id: None,
            recorded_at,
            note: Some(note.to_string()),
        }
    }

    pub fn consumption(enrolment_id: EnrolmentId, day: DayKey, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            enrolment_id,
            kind: CreditEventKind::Consumption,
            delta: -1,
            invoice_id: None,
            recorded_at,
            note: Some(format!("class on {day}")),
        }
    }
}

/// balance of a credit ledger, the signed sum of its deltas
pub fn credits_remaining<'a, I>(events: I) -> i64
where
    I: IntoIterator<Item = &'a CreditEvent>,
{
    events.into_iter().map(|event| event.delta).sum()
}
