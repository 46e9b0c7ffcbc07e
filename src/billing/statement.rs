use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::billing::store::BillingStore;
use crate::billing::{Invoice, Payment};
use crate::calendar::DayKey;
use crate::enrolment::Enrolment;
use crate::money::Money;
use crate::types::{
    BillingType, EnrolmentId, EnrolmentStatus, FamilyId, InvoiceId, InvoiceStatus, PaymentId,
    PaymentMethod, PaymentStatus,
};

/// serializable view of a recorded payment
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: PaymentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub idempotency_key: String,
    pub received_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl PaymentView {
    pub fn from_payment(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            idempotency_key: payment.idempotency_key.clone(),
            received_at: payment.received_at,
            voided_at: payment.voided_at,
        }
    }
}

/// serializable view of an invoice and the coverage it bought
#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceView {
    pub id: InvoiceId,
    pub issued_at: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub amount_owed: Money,
    pub amount_paid: Money,
    pub descriptions: Vec<String>,
    pub coverage_start: Option<DayKey>,
    pub coverage_end: Option<DayKey>,
    pub credits_purchased: Option<u32>,
}

impl InvoiceView {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        let coverage_start = invoice
            .line_items
            .iter()
            .filter_map(|item| item.coverage_start)
            .min();
        let coverage_end = invoice
            .line_items
            .iter()
            .filter_map(|item| item.coverage_end)
            .max();
        let credits: u32 = invoice
            .line_items
            .iter()
            .filter_map(|item| item.credits_purchased)
            .sum();
        Self {
            id: invoice.id,
            issued_at: invoice.issued_at,
            status: invoice.status,
            amount_owed: invoice.amount_owed(),
            amount_paid: invoice.amount_paid,
            descriptions: invoice
                .line_items
                .iter()
                .map(|item| item.description.clone())
                .collect(),
            coverage_start,
            coverage_end,
            credits_purchased: if credits > 0 { Some(credits) } else { None },
        }
    }
}

/// serializable view of an enrolment's current entitlement
#[derive(Debug, Serialize, Deserialize)]
pub struct EnrolmentEntitlementView {
    pub id: EnrolmentId,
    pub plan: String,
    pub billing_type: BillingType,
    pub status: EnrolmentStatus,
    pub start_date: DayKey,
    pub end_date: Option<DayKey>,
    pub paid_through: Option<DayKey>,
    pub credits_remaining: i64,
}

impl EnrolmentEntitlementView {
    pub fn from_enrolment(enrolment: &Enrolment) -> Self {
        Self {
            id: enrolment.id,
            plan: enrolment.plan.name.clone(),
            billing_type: enrolment.billing_type(),
            status: enrolment.status,
            start_date: enrolment.start_date,
            end_date: enrolment.end_date,
            paid_through: enrolment.paid_through,
            credits_remaining: enrolment.credits_remaining,
        }
    }
}

/// a family's billing picture at a point in time
///
/// totals skip void payments and void invoices. payments and invoices that
/// were later voided still appear as rows so the history reads whole.
#[derive(Debug, Serialize, Deserialize)]
pub struct FamilyStatement {
    pub family_id: FamilyId,
    pub generated_at: DateTime<Utc>,
    pub payments: Vec<PaymentView>,
    pub invoices: Vec<InvoiceView>,
    pub enrolments: Vec<EnrolmentEntitlementView>,
    pub total_received: Money,
    pub total_invoiced: Money,
    pub total_allocated: Money,
    /// money received beyond what invoices absorbed
    pub unallocated_credit: Money,
}

impl FamilyStatement {
    pub fn build<S: BillingStore>(
        store: &S,
        family_id: FamilyId,
        time_provider: &SafeTimeProvider,
    ) -> Self {
        let payments = store.payments_for_family(family_id);
        let invoices = store.invoices_for_family(family_id);
        let enrolments = store.enrolments_for_family(family_id);

        let total_received = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Cleared)
            .fold(Money::ZERO, |total, p| total + p.amount);
        let total_invoiced = invoices
            .iter()
            .filter(|i| i.status != InvoiceStatus::Void)
            .fold(Money::ZERO, |total, i| total + i.amount_owed());
        let total_allocated = invoices
            .iter()
            .filter(|i| i.status != InvoiceStatus::Void)
            .fold(Money::ZERO, |total, i| total + i.amount_paid);

        Self {
            family_id,
            generated_at: time_provider.now(),
            payments: payments.iter().map(PaymentView::from_payment).collect(),
            invoices: invoices.iter().map(InvoiceView::from_invoice).collect(),
            enrolments: enrolments
                .iter()
                .map(EnrolmentEntitlementView::from_enrolment)
                .collect(),
            total_received,
            total_invoiced,
            total_allocated,
            unallocated_credit: (total_received - total_allocated).max(Money::ZERO),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::store::MemoryStore;
    use crate::billing::{PaymentRecorder, RecordPayment};
    use crate::config::{BillingSettings, EnrolmentPlan};
    use crate::events::EventStore;
    use crate::schedule::{ClassTemplate, ClosureCalendar};
    use chrono::{TimeZone, Weekday};
    use hourglass_rs::TimeSource;
    use uuid::Uuid;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    fn test_time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_statement_totals_and_views() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let recorder = PaymentRecorder::new(&closures, &settings);
        let templates = vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)];
        let mut store = MemoryStore::new();
        let family_id = Uuid::new_v4();
        let enrolment = Enrolment::new(
            family_id,
            Uuid::new_v4(),
            vec![templates[0].id],
            day("2026-01-05"),
            EnrolmentPlan::weekly("Mini", Money::from_major(100), 2, 1),
        );
        let enrolment_id = enrolment.id;
        store.put_enrolment(enrolment);
        let time = test_time();
        let mut events = EventStore::new();

        // $150 buys one $100 unit, the extra $50 sits unallocated
        let request = RecordPayment::new(
            family_id,
            enrolment_id,
            Money::from_major(150),
            PaymentMethod::Card,
            "wk-1",
        );
        recorder
            .record_payment(&mut store, &templates, request, &time, &mut events)
            .unwrap();

        let statement = FamilyStatement::build(&store, family_id, &time);
        assert_eq!(statement.payments.len(), 1);
        assert_eq!(statement.invoices.len(), 1);
        assert_eq!(statement.enrolments.len(), 1);
        assert_eq!(statement.total_received, Money::from_major(150));
        assert_eq!(statement.total_invoiced, Money::from_major(100));
        assert_eq!(statement.total_allocated, Money::from_major(100));
        assert_eq!(statement.unallocated_credit, Money::from_major(50));

        let invoice = &statement.invoices[0];
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.coverage_start, Some(day("2026-01-05")));
        assert_eq!(invoice.coverage_end, Some(day("2026-01-12")));
        assert_eq!(invoice.credits_purchased, None);
        assert_eq!(invoice.descriptions, vec!["Mini x1".to_string()]);

        let entitlement = &statement.enrolments[0];
        assert_eq!(entitlement.paid_through, Some(day("2026-01-12")));
        assert_eq!(entitlement.billing_type, BillingType::PerWeek);

        let json = statement.to_json_pretty().unwrap();
        assert!(json.contains("unallocated_credit"));
    }

    #[test]
    fn test_statement_excludes_void_payments_from_totals() {
        let closures = ClosureCalendar::new();
        let settings = BillingSettings::default();
        let recorder = PaymentRecorder::new(&closures, &settings);
        let templates = vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)];
        let mut store = MemoryStore::new();
        let family_id = Uuid::new_v4();
        let enrolment = Enrolment::new(
            family_id,
            Uuid::new_v4(),
            vec![templates[0].id],
            day("2026-01-05"),
            EnrolmentPlan::weekly("Mini", Money::from_major(100), 2, 1),
        );
        let enrolment_id = enrolment.id;
        store.put_enrolment(enrolment);
        let time = test_time();
        let mut events = EventStore::new();

        let request = RecordPayment::new(
            family_id,
            enrolment_id,
            Money::from_major(100),
            PaymentMethod::Card,
            "wk-1",
        );
        let payment = recorder
            .record_payment(&mut store, &templates, request, &time, &mut events)
            .unwrap();
        recorder
            .undo_payment(&mut store, payment.id, &time, &mut events)
            .unwrap();

        let statement = FamilyStatement::build(&store, family_id, &time);
        // the voided payment stays visible but counts for nothing
        assert_eq!(statement.payments.len(), 1);
        assert_eq!(statement.payments[0].status, PaymentStatus::Void);
        assert_eq!(statement.total_received, Money::ZERO);
        assert_eq!(statement.total_allocated, Money::ZERO);
        assert_eq!(statement.total_invoiced, Money::from_major(100));
        assert_eq!(statement.unallocated_credit, Money::ZERO);
        assert_eq!(statement.invoices[0].status, InvoiceStatus::Unpaid);
    }
}
