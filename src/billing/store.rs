use std::collections::HashMap;

use crate::away::AwayPeriod;
use crate::billing::{CreditEvent, Invoice, Payment, PaymentAllocation};
use crate::enrolment::Enrolment;
use crate::errors::Result;
use crate::types::{AwayPeriodId, EnrolmentId, FamilyId, InvoiceId, PaymentId};

/// storage boundary for billing state
///
/// queries hand back owned clones so callers can mutate and write back
/// without aliasing the store. `transaction` must leave the store untouched
/// when the work errors, recorders rely on that for atomicity.
pub trait BillingStore {
    /// run `work`, rolling every write back if it returns an error
    fn transaction<T>(&mut self, work: impl FnOnce(&mut Self) -> Result<T>) -> Result<T>
    where
        Self: Sized;

    // payments
    fn payment(&self, id: PaymentId) -> Option<Payment>;
    fn payment_by_idempotency_key(&self, family_id: FamilyId, key: &str) -> Option<Payment>;
    fn payments_for_family(&self, family_id: FamilyId) -> Vec<Payment>;
    fn put_payment(&mut self, payment: Payment);

    // invoices
    fn invoice(&self, id: InvoiceId) -> Option<Invoice>;
    fn invoices_for_enrolment(&self, enrolment_id: EnrolmentId) -> Vec<Invoice>;
    fn invoices_for_family(&self, family_id: FamilyId) -> Vec<Invoice>;
    fn put_invoice(&mut self, invoice: Invoice);

    // allocations
    fn allocations_for_payment(&self, payment_id: PaymentId) -> Vec<PaymentAllocation>;
    fn allocations_for_invoice(&self, invoice_id: InvoiceId) -> Vec<PaymentAllocation>;
    fn put_allocation(&mut self, allocation: PaymentAllocation);
    fn remove_allocations_for_payment(&mut self, payment_id: PaymentId);

    // credit ledger
    fn credit_events_for_enrolment(&self, enrolment_id: EnrolmentId) -> Vec<CreditEvent>;
    fn put_credit_event(&mut self, event: CreditEvent);
    fn remove_credit_events_for_invoice(&mut self, invoice_id: InvoiceId);

    // enrolments
    fn enrolment(&self, id: EnrolmentId) -> Option<Enrolment>;
    fn enrolments_for_family(&self, family_id: FamilyId) -> Vec<Enrolment>;
    fn put_enrolment(&mut self, enrolment: Enrolment);

    // away periods
    fn away_period(&self, id: AwayPeriodId) -> Option<AwayPeriod>;
    fn away_periods_for_enrolment(&self, enrolment_id: EnrolmentId) -> Vec<AwayPeriod>;
    fn put_away_period(&mut self, period: AwayPeriod);
}

/// in-memory store, transactions snapshot and restore on error
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    payments: HashMap<PaymentId, Payment>,
    invoices: HashMap<InvoiceId, Invoice>,
    enrolments: HashMap<EnrolmentId, Enrolment>,
    away_periods: HashMap<AwayPeriodId, AwayPeriod>,
    allocations: Vec<PaymentAllocation>,
    credit_events: Vec<CreditEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BillingStore for MemoryStore {
    fn transaction<T>(&mut self, work: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        match work(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = snapshot;
                Err(err)
            }
        }
    }

    fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.payments.get(&id).cloned()
    }

    fn payment_by_idempotency_key(&self, family_id: FamilyId, key: &str) -> Option<Payment> {
        self.payments
            .values()
            .find(|p| p.family_id == family_id && p.idempotency_key == key)
            .cloned()
    }

    fn payments_for_family(&self, family_id: FamilyId) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| p.family_id == family_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.received_at);
        payments
    }

    fn put_payment(&mut self, payment: Payment) {
        self.payments.insert(payment.id, payment);
    }

    fn invoice(&self, id: InvoiceId) -> Option<Invoice> {
        self.invoices.get(&id).cloned()
    }

    fn invoices_for_enrolment(&self, enrolment_id: EnrolmentId) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .values()
            .filter(|i| i.enrolment_items(enrolment_id).next().is_some())
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.issued_at);
        invoices
    }

    fn invoices_for_family(&self, family_id: FamilyId) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .values()
            .filter(|i| i.family_id == family_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.issued_at);
        invoices
    }

    fn put_invoice(&mut self, invoice: Invoice) {
        self.invoices.insert(invoice.id, invoice);
    }

    fn allocations_for_payment(&self, payment_id: PaymentId) -> Vec<PaymentAllocation> {
        self.allocations
            .iter()
            .filter(|a| a.payment_id == payment_id)
            .copied()
            .collect()
    }

    fn allocations_for_invoice(&self, invoice_id: InvoiceId) -> Vec<PaymentAllocation> {
        self.allocations
            .iter()
            .filter(|a| a.invoice_id == invoice_id)
            .copied()
            .collect()
    }

    fn put_allocation(&mut self, allocation: PaymentAllocation) {
        self.allocations.push(allocation);
    }

    fn remove_allocations_for_payment(&mut self, payment_id: PaymentId) {
        self.allocations.retain(|a| a.payment_id != payment_id);
    }

    fn credit_events_for_enrolment(&self, enrolment_id: EnrolmentId) -> Vec<CreditEvent> {
        let mut events: Vec<CreditEvent> = self
            .credit_events
            .iter()
            .filter(|e| e.enrolment_id == enrolment_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.recorded_at);
        events
    }

    fn put_credit_event(&mut self, event: CreditEvent) {
        self.credit_events.push(event);
    }

    fn remove_credit_events_for_invoice(&mut self, invoice_id: InvoiceId) {
        self.credit_events
            .retain(|e| e.invoice_id != Some(invoice_id));
    }

    fn enrolment(&self, id: EnrolmentId) -> Option<Enrolment> {
        self.enrolments.get(&id).cloned()
    }

    fn enrolments_for_family(&self, family_id: FamilyId) -> Vec<Enrolment> {
        let mut enrolments: Vec<Enrolment> = self
            .enrolments
            .values()
            .filter(|e| e.family_id == family_id)
            .cloned()
            .collect();
        enrolments.sort_by_key(|e| e.start_date);
        enrolments
    }

    fn put_enrolment(&mut self, enrolment: Enrolment) {
        self.enrolments.insert(enrolment.id, enrolment);
    }

    fn away_period(&self, id: AwayPeriodId) -> Option<AwayPeriod> {
        self.away_periods.get(&id).cloned()
    }

    fn away_periods_for_enrolment(&self, enrolment_id: EnrolmentId) -> Vec<AwayPeriod> {
        let mut periods: Vec<AwayPeriod> = self
            .away_periods
            .values()
            .filter(|p| p.enrolment_id == enrolment_id)
            .cloned()
            .collect();
        periods.sort_by_key(|p| p.start);
        periods
    }

    fn put_away_period(&mut self, period: AwayPeriod) {
        self.away_periods.insert(period.id, period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BillingError;
    use crate::money::Money;
    use crate::types::{PaymentMethod, PaymentStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn payment_for(family_id: FamilyId, key: &str) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            family_id,
            amount: Money::from_major(240),
            method: PaymentMethod::Card,
            status: PaymentStatus::Cleared,
            idempotency_key: key.to_string(),
            received_at: Utc::now(),
            voided_at: None,
        }
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut store = MemoryStore::new();
        let family = Uuid::new_v4();

        let result: Result<()> = store.transaction(|store| {
            store.put_payment(payment_for(family, "abc"));
            Err(BillingError::InvalidPaymentAmount {
                amount: Money::ZERO,
            })
        });

        assert!(result.is_err());
        assert!(store.payments_for_family(family).is_empty());
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let mut store = MemoryStore::new();
        let family = Uuid::new_v4();

        store
            .transaction(|store| {
                store.put_payment(payment_for(family, "abc"));
                Ok(())
            })
            .unwrap();

        assert_eq!(store.payments_for_family(family).len(), 1);
    }

    #[test]
    fn test_idempotency_key_is_scoped_to_family() {
        let mut store = MemoryStore::new();
        let family_a = Uuid::new_v4();
        let family_b = Uuid::new_v4();
        let paid_a = payment_for(family_a, "week-3");
        store.put_payment(paid_a.clone());
        store.put_payment(payment_for(family_b, "week-3"));

        let found = store.payment_by_idempotency_key(family_a, "week-3").unwrap();
        assert_eq!(found.id, paid_a.id);
        assert!(store
            .payment_by_idempotency_key(Uuid::new_v4(), "week-3")
            .is_none());
    }

    #[test]
    fn test_remove_credit_events_for_invoice() {
        let mut store = MemoryStore::new();
        let enrolment = Uuid::new_v4();
        let invoice = Uuid::new_v4();
        let now = Utc::now();

        store.put_credit_event(CreditEvent::purchase(enrolment, 10, invoice, now));
        store.put_credit_event(CreditEvent::manual_adjust(enrolment, 2, "promo", now));
        assert_eq!(store.credit_events_for_enrolment(enrolment).len(), 2);

        store.remove_credit_events_for_invoice(invoice);
        let remaining = store.credit_events_for_enrolment(enrolment);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].delta, 2);
    }
}
