use hourglass_rs::SafeTimeProvider;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::away::{AwayPeriod, AwayPlanner, AwayWindow};
use crate::billing::store::BillingStore;
use crate::billing::{
    credits_remaining, CreditEvent, Invoice, LineItem, Payment, PaymentAllocation,
};
use crate::calendar::DayKey;
use crate::config::{BillingPolicy, BillingSettings};
use crate::coverage::{
    block_pay_ahead_coverage, paid_through_after_template_change, BlockPayAhead, CoverageEngine,
    CoverageWindow, TemplateChange,
};
use crate::enrolment::Enrolment;
use crate::errors::{BillingError, Result};
use crate::events::{Event, EventStore};
use crate::money::Money;
use crate::schedule::{weekly_frequency, ClassTemplate, ClosureCalendar};
use crate::types::{
    AwayPeriodId, BillingType, EnrolmentId, EnrolmentStatus, FamilyId, LineItemKind,
    PaymentId, PaymentMethod, PaymentStatus,
};

/// a payment to record against an enrolment
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPayment {
    pub family_id: FamilyId,
    pub enrolment_id: EnrolmentId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// caller-supplied key, replays with the same key return the original
    pub idempotency_key: String,
    /// per-class plans may buy a longer block than the plan minimum
    pub custom_block_length: Option<u32>,
    /// products or adjustments invoiced alongside the enrolment charge
    pub extra_items: Vec<LineItem>,
}

impl RecordPayment {
    pub fn new(
        family_id: FamilyId,
        enrolment_id: EnrolmentId,
        amount: Money,
        method: PaymentMethod,
        idempotency_key: &str,
    ) -> Self {
        Self {
            family_id,
            enrolment_id,
            amount,
            method,
            idempotency_key: idempotency_key.to_string(),
            custom_block_length: None,
            extra_items: Vec::new(),
        }
    }

    pub fn with_block_length(mut self, classes: u32) -> Self {
        self.custom_block_length = Some(classes);
        self
    }

    pub fn with_extra_item(mut self, item: LineItem) -> Self {
        self.extra_items.push(item);
        self
    }
}

/// records payments and keeps entitlement derived from them
///
/// every mutating operation runs inside a store transaction and stages its
/// events locally, so a failed operation leaves neither state nor events
/// behind.
pub struct PaymentRecorder<'a> {
    closures: &'a ClosureCalendar,
    settings: &'a BillingSettings,
}

impl<'a> PaymentRecorder<'a> {
    pub fn new(closures: &'a ClosureCalendar, settings: &'a BillingSettings) -> Self {
        Self { closures, settings }
    }

    fn engine(&self) -> CoverageEngine<'a> {
        CoverageEngine::new(self.closures)
    }

    fn planner(&self) -> AwayPlanner<'a> {
        AwayPlanner::new(self.closures, self.settings)
    }

    /// record a payment, extend entitlement, and issue the invoice
    ///
    /// the replay lookup runs inside the same transaction as the writes, so
    /// a retried key either sees the committed payment or serializes behind
    /// it. a replay returns the originally recorded payment without touching
    /// the store or emitting anything.
    pub fn record_payment<S: BillingStore>(
        &self,
        store: &mut S,
        templates: &[ClassTemplate],
        request: RecordPayment,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Payment> {
        let mut staged = EventStore::new();
        let payment = store.transaction(|store| {
            if let Some(existing) =
                store.payment_by_idempotency_key(request.family_id, &request.idempotency_key)
            {
                return Ok(existing);
            }
            self.record_new_payment(store, templates, &request, time_provider, &mut staged)
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(payment)
    }

    fn record_new_payment<S: BillingStore>(
        &self,
        store: &mut S,
        templates: &[ClassTemplate],
        request: &RecordPayment,
        time_provider: &SafeTimeProvider,
        staged: &mut EventStore,
    ) -> Result<Payment> {
        // validate
        if !request.amount.is_positive() {
            return Err(BillingError::InvalidPaymentAmount {
                amount: request.amount,
            });
        }
        let mut enrolment = store
            .enrolment(request.enrolment_id)
            .ok_or(BillingError::EnrolmentNotFound {
                id: request.enrolment_id,
            })?;
        if enrolment.family_id != request.family_id {
            return Err(BillingError::FamilyMismatch {
                enrolment_id: enrolment.id,
            });
        }
        enrolment.require_billable()?;
        enrolment.plan.validate()?;

        let now = time_provider.now();

        // the enrolment charge is what remains after extra items
        let extra_total = request
            .extra_items
            .iter()
            .fold(Money::ZERO, |total, item| total + item.amount);
        let plan_amount = request.amount - extra_total;
        let quantity = purchased_units(plan_amount, enrolment.plan.price)?;
        let charge = enrolment.plan.price * Decimal::from(quantity);

        let payment = Payment {
            id: Uuid::new_v4(),
            family_id: request.family_id,
            amount: request.amount,
            method: request.method,
            status: PaymentStatus::Cleared,
            idempotency_key: request.idempotency_key.clone(),
            received_at: now,
            voided_at: None,
        };
        staged.emit(Event::PaymentRecorded {
            payment_id: payment.id,
            family_id: payment.family_id,
            amount: payment.amount,
            idempotency_key: payment.idempotency_key.clone(),
            timestamp: now,
        });

        // extend entitlement per the plan's policy
        let description = format!("{} x{}", enrolment.plan.name, quantity);
        let (enrolment_item, credits_granted) = match enrolment.plan.policy {
            BillingPolicy::PerWeek { duration_weeks } => {
                let sessions = quantity * duration_weeks * enrolment.plan.sessions_per_week;
                let anchor = coverage_anchor(&enrolment);
                let window =
                    self.walk_coverage(templates, anchor, sessions, enrolment.end_date)?;

                staged.emit(Event::CoverageExtended {
                    enrolment_id: enrolment.id,
                    previous_paid_through: enrolment.paid_through,
                    new_paid_through: window.end,
                    sessions: window.consumed,
                    timestamp: now,
                });
                enrolment.paid_through = Some(window.end);

                let item = LineItem {
                    kind: LineItemKind::Enrolment,
                    description,
                    amount: charge,
                    enrolment_id: Some(enrolment.id),
                    coverage_start: Some(window.start),
                    coverage_end: Some(window.end),
                    credits_purchased: None,
                };
                (item, 0)
            }
            BillingPolicy::PerClass { block_class_count } => {
                let block_length = match request.custom_block_length {
                    Some(classes) if classes < block_class_count => {
                        return Err(BillingError::BlockLengthBelowMinimum {
                            minimum: block_class_count,
                            requested: classes,
                        });
                    }
                    Some(classes) => classes,
                    None => block_class_count,
                };
                let credits = quantity * block_length;

                // projected coverage is advisory for blocks, credits are
                // granted even when no upcoming schedule exists yet
                let anchor = coverage_anchor(&enrolment);
                let horizon = self.plan_horizon(templates, anchor, credits);
                let coverage = block_pay_ahead_coverage(
                    &self.engine(),
                    templates,
                    BlockPayAhead {
                        current_paid_through: enrolment.paid_through,
                        enrolment_start: enrolment.start_date,
                        enrolment_end: enrolment.end_date,
                        blocks_purchased: quantity,
                        block_class_count: block_length,
                    },
                    horizon,
                )?;

                let item = LineItem {
                    kind: LineItemKind::Enrolment,
                    description,
                    amount: charge,
                    enrolment_id: Some(enrolment.id),
                    coverage_start: coverage.map(|c| c.coverage_start),
                    coverage_end: coverage.map(|c| c.coverage_end),
                    credits_purchased: Some(credits),
                };
                (item, credits)
            }
        };

        // issue the invoice and allocate the payment to it
        let mut line_items = vec![enrolment_item];
        line_items.extend(request.extra_items.iter().cloned());
        let mut invoice = Invoice::new(request.family_id, line_items, now);
        let owed = invoice.amount_owed();
        let allocated = request.amount.min(owed);
        invoice.set_amount_paid(allocated);
        staged.emit(Event::InvoiceIssued {
            invoice_id: invoice.id,
            family_id: invoice.family_id,
            amount_owed: owed,
            amount_paid: allocated,
            timestamp: now,
        });

        store.put_payment(payment.clone());
        store.put_allocation(PaymentAllocation {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            invoice_id: invoice.id,
            amount: allocated,
        });

        if credits_granted > 0 {
            store.put_credit_event(CreditEvent::purchase(
                enrolment.id,
                credits_granted,
                invoice.id,
                now,
            ));
            let balance = credits_remaining(&store.credit_events_for_enrolment(enrolment.id));
            staged.emit(Event::CreditsPurchased {
                enrolment_id: enrolment.id,
                invoice_id: invoice.id,
                credits: credits_granted,
                balance_after: balance,
                timestamp: now,
            });
            enrolment.credits_remaining = balance;
        }

        store.put_invoice(invoice);
        store.put_enrolment(enrolment);

        Ok(payment)
    }

    /// void a payment and rebuild entitlement from what remains paid
    ///
    /// undoing an already-void payment is a no-op.
    pub fn undo_payment<S: BillingStore>(
        &self,
        store: &mut S,
        payment_id: PaymentId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Payment> {
        let mut staged = EventStore::new();
        let payment = store.transaction(|store| {
            let mut payment = store
                .payment(payment_id)
                .ok_or(BillingError::PaymentNotFound { id: payment_id })?;
            if payment.is_void() {
                return Ok(payment);
            }
            let now = time_provider.now();

            payment.status = PaymentStatus::Void;
            payment.voided_at = Some(now);
            store.put_payment(payment.clone());

            // pull the payment back out of its invoices
            let allocations = store.allocations_for_payment(payment_id);
            store.remove_allocations_for_payment(payment_id);

            let mut touched: Vec<EnrolmentId> = Vec::new();
            for allocation in &allocations {
                let mut invoice =
                    store
                        .invoice(allocation.invoice_id)
                        .ok_or(BillingError::InvoiceNotFound {
                            id: allocation.invoice_id,
                        })?;
                let remaining = store
                    .allocations_for_invoice(invoice.id)
                    .iter()
                    .fold(Money::ZERO, |total, a| total + a.amount);
                let old_status = invoice.status;
                invoice.set_amount_paid(remaining);
                if invoice.status != old_status {
                    staged.emit(Event::InvoiceStatusChanged {
                        invoice_id: invoice.id,
                        old_status,
                        new_status: invoice.status,
                        timestamp: now,
                    });
                }
                for item in &invoice.line_items {
                    if item.kind == LineItemKind::Enrolment {
                        if let Some(enrolment_id) = item.enrolment_id {
                            if !touched.contains(&enrolment_id) {
                                touched.push(enrolment_id);
                            }
                        }
                    }
                }
                store.put_invoice(invoice);
            }

            for enrolment_id in touched {
                self.rebuild_entitlement(store, enrolment_id, now, &mut staged)?;
            }

            staged.emit(Event::PaymentVoided {
                payment_id: payment.id,
                family_id: payment.family_id,
                amount: payment.amount,
                timestamp: now,
            });
            Ok(payment)
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(payment)
    }

    /// recompute an enrolment's entitlement from paid invoices and the ledger
    fn rebuild_entitlement<S: BillingStore>(
        &self,
        store: &mut S,
        enrolment_id: EnrolmentId,
        now: chrono::DateTime<chrono::Utc>,
        staged: &mut EventStore,
    ) -> Result<()> {
        let mut enrolment =
            store
                .enrolment(enrolment_id)
                .ok_or(BillingError::EnrolmentNotFound { id: enrolment_id })?;
        let invoices = store.invoices_for_enrolment(enrolment_id);

        match enrolment.billing_type() {
            BillingType::PerWeek => {
                // furthest coverage across invoices that are still paid
                let mut rebuilt: Option<DayKey> = None;
                for invoice in invoices.iter().filter(|i| i.is_paid()) {
                    for item in invoice.enrolment_items(enrolment_id) {
                        if let Some(end) = item.coverage_end {
                            rebuilt = match rebuilt {
                                Some(current) if current >= end => Some(current),
                                _ => Some(end),
                            };
                        }
                    }
                }
                // an absence keeps its shift only while no remaining invoice
                // already carries coverage past the day the shift landed on.
                // later invoices walk from the shifted paid-through, their
                // coverage embeds the shift already.
                for period in store
                    .away_periods_for_enrolment(enrolment_id)
                    .iter()
                    .filter(|p| p.active)
                {
                    if let (Some(day), Some(shifted)) = (rebuilt, period.shifted_paid_through) {
                        if day < shifted {
                            rebuilt = Some(day.add_days(period.applied_delta_days));
                        }
                    }
                }

                if enrolment.paid_through != rebuilt {
                    staged.emit(Event::PaidThroughRebuilt {
                        enrolment_id,
                        previous: enrolment.paid_through,
                        current: rebuilt,
                        timestamp: now,
                    });
                    enrolment.paid_through = rebuilt;
                }
            }
            BillingType::PerClass => {
                // purchase events must mirror the paid state of their invoice
                for invoice in &invoices {
                    let granted: u32 = invoice
                        .enrolment_items(enrolment_id)
                        .filter_map(|item| item.credits_purchased)
                        .sum();
                    if granted == 0 {
                        continue;
                    }
                    let has_purchase = store
                        .credit_events_for_enrolment(enrolment_id)
                        .iter()
                        .any(|e| {
                            e.kind == crate::types::CreditEventKind::Purchase
                                && e.invoice_id == Some(invoice.id)
                        });
                    if invoice.is_paid() && !has_purchase {
                        store.put_credit_event(CreditEvent::purchase(
                            enrolment_id,
                            granted,
                            invoice.id,
                            invoice.issued_at,
                        ));
                    } else if !invoice.is_paid() && has_purchase {
                        store.remove_credit_events_for_invoice(invoice.id);
                    }
                }

                let balance = credits_remaining(&store.credit_events_for_enrolment(enrolment_id));
                if balance != enrolment.credits_remaining {
                    staged.emit(Event::CreditsRebuilt {
                        enrolment_id,
                        previous: enrolment.credits_remaining,
                        current: balance,
                        timestamp: now,
                    });
                    enrolment.credits_remaining = balance;
                }
            }
        }

        store.put_enrolment(enrolment);
        Ok(())
    }

    /// manually move an enrolment's credit balance
    pub fn adjust_credits<S: BillingStore>(
        &self,
        store: &mut S,
        enrolment_id: EnrolmentId,
        delta: i64,
        note: &str,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<i64> {
        let mut staged = EventStore::new();
        let balance = store.transaction(|store| {
            let mut enrolment =
                store
                    .enrolment(enrolment_id)
                    .ok_or(BillingError::EnrolmentNotFound { id: enrolment_id })?;
            if delta == 0 {
                return Ok(enrolment.credits_remaining);
            }
            let now = time_provider.now();

            store.put_credit_event(CreditEvent::manual_adjust(enrolment_id, delta, note, now));
            let balance = credits_remaining(&store.credit_events_for_enrolment(enrolment_id));
            staged.emit(Event::CreditsAdjusted {
                enrolment_id,
                delta,
                balance_after: balance,
                note: note.to_string(),
                timestamp: now,
            });
            enrolment.credits_remaining = balance;
            store.put_enrolment(enrolment);
            Ok(balance)
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(balance)
    }

    /// burn one credit for an attended class
    pub fn consume_credit<S: BillingStore>(
        &self,
        store: &mut S,
        enrolment_id: EnrolmentId,
        day: DayKey,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<i64> {
        let mut staged = EventStore::new();
        let balance = store.transaction(|store| {
            let mut enrolment =
                store
                    .enrolment(enrolment_id)
                    .ok_or(BillingError::EnrolmentNotFound { id: enrolment_id })?;
            let now = time_provider.now();

            store.put_credit_event(CreditEvent::consumption(enrolment_id, day, now));
            let balance = credits_remaining(&store.credit_events_for_enrolment(enrolment_id));
            staged.emit(Event::CreditConsumed {
                enrolment_id,
                day,
                balance_after: balance,
                timestamp: now,
            });
            enrolment.credits_remaining = balance;
            store.put_enrolment(enrolment);
            Ok(balance)
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(balance)
    }

    /// force paid-through to a specific day
    pub fn override_paid_through<S: BillingStore>(
        &self,
        store: &mut S,
        enrolment_id: EnrolmentId,
        day: Option<DayKey>,
        reason: &str,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        let mut staged = EventStore::new();
        store.transaction(|store| {
            let mut enrolment =
                store
                    .enrolment(enrolment_id)
                    .ok_or(BillingError::EnrolmentNotFound { id: enrolment_id })?;
            staged.emit(Event::PaidThroughOverridden {
                enrolment_id,
                previous: enrolment.paid_through,
                current: day,
                reason: reason.to_string(),
                timestamp: time_provider.now(),
            });
            enrolment.paid_through = day;
            store.put_enrolment(enrolment);
            Ok(())
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(())
    }

    /// record a family absence and push paid coverage out past it
    pub fn apply_away_period<S: BillingStore>(
        &self,
        store: &mut S,
        templates: &[ClassTemplate],
        enrolment_id: EnrolmentId,
        window: AwayWindow,
        makeup_days: &[DayKey],
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<AwayPeriod> {
        let mut staged = EventStore::new();
        let period = store.transaction(|store| {
            let mut enrolment =
                store
                    .enrolment(enrolment_id)
                    .ok_or(BillingError::EnrolmentNotFound { id: enrolment_id })?;
            let now = time_provider.now();

            let planner = self.planner();
            let adjustment = planner.plan(
                templates,
                window,
                enrolment.paid_through,
                enrolment.end_date,
                makeup_days,
            )?;
            let applied = planner.apply(&mut enrolment, &adjustment);

            let period = AwayPeriod {
                id: Uuid::new_v4(),
                enrolment_id,
                start: window.start,
                end: window.end,
                missed_sessions: adjustment.missed_sessions(),
                applied_delta_days: applied,
                shifted_paid_through: enrolment.paid_through,
                active: true,
            };
            staged.emit(Event::AwayPeriodApplied {
                away_period_id: period.id,
                enrolment_id,
                start: period.start,
                end: period.end,
                missed_sessions: period.missed_sessions,
                delta_days: applied,
                timestamp: now,
            });
            store.put_away_period(period.clone());
            store.put_enrolment(enrolment);
            Ok(period)
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(period)
    }

    /// change an away period's window, reverting the old shift first
    pub fn edit_away_period<S: BillingStore>(
        &self,
        store: &mut S,
        templates: &[ClassTemplate],
        away_period_id: AwayPeriodId,
        window: AwayWindow,
        makeup_days: &[DayKey],
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<AwayPeriod> {
        let mut staged = EventStore::new();
        let period = store.transaction(|store| {
            let mut period =
                store
                    .away_period(away_period_id)
                    .ok_or(BillingError::AwayPeriodNotFound {
                        id: away_period_id,
                    })?;
            let mut enrolment = store.enrolment(period.enrolment_id).ok_or(
                BillingError::EnrolmentNotFound {
                    id: period.enrolment_id,
                },
            )?;
            let now = time_provider.now();

            // revert then replan so the edit lands exactly where a fresh
            // application of the new window would
            let planner = self.planner();
            if period.active {
                planner.revert(&mut enrolment, period.applied_delta_days);
            }
            let adjustment = planner.plan(
                templates,
                window,
                enrolment.paid_through,
                enrolment.end_date,
                makeup_days,
            )?;
            let applied = planner.apply(&mut enrolment, &adjustment);

            period.start = window.start;
            period.end = window.end;
            period.missed_sessions = adjustment.missed_sessions();
            period.applied_delta_days = applied;
            period.shifted_paid_through = enrolment.paid_through;
            period.active = true;

            staged.emit(Event::AwayPeriodEdited {
                away_period_id: period.id,
                enrolment_id: period.enrolment_id,
                start: period.start,
                end: period.end,
                missed_sessions: period.missed_sessions,
                delta_days: applied,
                timestamp: now,
            });
            store.put_away_period(period.clone());
            store.put_enrolment(enrolment);
            Ok(period)
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(period)
    }

    /// remove an away period and take its shift back
    ///
    /// removing an already-removed period is a no-op.
    pub fn remove_away_period<S: BillingStore>(
        &self,
        store: &mut S,
        away_period_id: AwayPeriodId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<AwayPeriod> {
        let mut staged = EventStore::new();
        let period = store.transaction(|store| {
            let mut period =
                store
                    .away_period(away_period_id)
                    .ok_or(BillingError::AwayPeriodNotFound {
                        id: away_period_id,
                    })?;
            if !period.active {
                return Ok(period);
            }
            let mut enrolment = store.enrolment(period.enrolment_id).ok_or(
                BillingError::EnrolmentNotFound {
                    id: period.enrolment_id,
                },
            )?;

            self.planner()
                .revert(&mut enrolment, period.applied_delta_days);
            staged.emit(Event::AwayPeriodRemoved {
                away_period_id: period.id,
                enrolment_id: period.enrolment_id,
                reverted_delta_days: period.applied_delta_days,
                timestamp: time_provider.now(),
            });
            period.active = false;
            store.put_away_period(period.clone());
            store.put_enrolment(enrolment);
            Ok(period)
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(period)
    }

    /// move an enrolment onto a new weekly schedule
    ///
    /// paid sessions carry across: the paid-through day is re-derived by
    /// walking the new schedule for the same entitled count. `old_templates`
    /// must describe the enrolment's current slots exactly.
    pub fn apply_template_change<S: BillingStore>(
        &self,
        store: &mut S,
        enrolment_id: EnrolmentId,
        old_templates: &[ClassTemplate],
        new_templates: &[ClassTemplate],
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Option<DayKey>> {
        let mut staged = EventStore::new();
        let paid_through = store.transaction(|store| {
            let mut enrolment =
                store
                    .enrolment(enrolment_id)
                    .ok_or(BillingError::EnrolmentNotFound { id: enrolment_id })?;
            let now = time_provider.now();

            let described: Vec<_> = old_templates.iter().map(|t| t.id).collect();
            let mismatched = enrolment
                .template_ids
                .iter()
                .any(|id| !described.contains(id))
                || described
                    .iter()
                    .any(|id| !enrolment.template_ids.contains(id));
            if mismatched {
                return Err(BillingError::AmbiguousClassAssignment {
                    message: format!(
                        "old templates do not match the enrolment's current slots ({} described, {} enrolled)",
                        described.len(),
                        enrolment.template_ids.len()
                    ),
                });
            }

            let previous = enrolment.paid_through;
            if enrolment.billing_type() == BillingType::PerWeek {
                if let Some(old_paid_through) = enrolment.paid_through {
                    let remapped = paid_through_after_template_change(
                        &self.engine(),
                        old_templates,
                        new_templates,
                        TemplateChange {
                            enrolment_start: enrolment.start_date,
                            enrolment_end: enrolment.end_date,
                            old_paid_through,
                        },
                        self.settings.horizon_slack_weeks,
                    )?;
                    if let Some(day) = remapped {
                        enrolment.paid_through = Some(day);
                    }
                }
            }

            enrolment.template_ids = new_templates.iter().map(|t| t.id).collect();
            staged.emit(Event::TemplateChangeRemapped {
                enrolment_id,
                previous_paid_through: previous,
                new_paid_through: enrolment.paid_through,
                timestamp: now,
            });
            let paid_through = enrolment.paid_through;
            store.put_enrolment(enrolment);
            Ok(paid_through)
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(paid_through)
    }

    /// move an enrolment between lifecycle states
    pub fn set_enrolment_status<S: BillingStore>(
        &self,
        store: &mut S,
        enrolment_id: EnrolmentId,
        status: EnrolmentStatus,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        let mut staged = EventStore::new();
        store.transaction(|store| {
            let mut enrolment =
                store
                    .enrolment(enrolment_id)
                    .ok_or(BillingError::EnrolmentNotFound { id: enrolment_id })?;
            if enrolment.status == status {
                return Ok(());
            }
            let now = time_provider.now();
            staged.emit(Event::EnrolmentStatusChanged {
                enrolment_id,
                old_status: enrolment.status,
                new_status: status,
                timestamp: now,
            });
            enrolment.update_status(status, now);
            store.put_enrolment(enrolment);
            Ok(())
        })?;
        for event in staged.take_events() {
            events.emit(event);
        }
        Ok(())
    }

    /// walk coverage retrying with a wider horizon when it comes up short
    ///
    /// a short walk is only a result when the schedule genuinely ends and the
    /// horizon has passed that end. on an open schedule a short walk means the
    /// sessions are unreachable, never that they quietly shrink.
    fn walk_coverage(
        &self,
        templates: &[ClassTemplate],
        anchor: DayKey,
        sessions: u32,
        enrolment_end: Option<DayKey>,
    ) -> Result<CoverageWindow> {
        let engine = self.engine();
        let step = self.settings.horizon_retry_step_days;
        let mut horizon = self.plan_horizon(templates, anchor, sessions);
        let cap = schedule_cap(templates, enrolment_end);
        let mut best: Option<CoverageWindow> = None;

        for _ in 0..=self.settings.horizon_retry_attempts {
            if let Some(window) =
                engine.coverage_window(templates, anchor, sessions, enrolment_end, horizon)?
            {
                if window.consumed == sessions {
                    return Ok(window);
                }
                best = Some(window);
            }
            if let Some(cap) = cap {
                if horizon >= cap {
                    // a schedule that genuinely ends covers what it can
                    return best.ok_or(BillingError::ScheduleExhausted {
                        needed: sessions,
                        found: 0,
                    });
                }
            }
            horizon = horizon.add_days(step);
        }

        Err(BillingError::ScheduleExhausted {
            needed: sessions,
            found: best.map_or(0, |window| window.consumed),
        })
    }

    /// expected horizon for a walk, plan shape plus slack
    fn plan_horizon(&self, templates: &[ClassTemplate], anchor: DayKey, sessions: u32) -> DayKey {
        let per_week = weekly_frequency(templates).max(1);
        let weeks = (sessions + per_week - 1) / per_week + self.settings.horizon_slack_weeks;
        anchor.add_days(i64::from(weeks) * 7)
    }
}

/// next unpaid day, where new coverage anchors
fn coverage_anchor(enrolment: &Enrolment) -> DayKey {
    match enrolment.paid_through {
        Some(paid_through) if paid_through >= enrolment.start_date => paid_through.succ(),
        _ => enrolment.start_date,
    }
}

/// last day any occurrence can exist, none while the schedule stays open
///
/// an open-ended weekday template leaves the enrolment end as the only cap.
fn schedule_cap(templates: &[ClassTemplate], enrolment_end: Option<DayKey>) -> Option<DayKey> {
    let mut template_cap: Option<DayKey> = None;
    for template in templates.iter().filter(|t| t.day_of_week.is_some()) {
        match template.end_date {
            None => return enrolment_end,
            Some(end) => {
                template_cap = Some(template_cap.map_or(end, |cap: DayKey| cap.max(end)));
            }
        }
    }
    match (enrolment_end, template_cap) {
        (Some(end), Some(cap)) => Some(end.min(cap)),
        (Some(end), None) => Some(end),
        (None, cap) => cap,
    }
}

/// whole plan units the amount buys at the given price
fn purchased_units(amount: Money, price: Money) -> Result<u32> {
    if !price.is_positive() {
        return Ok(1);
    }
    if amount < price {
        return Err(BillingError::PaymentBelowPlanPrice {
            price,
            provided: amount,
        });
    }
    let units = (amount.as_decimal() / price.as_decimal()).floor();
    Ok(units.to_u32().unwrap_or(1).max(1))
}
