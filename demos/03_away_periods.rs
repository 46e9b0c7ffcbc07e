/// away periods - family absences push paid coverage out, reversibly
use chrono::{TimeZone, Utc, Weekday};
use swim_billing_rs::types::EnrolmentId;
use swim_billing_rs::{
    AwayWindow, BillingSettings, BillingStore, ClassTemplate, ClosureCalendar, DayKey, Enrolment,
    EnrolmentPlan, EventStore, MemoryStore, Money, PaymentMethod, PaymentRecorder, RecordPayment,
    SafeTimeProvider, TimeSource, Uuid,
};

fn paid_through(store: &MemoryStore, enrolment_id: EnrolmentId) -> String {
    store
        .enrolment(enrolment_id)
        .and_then(|e| e.paid_through)
        .map(|d| d.to_string())
        .unwrap_or_else(|| "none".to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== away periods example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
    ));

    let templates = vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)];
    let enrolment = Enrolment::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        vec![templates[0].id],
        DayKey::parse("2026-01-05")?,
        EnrolmentPlan::term_weekly(),
    );
    let family_id = enrolment.family_id;
    let enrolment_id = enrolment.id;
    let mut store = MemoryStore::new();
    store.put_enrolment(enrolment);

    let closures = ClosureCalendar::new();
    let settings = BillingSettings::default();
    let recorder = PaymentRecorder::new(&closures, &settings);
    let mut events = EventStore::new();

    // a twelve week term paid up front
    let request = RecordPayment::new(
        family_id,
        enrolment_id,
        Money::from_major(240),
        PaymentMethod::BankTransfer,
        "term-1",
    );
    recorder.record_payment(&mut store, &templates, request, &time, &mut events)?;
    println!("paid through after term payment: {}", paid_through(&store, enrolment_id));

    // the family is away for ten days, missing two mondays
    let window = AwayWindow {
        start: DayKey::parse("2026-01-10")?,
        end: DayKey::parse("2026-01-20")?,
    };
    let period = recorder.apply_away_period(
        &mut store,
        &templates,
        enrolment_id,
        window,
        &[],
        &time,
        &mut events,
    )?;
    println!(
        "\naway {} to {}: {} missed sessions, shifted {} days",
        period.start, period.end, period.missed_sessions, period.applied_delta_days
    );
    println!("paid through: {}", paid_through(&store, enrolment_id));

    // plans changed, they are back by the 13th
    let window = AwayWindow {
        start: DayKey::parse("2026-01-10")?,
        end: DayKey::parse("2026-01-13")?,
    };
    let period = recorder.edit_away_period(
        &mut store,
        &templates,
        period.id,
        window,
        &[],
        &time,
        &mut events,
    )?;
    println!(
        "\nedited to {} - {}: {} missed session, shifted {} days",
        period.start, period.end, period.missed_sessions, period.applied_delta_days
    );
    println!("paid through: {}", paid_through(&store, enrolment_id));

    // cancelled altogether, the shift reverts
    recorder.remove_away_period(&mut store, period.id, &time, &mut events)?;
    println!("\nafter removal: {}", paid_through(&store, enrolment_id));

    Ok(())
}
