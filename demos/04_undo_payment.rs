/// undo payment - voiding rebuilds entitlement from the invoices that remain
use chrono::{TimeZone, Utc, Weekday};
use swim_billing_rs::{
    BillingSettings, BillingStore, ClassTemplate, ClosureCalendar, DayKey, Enrolment,
    EnrolmentPlan, EventStore, MemoryStore, Money, PaymentMethod, PaymentRecorder, RecordPayment,
    SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== undo payment example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
    ));

    let templates = vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)];
    let enrolment = Enrolment::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        vec![templates[0].id],
        DayKey::parse("2026-01-05")?,
        EnrolmentPlan::weekly("Minnows", Money::from_major(100), 2, 1),
    );
    let family_id = enrolment.family_id;
    let enrolment_id = enrolment.id;
    let mut store = MemoryStore::new();
    store.put_enrolment(enrolment);

    let closures = ClosureCalendar::new();
    let settings = BillingSettings::default();
    let recorder = PaymentRecorder::new(&closures, &settings);
    let mut events = EventStore::new();

    // two fortnightly payments, coverage stacks to jan 26
    let request = RecordPayment::new(
        family_id,
        enrolment_id,
        Money::from_major(100),
        PaymentMethod::Card,
        "fortnight-1",
    );
    recorder.record_payment(&mut store, &templates, request, &time, &mut events)?;
    let request = RecordPayment::new(
        family_id,
        enrolment_id,
        Money::from_major(100),
        PaymentMethod::Card,
        "fortnight-2",
    );
    let second = recorder.record_payment(&mut store, &templates, request, &time, &mut events)?;

    let enrolment = store.enrolment(enrolment_id).unwrap();
    println!("paid through after two payments: {:?}", enrolment.paid_through);

    // the second card payment bounced
    events.clear();
    recorder.undo_payment(&mut store, second.id, &time, &mut events)?;
    let enrolment = store.enrolment(enrolment_id).unwrap();
    println!("paid through after undo: {:?}", enrolment.paid_through);

    println!("\nevents from the undo:");
    for event in events.events() {
        println!("  {event:?}");
    }

    // undoing the same payment again changes nothing
    events.clear();
    recorder.undo_payment(&mut store, second.id, &time, &mut events)?;
    println!("\nsecond undo emitted {} events", events.events().len());

    Ok(())
}
