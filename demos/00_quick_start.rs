/// quick start - record a payment and see the coverage it buys
use chrono::{TimeZone, Utc, Weekday};
use swim_billing_rs::{
    BillingSettings, BillingStore, ClassTemplate, ClosureCalendar, DayKey, Enrolment,
    EnrolmentPlan, EventStore, FamilyStatement, MemoryStore, Money, PaymentMethod,
    PaymentRecorder, RecordPayment, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
    ));

    // a monday class and a family enrolled from jan 5
    let templates = vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)];
    let enrolment = Enrolment::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        vec![templates[0].id],
        DayKey::parse("2026-01-05")?,
        EnrolmentPlan::weekly("Minnows", Money::from_major(120), 4, 1),
    );
    let family_id = enrolment.family_id;
    let enrolment_id = enrolment.id;

    let mut store = MemoryStore::new();
    store.put_enrolment(enrolment);

    // record a four week payment
    let closures = ClosureCalendar::new();
    let settings = BillingSettings::default();
    let recorder = PaymentRecorder::new(&closures, &settings);
    let mut events = EventStore::new();
    let request = RecordPayment::new(
        family_id,
        enrolment_id,
        Money::from_major(120),
        PaymentMethod::Card,
        "jan-invoice",
    );
    recorder.record_payment(&mut store, &templates, request, &time, &mut events)?;

    // print the family statement
    let statement = FamilyStatement::build(&store, family_id, &time);
    println!("{}", statement.to_json_pretty()?);

    Ok(())
}
