/// holiday coverage - closed weeks extend paid coverage instead of burning it
use chrono::{TimeZone, Utc, Weekday};
use swim_billing_rs::{
    BillingSettings, BillingStore, ClassTemplate, ClosureCalendar, CoverageEngine, DayKey,
    Enrolment, EnrolmentPlan, EventStore, Holiday, MemoryStore, Money, PaymentMethod,
    PaymentRecorder, RecordPayment, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== holiday coverage example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
    ));

    let templates = vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Mon)];

    // the pool closes for a week in january, and one monday is cancelled
    let mut closures = ClosureCalendar::new().with_holiday(Holiday::global(
        "summer holidays",
        DayKey::parse("2026-01-12")?,
        DayKey::parse("2026-01-18")?,
    ));
    closures.add_cancellation(
        templates[0].id,
        DayKey::parse("2026-02-02")?,
        "pool maintenance",
    );

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

    // pay for four weeks of lessons
    let settings = BillingSettings::default();
    let recorder = PaymentRecorder::new(&closures, &settings);
    let mut events = EventStore::new();
    let request = RecordPayment::new(
        family_id,
        enrolment_id,
        Money::from_major(120),
        PaymentMethod::DirectDebit,
        "jan-invoice",
    );
    recorder.record_payment(&mut store, &templates, request, &time, &mut events)?;

    // jan 12 falls in the holiday and feb 2 is cancelled, so the four
    // paid sessions land on jan 5, jan 19, jan 26 and feb 9
    let enrolment = store.enrolment(enrolment_id).unwrap();
    println!(
        "paid through: {}",
        enrolment.paid_through.map(|d| d.to_string()).unwrap_or_default()
    );

    let engine = CoverageEngine::new(&closures);
    let billable = engine.count_sessions(
        &templates,
        DayKey::parse("2026-01-05")?,
        DayKey::parse("2026-02-09")?,
    );
    println!("billable mondays between jan 5 and feb 9: {billable}");

    println!("\nevents:");
    for event in events.events() {
        println!("  {event:?}");
    }

    Ok(())
}
