/// block credits - per-class plans grant a ledger of credits instead of dates
use chrono::{TimeZone, Utc, Weekday};
use swim_billing_rs::{
    BillingSettings, BillingStore, ClassTemplate, ClosureCalendar, DayKey, Enrolment,
    EnrolmentPlan, EventStore, FamilyStatement, MemoryStore, Money, PaymentMethod,
    PaymentRecorder, RecordPayment, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== block credits example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
    ));

    let templates = vec![ClassTemplate::weekly(Uuid::new_v4(), Weekday::Wed)];
    let enrolment = Enrolment::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        vec![templates[0].id],
        DayKey::parse("2026-01-07")?,
        EnrolmentPlan::flexi_ten(),
    );
    let family_id = enrolment.family_id;
    let enrolment_id = enrolment.id;
    let mut store = MemoryStore::new();
    store.put_enrolment(enrolment);

    let closures = ClosureCalendar::new();
    let settings = BillingSettings::default();
    let recorder = PaymentRecorder::new(&closures, &settings);
    let mut events = EventStore::new();

    // buy a ten class block
    let request = RecordPayment::new(
        family_id,
        enrolment_id,
        Money::from_major(250),
        PaymentMethod::Card,
        "flexi-block-1",
    );
    recorder.record_payment(&mut store, &templates, request, &time, &mut events)?;
    let enrolment = store.enrolment(enrolment_id).unwrap();
    println!("credits after purchase: {}", enrolment.credits_remaining);

    // two wednesdays attended
    let balance = recorder.consume_credit(
        &mut store,
        enrolment_id,
        DayKey::parse("2026-01-07")?,
        &time,
        &mut events,
    )?;
    println!("after class on jan 7: {balance}");
    let balance = recorder.consume_credit(
        &mut store,
        enrolment_id,
        DayKey::parse("2026-01-14")?,
        &time,
        &mut events,
    )?;
    println!("after class on jan 14: {balance}");

    // front desk grants a goodwill credit
    let balance = recorder.adjust_credits(
        &mut store,
        enrolment_id,
        1,
        "missed assessment week",
        &time,
        &mut events,
    )?;
    println!("after manual adjustment: {balance}");

    let statement = FamilyStatement::build(&store, family_id, &time);
    println!(
        "\ninvoice credits purchased: {:?}",
        statement.invoices[0].credits_purchased
    );
    println!(
        "projected coverage: {:?} to {:?}",
        statement.invoices[0].coverage_start, statement.invoices[0].coverage_end
    );

    Ok(())
}
