pub mod away;
pub mod billing;
pub mod calendar;
pub mod config;
pub mod coverage;
pub mod enrolment;
pub mod errors;
pub mod events;
pub mod money;
pub mod schedule;
pub mod types;

// re-export key types
pub use away::{AwayAdjustment, AwayPeriod, AwayPlanner, AwayWindow};
pub use billing::{
    BillingStore, CreditEvent, EnrolmentEntitlementView, FamilyStatement, Invoice, InvoiceView,
    LineItem, MemoryStore, Payment, PaymentAllocation, PaymentRecorder, PaymentView,
    RecordPayment,
};
pub use calendar::{BusinessCalendar, DayKey};
pub use config::{BillingPolicy, BillingSettings, EnrolmentPlan};
pub use coverage::{
    block_pay_ahead_coverage, paid_through_after_template_change, BlockCoverage, BlockPayAhead,
    CoverageEngine, CoverageWindow, TemplateChange,
};
pub use enrolment::Enrolment;
pub use errors::{BillingError, Result};
pub use events::{Event, EventStore};
pub use money::Money;
pub use schedule::{
    ClassCancellation, ClassTemplate, ClosureCalendar, Holiday, HolidayScope, OccurrenceIter,
};
pub use types::{
    BillingType, EnrolmentStatus, InvoiceStatus, LineItemKind, PaymentMethod, PaymentStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use chrono_tz;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
