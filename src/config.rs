use chrono_tz::Tz;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calendar::BusinessCalendar;
use crate::errors::{BillingError, Result};
use crate::money::Money;
use crate::types::BillingType;

/// how a plan converts money into entitlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingPolicy {
    /// each purchased unit pays for a fixed number of weeks of classes
    PerWeek { duration_weeks: u32 },
    /// each purchased unit grants a block of class credits
    PerClass { block_class_count: u32 },
}

impl BillingPolicy {
    pub fn billing_type(&self) -> BillingType {
        match self {
            BillingPolicy::PerWeek { .. } => BillingType::PerWeek,
            BillingPolicy::PerClass { .. } => BillingType::PerClass,
        }
    }
}

/// enrolment plan, the priced product a family buys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolmentPlan {
    pub name: String,
    /// price of one purchased unit (one term, or one block)
    pub price: Money,
    pub policy: BillingPolicy,
    /// scheduled classes per week under this plan
    pub sessions_per_week: u32,
}

impl EnrolmentPlan {
    /// weekly plan paying ahead a fixed number of weeks per unit
    pub fn weekly(name: &str, price: Money, duration_weeks: u32, sessions_per_week: u32) -> Self {
        Self {
            name: name.to_string(),
            price,
            policy: BillingPolicy::PerWeek { duration_weeks },
            sessions_per_week,
        }
    }

    /// block plan granting class credits per unit
    pub fn class_block(name: &str, price: Money, block_class_count: u32) -> Self {
        Self {
            name: name.to_string(),
            price,
            policy: BillingPolicy::PerClass { block_class_count },
            sessions_per_week: 1,
        }
    }

    /// create standard twelve-week term configuration
    pub fn term_weekly() -> Self {
        Self::weekly("Term (12 weeks)", Money::from_cents(24_000), 12, 1)
    }

    /// create ten-class flexi block configuration
    pub fn flexi_ten() -> Self {
        Self::class_block("Flexi 10", Money::from_cents(25_000), 10)
    }

    pub fn billing_type(&self) -> BillingType {
        self.policy.billing_type()
    }

    /// scheduled sessions granted by one purchased unit
    pub fn sessions_per_unit(&self) -> u32 {
        match self.policy {
            BillingPolicy::PerWeek { duration_weeks } => duration_weeks * self.sessions_per_week,
            BillingPolicy::PerClass { block_class_count } => block_class_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.price.as_decimal() < dec!(0) {
            return Err(BillingError::InvalidConfiguration {
                message: format!("plan '{}' has a negative price", self.name),
            });
        }
        match self.policy {
            BillingPolicy::PerWeek { duration_weeks } => {
                if duration_weeks == 0 {
                    return Err(BillingError::InvalidConfiguration {
                        message: format!("plan '{}' pays ahead zero weeks", self.name),
                    });
                }
                if self.sessions_per_week == 0 {
                    return Err(BillingError::InvalidConfiguration {
                        message: format!("plan '{}' schedules zero sessions per week", self.name),
                    });
                }
            }
            BillingPolicy::PerClass { block_class_count } => {
                if block_class_count == 0 {
                    return Err(BillingError::InvalidConfiguration {
                        message: format!("plan '{}' grants zero credits per block", self.name),
                    });
                }
            }
        }
        Ok(())
    }
}

/// engine-wide billing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSettings {
    /// business timezone all day keys are derived in
    pub timezone: Tz,
    /// extra weeks added past the expected coverage horizon
    pub horizon_slack_weeks: u32,
    /// days the search horizon widens per retry when a walk comes up short
    pub horizon_retry_step_days: i64,
    /// how many times the horizon widens before giving up
    pub horizon_retry_attempts: u32,
}

impl BillingSettings {
    pub fn calendar(&self) -> BusinessCalendar {
        BusinessCalendar::new(self.timezone)
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon_retry_step_days <= 0 {
            return Err(BillingError::InvalidConfiguration {
                message: "horizon retry step must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Australia::Sydney,
            horizon_slack_weeks: 4,
            horizon_retry_step_days: 28,
            horizon_retry_attempts: 8,
        }
    }
}
