use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::MS_PER_DAY;
use crate::error::AppError;

/// Recurring interval at which a subscription charges.
///
/// Every variant has a fixed whole-number length in days; calendar months are
/// deliberately not used so that period arithmetic stays exact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "billing_cycle", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub const ALL: [BillingCycle; 4] = [
        BillingCycle::Weekly,
        BillingCycle::Monthly,
        BillingCycle::Quarterly,
        BillingCycle::Yearly,
    ];

    /// Length of one billing period in days.
    pub fn days_in_cycle(&self) -> i64 {
        match self {
            BillingCycle::Weekly => 7,
            BillingCycle::Monthly => 30,
            BillingCycle::Quarterly => 90,
            BillingCycle::Yearly => 365,
        }
    }

    /// Length of one billing period.
    pub fn period(&self) -> Duration {
        Duration::milliseconds(self.days_in_cycle() * MS_PER_DAY)
    }

    /// Moves `instant` forward by exactly one billing period.
    ///
    /// Fails with `DateOutOfRange` when the result is past the last representable instant.
    pub fn advance(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        instant.checked_add_signed(self.period()).ok_or_else(|| {
            AppError::DateOutOfRange(format!("{} + one {} period", instant, self))
        })
    }

    /// Factor converting one period's price into a monthly-equivalent amount.
    pub fn monthly_factor(&self) -> Decimal {
        match self {
            BillingCycle::Weekly => Decimal::from(30) / Decimal::from(7),
            BillingCycle::Monthly => Decimal::ONE,
            BillingCycle::Quarterly => Decimal::ONE / Decimal::from(3),
            BillingCycle::Yearly => Decimal::ONE / Decimal::from(12),
        }
    }
}

impl Display for BillingCycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BillingCycle::Weekly => write!(f, "weekly"),
            BillingCycle::Monthly => write!(f, "monthly"),
            BillingCycle::Quarterly => write!(f, "quarterly"),
            BillingCycle::Yearly => write!(f, "yearly"),
        }
    }
}

impl FromStr for BillingCycle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(BillingCycle::Weekly),
            "monthly" => Ok(BillingCycle::Monthly),
            "quarterly" => Ok(BillingCycle::Quarterly),
            "yearly" => Ok(BillingCycle::Yearly),
            _ => Err(anyhow::anyhow!("Invalid billing cycle: {}", s)),
        }
    }
}
