use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use validator::Validate;

use super::BillingCycle;
use crate::constants::{MAX_CATCH_UP_PERIODS, MS_PER_DAY};
use crate::error::AppError;
use crate::validation::{validate_name, validate_price};

/// Subscription status
///
/// `Active` renews every period, `Cancelled` runs until the end of the last paid
/// period, `Expired` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "subscription_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Cancelled => write!(f, "cancelled"),
            SubscriptionStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            _ => Err(anyhow::anyhow!("Invalid subscription status: {}", s)),
        }
    }
}

/// Subscription entity
///
/// Owned by the record store. Lifecycle operations never mutate a record in
/// place; they return a replacement copy that the caller persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Subscription {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub billing_cycle: BillingCycle,
    /// Anchor of the current billing period.
    pub start_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Checks the record-level invariants and fails with `InvalidRecord` on the first violation.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidRecord(format!(
                "subscription {} has an empty name",
                self.id
            )));
        }
        if self.price <= Decimal::ZERO {
            return Err(AppError::InvalidRecord(format!(
                "subscription {} has non-positive price {}",
                self.id, self.price
            )));
        }
        match (self.status, self.cancelled_at) {
            (SubscriptionStatus::Active, Some(_)) => Err(AppError::InvalidRecord(format!(
                "active subscription {} carries cancelled_at",
                self.id
            ))),
            (SubscriptionStatus::Cancelled, None) => Err(AppError::InvalidRecord(format!(
                "cancelled subscription {} is missing cancelled_at",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    /// Next charge date relative to `now`.
    ///
    /// Active records catch up over any number of elapsed periods until the date
    /// lies strictly after `now`. Cancelled records return the end of the last
    /// paid period without catching up. Expired records have no next charge.
    pub fn next_billing_date(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, AppError> {
        match self.status {
            SubscriptionStatus::Active => {
                let mut next = self.billing_cycle.advance(self.start_date)?;
                let mut periods = 1u32;
                while next <= now {
                    if periods >= MAX_CATCH_UP_PERIODS {
                        return Err(AppError::CatchUpLimitExceeded {
                            limit: MAX_CATCH_UP_PERIODS,
                        });
                    }
                    next = self.billing_cycle.advance(next)?;
                    periods += 1;
                }
                Ok(Some(next))
            }
            SubscriptionStatus::Cancelled => Ok(Some(self.billing_cycle.advance(self.start_date)?)),
            SubscriptionStatus::Expired => Ok(None),
        }
    }

    /// Latest period anchor (`start_date + k * cycle`, k >= 0) that is not after `now`.
    ///
    /// Returns `start_date` unchanged when no full period has elapsed yet.
    pub fn current_billing_period_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        let mut anchor = self.start_date;
        let mut periods = 0u32;
        loop {
            let next = self.billing_cycle.advance(anchor)?;
            if next > now {
                return Ok(anchor);
            }
            if periods >= MAX_CATCH_UP_PERIODS {
                return Err(AppError::CatchUpLimitExceeded {
                    limit: MAX_CATCH_UP_PERIODS,
                });
            }
            anchor = next;
            periods += 1;
        }
    }

    /// Whole days until the next charge, floored and clamped at zero. `None` unless active.
    pub fn remaining_days(&self, now: DateTime<Utc>) -> Result<Option<i64>, AppError> {
        if !self.is_active() {
            return Ok(None);
        }
        let Some(next) = self.next_billing_date(now)? else {
            return Ok(None);
        };
        let millis = (next - now).num_milliseconds();
        Ok(Some(millis.div_euclid(MS_PER_DAY).max(0)))
    }

    /// True when at least one full period has elapsed since the stored anchor.
    pub fn needs_renewal(&self, now: DateTime<Utc>) -> Result<bool, AppError> {
        if !self.is_active() {
            return Ok(false);
        }
        Ok(self.current_billing_period_start(now)? != self.start_date)
    }

    /// Copy of this record anchored on the current period, or `None` if it does not need renewal.
    pub fn renewed(&self, now: DateTime<Utc>) -> Result<Option<Subscription>, AppError> {
        if !self.needs_renewal(now)? {
            return Ok(None);
        }
        let start_date = self.current_billing_period_start(now)?;
        Ok(Some(Subscription {
            start_date,
            updated_at: now,
            ..self.clone()
        }))
    }

    /// True for a cancelled record whose final paid period ended before `now`.
    pub fn should_expire(&self, now: DateTime<Utc>) -> Result<bool, AppError> {
        if self.status != SubscriptionStatus::Cancelled {
            return Ok(false);
        }
        Ok(matches!(self.next_billing_date(now)?, Some(end) if end < now))
    }

    /// Expired copy of a cancelled record. `start_date` and `cancelled_at` are kept.
    pub fn expired(&self, now: DateTime<Utc>) -> Result<Subscription, AppError> {
        if self.status != SubscriptionStatus::Cancelled {
            return Err(AppError::InvalidStateTransition(format!(
                "subscription {} cannot expire from status {}",
                self.id, self.status
            )));
        }
        Ok(Subscription {
            status: SubscriptionStatus::Expired,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Cancelled copy of an active record, stamped with `at`.
    pub fn cancelled(&self, at: DateTime<Utc>) -> Result<Subscription, AppError> {
        if self.status != SubscriptionStatus::Active {
            return Err(AppError::InvalidStateTransition(format!(
                "subscription {} cannot be cancelled from status {}",
                self.id, self.status
            )));
        }
        Ok(Subscription {
            status: SubscriptionStatus::Cancelled,
            cancelled_at: Some(at),
            updated_at: at,
            ..self.clone()
        })
    }

    /// Copy with the edits of `changes` applied. Validation of the edit itself is the caller's job.
    pub fn with_changes(&self, changes: &UpdateSubscription, now: DateTime<Utc>) -> Subscription {
        Subscription {
            name: changes
                .name
                .as_ref()
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| self.name.clone()),
            price: changes.price.unwrap_or(self.price),
            billing_cycle: changes.billing_cycle.unwrap_or(self.billing_cycle),
            start_date: changes.start_date.unwrap_or(self.start_date),
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Input for creating a subscription
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSubscription {
    #[validate(
        length(
            min = 2,
            max = 50,
            message = "Service name must be between 2 and 50 characters"
        ),
        custom(function = "validate_name")
    )]
    pub name: String,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
    pub billing_cycle: BillingCycle,
    pub start_date: DateTime<Utc>,
}

/// Partial edit of an existing subscription
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateSubscription {
    #[serde(default)]
    #[validate(
        length(
            min = 2,
            max = 50,
            message = "Service name must be between 2 and 50 characters"
        ),
        custom(function = "validate_name")
    )]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_price"))]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub billing_cycle: Option<BillingCycle>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
}

impl UpdateSubscription {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.billing_cycle.is_none()
            && self.start_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap()
    }

    fn subscription(cycle: BillingCycle, start_date: DateTime<Utc>) -> Subscription {
        Subscription {
            id: 1,
            name: "Streaming".to_string(),
            price: Decimal::new(999, 2),
            billing_cycle: cycle,
            start_date,
            status: SubscriptionStatus::Active,
            cancelled_at: None,
            created_at: start_date,
            updated_at: start_date,
        }
    }

    #[test]
    fn next_billing_date_catches_up_for_active_records() {
        let sub = subscription(BillingCycle::Monthly, now() - Duration::days(100));
        let next = sub.next_billing_date(now()).unwrap().unwrap();
        assert_eq!(next, now() + Duration::days(20));
        assert!(next > now());
    }

    #[test]
    fn next_billing_date_is_strictly_after_now_on_exact_boundary() {
        let sub = subscription(BillingCycle::Weekly, now() - Duration::days(7));
        let next = sub.next_billing_date(now()).unwrap().unwrap();
        assert_eq!(next, now() + Duration::days(7));
    }

    #[test]
    fn next_billing_date_for_cancelled_does_not_catch_up() {
        let start = now() - Duration::days(100);
        let sub = subscription(BillingCycle::Monthly, start)
            .cancelled(start + Duration::days(1))
            .unwrap();
        assert_eq!(
            sub.next_billing_date(now()).unwrap(),
            Some(start + Duration::days(30))
        );
    }

    #[test]
    fn next_billing_date_for_expired_is_none() {
        let start = now() - Duration::days(100);
        let sub = subscription(BillingCycle::Monthly, start)
            .cancelled(start)
            .unwrap()
            .expired(now())
            .unwrap();
        assert_eq!(sub.next_billing_date(now()).unwrap(), None);
        assert_eq!(sub.remaining_days(now()).unwrap(), None);
    }

    #[test]
    fn current_period_start_is_largest_anchor_not_after_now() {
        let start = now() - Duration::days(100);
        let sub = subscription(BillingCycle::Monthly, start);
        let anchor = sub.current_billing_period_start(now()).unwrap();
        assert_eq!(anchor, start + Duration::days(90));

        let fresh = subscription(BillingCycle::Monthly, now() - Duration::days(3));
        assert_eq!(
            fresh.current_billing_period_start(now()).unwrap(),
            fresh.start_date
        );

        let on_boundary = subscription(BillingCycle::Weekly, now() - Duration::days(7));
        assert_eq!(on_boundary.current_billing_period_start(now()).unwrap(), now());
    }

    #[test]
    fn current_period_start_keeps_future_anchor() {
        let sub = subscription(BillingCycle::Yearly, now() + Duration::days(10));
        assert_eq!(sub.current_billing_period_start(now()).unwrap(), sub.start_date);
        assert!(!sub.needs_renewal(now()).unwrap());
    }

    #[test]
    fn remaining_days_floors_partial_days() {
        let start = now() - Duration::days(23) - Duration::hours(5);
        let sub = subscription(BillingCycle::Monthly, start);
        // next charge in 6 days 19 hours
        assert_eq!(sub.remaining_days(now()).unwrap(), Some(6));
    }

    #[test]
    fn remaining_days_is_none_for_non_active() {
        let sub = subscription(BillingCycle::Weekly, now())
            .cancelled(now())
            .unwrap();
        assert_eq!(sub.remaining_days(now()).unwrap(), None);
    }

    #[test]
    fn needs_renewal_only_after_a_full_period() {
        let sub = subscription(BillingCycle::Weekly, now() - Duration::days(6));
        assert!(!sub.needs_renewal(now()).unwrap());
        let sub = subscription(BillingCycle::Weekly, now() - Duration::days(7));
        assert!(sub.needs_renewal(now()).unwrap());
    }

    #[test]
    fn renewed_moves_anchor_into_current_period() {
        let sub = subscription(BillingCycle::Monthly, now() - Duration::days(100));
        let renewed = sub.renewed(now()).unwrap().expect("stale record renews");
        assert!(renewed.start_date <= now());
        assert!(renewed.start_date > now() - Duration::days(30));
        assert!(!renewed.needs_renewal(now()).unwrap());
        assert_eq!(renewed.id, sub.id);
        assert_eq!(renewed.created_at, sub.created_at);
        assert!(sub.renewed(sub.start_date).unwrap().is_none());
    }

    #[test]
    fn cancel_sets_timestamp_and_rejects_repeat() {
        let sub = subscription(BillingCycle::Monthly, now());
        let cancelled = sub.cancelled(now()).unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert_eq!(cancelled.cancelled_at, Some(now()));
        assert!(matches!(
            cancelled.cancelled(now()),
            Err(AppError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn expire_preserves_anchor_and_cancelled_at() {
        let start = now() - Duration::days(400);
        let cancelled_at = start + Duration::days(2);
        let sub = subscription(BillingCycle::Monthly, start)
            .cancelled(cancelled_at)
            .unwrap();
        assert!(sub.should_expire(now()).unwrap());
        let expired = sub.expired(now()).unwrap();
        assert_eq!(expired.status, SubscriptionStatus::Expired);
        assert_eq!(expired.start_date, start);
        assert_eq!(expired.cancelled_at, Some(cancelled_at));
        assert!(matches!(
            subscription(BillingCycle::Monthly, start).expired(now()),
            Err(AppError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn validate_rejects_broken_invariants() {
        let mut sub = subscription(BillingCycle::Monthly, now());
        assert!(sub.validate().is_ok());

        sub.price = Decimal::ZERO;
        assert!(matches!(sub.validate(), Err(AppError::InvalidRecord(_))));

        let mut sub = subscription(BillingCycle::Monthly, now());
        sub.name = "   ".to_string();
        assert!(matches!(sub.validate(), Err(AppError::InvalidRecord(_))));

        let mut sub = subscription(BillingCycle::Monthly, now());
        sub.cancelled_at = Some(now());
        assert!(matches!(sub.validate(), Err(AppError::InvalidRecord(_))));

        let mut sub = subscription(BillingCycle::Monthly, now());
        sub.status = SubscriptionStatus::Cancelled;
        assert!(matches!(sub.validate(), Err(AppError::InvalidRecord(_))));

        let mut sub = subscription(BillingCycle::Monthly, now());
        sub.status = SubscriptionStatus::Expired;
        assert!(sub.validate().is_ok(), "naturally expired records need no cancelled_at");
    }

    #[test]
    fn with_changes_applies_only_given_fields() {
        let sub = subscription(BillingCycle::Monthly, now());
        let changes = UpdateSubscription {
            name: Some("  Music  ".to_string()),
            billing_cycle: Some(BillingCycle::Yearly),
            ..Default::default()
        };
        let updated = sub.with_changes(&changes, now());
        assert_eq!(updated.name, "Music");
        assert_eq!(updated.billing_cycle, BillingCycle::Yearly);
        assert_eq!(updated.price, sub.price);
        assert_eq!(updated.start_date, sub.start_date);
        assert!(UpdateSubscription::default().is_empty());
    }

    #[test]
    fn new_subscription_validation() {
        let valid = NewSubscription {
            name: "Gym".to_string(),
            price: Decimal::new(2500, 2),
            billing_cycle: BillingCycle::Monthly,
            start_date: now(),
        };
        assert!(valid.validate().is_ok());

        let short_name = NewSubscription {
            name: "G".to_string(),
            ..valid.clone()
        };
        assert!(short_name.validate().is_err());

        let free = NewSubscription {
            price: Decimal::ZERO,
            ..valid.clone()
        };
        assert!(free.validate().is_err());

        let sub_cent = NewSubscription {
            price: Decimal::new(1, 3),
            ..valid.clone()
        };
        assert!(sub_cent.validate().is_err());

        let too_expensive = NewSubscription {
            price: Decimal::new(1_000_001, 2),
            ..valid.clone()
        };
        assert!(too_expensive.validate().is_err());

        let at_limit = NewSubscription {
            price: Decimal::from(10_000),
            ..valid
        };
        assert!(at_limit.validate().is_ok());
    }
}
