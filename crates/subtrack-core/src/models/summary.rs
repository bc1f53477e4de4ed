use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Subscription, SubscriptionStatus};

/// Spending overview across all subscriptions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingSummary {
    pub active_count: usize,
    pub cancelled_count: usize,
    pub expired_count: usize,
    /// Monthly-equivalent cost of all active subscriptions, rounded to cents.
    pub monthly_total: Decimal,
}

impl SpendingSummary {
    pub fn from_subscriptions(subscriptions: &[Subscription]) -> Self {
        let mut summary = SpendingSummary::default();
        let mut monthly_total = Decimal::ZERO;

        for sub in subscriptions {
            match sub.status {
                SubscriptionStatus::Active => {
                    summary.active_count += 1;
                    monthly_total += sub.price * sub.billing_cycle.monthly_factor();
                }
                SubscriptionStatus::Cancelled => summary.cancelled_count += 1,
                SubscriptionStatus::Expired => summary.expired_count += 1,
            }
        }

        summary.monthly_total = monthly_total.round_dp(2);
        summary
    }
}

/// An active subscription whose next charge is close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingPayment {
    pub subscription: Subscription,
    pub next_billing_date: DateTime<Utc>,
    pub remaining_days: i64,
}

impl UpcomingPayment {
    /// Soonest first; ties go to the record created earlier.
    pub fn sort(payments: &mut [UpcomingPayment]) {
        payments.sort_by(|a, b| {
            a.remaining_days
                .cmp(&b.remaining_days)
                .then(a.subscription.created_at.cmp(&b.subscription.created_at))
                .then(a.subscription.id.cmp(&b.subscription.id))
        });
    }
}
