use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::Subscription;

/// Reminder trigger point, in days before the next charge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Tomorrow = 1,
    ThreeDays = 3,
    OneWeek = 7,
}

impl Milestone {
    pub const ALL: [Milestone; 3] = [Milestone::OneWeek, Milestone::ThreeDays, Milestone::Tomorrow];

    pub fn days(&self) -> i64 {
        *self as i64
    }

    /// Milestone reached with exactly `remaining_days` left, if any.
    pub fn from_remaining_days(remaining_days: i64) -> Option<Milestone> {
        match remaining_days {
            7 => Some(Milestone::OneWeek),
            3 => Some(Milestone::ThreeDays),
            1 => Some(Milestone::Tomorrow),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Milestone::OneWeek => "Payment Due in 1 Week",
            Milestone::ThreeDays => "Payment Due in 3 Days",
            Milestone::Tomorrow => "Payment Due Tomorrow",
        }
    }

    pub fn priority(&self) -> NotificationPriority {
        match self {
            Milestone::Tomorrow => NotificationPriority::High,
            _ => NotificationPriority::Default,
        }
    }
}

impl Display for Milestone {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}d", self.days())
    }
}

/// Delivery priority requested from the notification channel
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    #[default]
    Default,
    High,
}

/// Ledger key: one entry per (subscription, milestone) within the current billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    pub subscription_id: i64,
    pub milestone_days: i64,
}

impl LedgerKey {
    pub fn new(subscription_id: i64, milestone: Milestone) -> Self {
        Self {
            subscription_id,
            milestone_days: milestone.days(),
        }
    }
}

impl Display for LedgerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "notif_{}_{}", self.subscription_id, self.milestone_days)
    }
}

/// A payment reminder ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReminder {
    /// `{id}_{days}`, the same in every billing period.
    pub dedupe_key: String,
    pub title: String,
    pub body: String,
    pub priority: NotificationPriority,
    pub subscription_id: i64,
    pub milestone: Milestone,
    /// Charge this reminder is about.
    pub due_date: DateTime<Utc>,
}

impl PaymentReminder {
    pub fn for_subscription(
        subscription: &Subscription,
        milestone: Milestone,
        due_date: DateTime<Utc>,
    ) -> Self {
        let days = milestone.days();
        let plural = if days > 1 { "s" } else { "" };
        Self {
            dedupe_key: format!("{}_{}", subscription.id, days),
            title: milestone.title().to_string(),
            body: format!(
                "{} payment is due in {} day{}",
                subscription.name, days, plural
            ),
            priority: milestone.priority(),
            subscription_id: subscription.id,
            milestone,
            due_date,
        }
    }

    /// Dedupe key scoped to one billing period: `{id}_{days}_{due_date millis}`.
    ///
    /// Channels collapse redeliveries on this key. It differs from period to
    /// period, so a gateway may keep keys for any length of time.
    pub fn idempotency_key(&self) -> String {
        format!("{}_{}", self.dedupe_key, self.due_date.timestamp_millis())
    }
}
