//! Shared constants for the lifecycle engine.

/// Milliseconds in one day. All billing arithmetic is done in whole days of this length.
pub const MS_PER_DAY: i64 = 86_400_000;

/// Upper bound on the number of billing periods a catch-up loop may step through.
/// A weekly subscription reaches it after roughly 1900 years.
pub const MAX_CATCH_UP_PERIODS: u32 = 100_000;

/// Records due within this many whole days show up as upcoming payments.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// Bounds applied to user-entered subscription data.
pub const MIN_NAME_LENGTH: u64 = 2;
pub const MAX_NAME_LENGTH: u64 = 50;
pub const MAX_PRICE: i64 = 10_000;
/// Prices are stored as NUMERIC(12, 2).
pub const MAX_PRICE_SCALE: u32 = 2;
