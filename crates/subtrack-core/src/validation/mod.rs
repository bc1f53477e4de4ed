//! Validation of user-entered subscription data

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::constants::{MAX_NAME_LENGTH, MAX_PRICE, MAX_PRICE_SCALE, MIN_NAME_LENGTH};

/// Rejects names that are blank or outside the length bounds once surrounding whitespace is removed.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("name_required")
            .with_message("Service name is required".into()));
    }
    let len = trimmed.chars().count() as u64;
    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&len) {
        return Err(ValidationError::new("name_length").with_message(
            format!(
                "Service name must be between {} and {} characters",
                MIN_NAME_LENGTH, MAX_NAME_LENGTH
            )
            .into(),
        ));
    }
    Ok(())
}

/// Price must lie in (0, MAX_PRICE] with at most two decimal places.
pub fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.normalize().scale() > MAX_PRICE_SCALE {
        return Err(ValidationError::new("price_precision").with_message(
            format!("Price must have at most {} decimal places", MAX_PRICE_SCALE).into(),
        ));
    }
    if *price <= Decimal::ZERO {
        return Err(ValidationError::new("price_not_positive")
            .with_message("Price must be greater than 0".into()));
    }
    if *price > Decimal::from(MAX_PRICE) {
        return Err(ValidationError::new("price_too_high")
            .with_message(format!("Price must not exceed {}", MAX_PRICE).into()));
    }
    Ok(())
}
