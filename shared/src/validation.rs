//! Validation utilities for ledger inputs
//!
//! Numeric and cross-field rules. String length rules live on the backend's
//! request structs.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::DateRange;

/// Largest quantity a single input may carry
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest unit cost, price or money amount a single input may carry
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest sale or production count per request
pub const MAX_COUNT: i64 = 1_000_000;

// ============================================================================
// Ledger Validations
// ============================================================================

/// A ledger movement must change the balance
pub fn validate_movement_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity.is_zero() {
        return Err("Quantity cannot be zero");
    }
    if quantity.abs() > MAX_QUANTITY {
        return Err("Quantity is too large");
    }
    Ok(())
}

/// Transfer and order quantities must be positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    if quantity > MAX_QUANTITY {
        return Err("Quantity is too large");
    }
    Ok(())
}

/// Opening balances and receipts may be zero but never negative
pub fn validate_non_negative_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Quantity cannot be negative");
    }
    if quantity > MAX_QUANTITY {
        return Err("Quantity is too large");
    }
    Ok(())
}

/// Validate a unit cost or price
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    if price > MAX_AMOUNT {
        return Err("Price is too large");
    }
    Ok(())
}

/// Validate par level and reorder point
pub fn validate_stock_levels(par_level: Decimal, reorder_point: Decimal) -> Result<(), &'static str> {
    if par_level < Decimal::ZERO || reorder_point < Decimal::ZERO {
        return Err("Stock levels cannot be negative");
    }
    if par_level > MAX_QUANTITY || reorder_point > MAX_QUANTITY {
        return Err("Stock levels are too large");
    }
    Ok(())
}

/// The unit on a request must be the unit the item is stocked in
pub fn validate_unit_matches(requested: &str, stocked: &str) -> Result<(), &'static str> {
    if !requested.trim().eq_ignore_ascii_case(stocked.trim()) {
        return Err("Unit does not match the unit the item is stocked in");
    }
    Ok(())
}

/// Sale and production counts are positive and bounded
pub fn validate_count(count: i64) -> Result<(), &'static str> {
    if count < 1 {
        return Err("Count must be at least 1");
    }
    if count > MAX_COUNT {
        return Err("Count is too large");
    }
    Ok(())
}

/// A transfer must move stock between two different locations
pub fn validate_transfer_locations(from: Uuid, to: Uuid) -> Result<(), &'static str> {
    if from == to {
        return Err("Source and destination locations must differ");
    }
    Ok(())
}

// ============================================================================
// Costing & Analytics Validations
// ============================================================================

/// Validate a percentage (0-100)
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate supplier rating (0-5)
pub fn validate_rating(rating: Decimal) -> Result<(), &'static str> {
    if rating < Decimal::ZERO || rating > Decimal::from(5) {
        return Err("Rating must be between 0 and 5");
    }
    Ok(())
}

pub fn validate_date_range(range: &DateRange) -> Result<(), &'static str> {
    if !range.is_valid() {
        return Err("Period start must not be after its end");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}
