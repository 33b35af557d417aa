//! Common types used across the ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive time window used by period queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when `at` falls within `[start, end]`
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// A workflow action was attempted from a state that does not allow it
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot {action} {entity} in status '{from}'")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub action: &'static str,
}

impl TransitionError {
    pub fn new(entity: &'static str, from: impl Into<String>, action: &'static str) -> Self {
        Self {
            entity,
            from: from.into(),
            action,
        }
    }
}

/// `part / whole * 100`, zero for a non-positive `whole`.
///
/// Saturates at `Decimal::MAX`/`Decimal::MIN` when a tiny `whole` would
/// overflow the division.
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(if part.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        })
}
