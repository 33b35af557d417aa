//! Stock transfer workflow between locations
//!
//! `pending -> approved -> completed` or `pending -> rejected`. `cancelled` is a
//! terminal state that no transition here produces.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 5] = [
        TransferStatus::Pending,
        TransferStatus::Approved,
        TransferStatus::Rejected,
        TransferStatus::Completed,
        TransferStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Rejected => "rejected",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Rejected | TransferStatus::Completed | TransferStatus::Cancelled
        )
    }
}

/// A cross-location movement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransfer {
    pub id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    pub ingredient_name: String,
    /// Fixed at creation
    pub quantity: Decimal,
    pub unit: String,
    pub status: TransferStatus,
    pub requested_by: Option<String>,
    pub approved_by: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub version: i64,
}

impl StockTransfer {
    pub fn new(
        from_location_id: Uuid,
        to_location_id: Uuid,
        ingredient_name: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_location_id,
            to_location_id,
            ingredient_name: ingredient_name.into(),
            quantity,
            unit: unit.into(),
            status: TransferStatus::Pending,
            requested_by: None,
            approved_by: None,
            requested_at: Utc::now(),
            approved_at: None,
            completed_at: None,
            notes: None,
            version: 0,
        }
    }

    fn require(&self, expected: TransferStatus, action: &'static str) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError::new("transfer", self.status.as_str(), action));
        }
        Ok(())
    }

    pub fn approve(&mut self, by: impl Into<String>) -> Result<(), TransitionError> {
        self.require(TransferStatus::Pending, "approve")?;
        self.status = TransferStatus::Approved;
        self.approved_by = Some(by.into());
        self.approved_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.require(TransferStatus::Approved, "complete")?;
        self.status = TransferStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), TransitionError> {
        self.require(TransferStatus::Pending, "reject")?;
        self.status = TransferStatus::Rejected;
        Ok(())
    }
}
