//! Procurement models: purchase orders and goods receipt
//!
//! Status flow: `draft -> pending -> approved -> ordered -> partially_received -> delivered`.
//! `cancel` is legal from any non-terminal status. Goods receipts drive the
//! `partially_received` and `delivered` statuses by comparing received against
//! ordered quantities across all lines.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{percentage_of, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Pending,
    Approved,
    Ordered,
    PartiallyReceived,
    Delivered,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub const ALL: [PurchaseOrderStatus; 7] = [
        PurchaseOrderStatus::Draft,
        PurchaseOrderStatus::Pending,
        PurchaseOrderStatus::Approved,
        PurchaseOrderStatus::Ordered,
        PurchaseOrderStatus::PartiallyReceived,
        PurchaseOrderStatus::Delivered,
        PurchaseOrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::Ordered => "ordered",
            PurchaseOrderStatus::PartiallyReceived => "partially_received",
            PurchaseOrderStatus::Delivered => "delivered",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Position in the forward flow; `None` for `cancelled`
    pub fn rank(&self) -> Option<u8> {
        match self {
            PurchaseOrderStatus::Draft => Some(0),
            PurchaseOrderStatus::Pending => Some(1),
            PurchaseOrderStatus::Approved => Some(2),
            PurchaseOrderStatus::Ordered => Some(3),
            PurchaseOrderStatus::PartiallyReceived => Some(4),
            PurchaseOrderStatus::Delivered => Some(5),
            PurchaseOrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Delivered | PurchaseOrderStatus::Cancelled
        )
    }
}

/// One ordered line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub ingredient_name: String,
    pub supplier_sku: Option<String>,
    pub quantity_ordered: Decimal,
    /// Only ever increases
    pub quantity_received: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub notes: Option<String>,
}

impl PurchaseOrderItem {
    pub fn line_total(&self) -> Decimal {
        self.quantity_ordered * self.unit_price
    }

    pub fn is_fully_received(&self) -> bool {
        self.quantity_received >= self.quantity_ordered
    }

    pub fn remaining_quantity(&self) -> Decimal {
        (self.quantity_ordered - self.quantity_received).max(Decimal::ZERO)
    }
}

/// A procurement request to a supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    /// e.g. "PO-2026-0001"
    pub po_number: String,
    pub supplier_id: Option<Uuid>,
    /// Location whose inventory receives the goods
    pub destination_location_id: Option<Uuid>,
    pub status: PurchaseOrderStatus,
    pub order_date: DateTime<Utc>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub total_cost: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub items: Vec<PurchaseOrderItem>,
    pub version: i64,
}

/// Line data for a new purchase order item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub ingredient_name: String,
    pub supplier_sku: Option<String>,
    pub quantity_ordered: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub notes: Option<String>,
}

/// One delivered line on a goods receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub purchase_order_item_id: Uuid,
    pub quantity_received: Decimal,
    pub discrepancy_notes: Option<String>,
}

/// Reasons a goods receipt cannot be reconciled against its order
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReceiptError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("a goods receipt needs at least one line")]
    Empty,

    #[error("purchase order has no line {0}")]
    UnknownLine(Uuid),

    #[error("received quantity for line {0} cannot be negative")]
    NegativeQuantity(Uuid),

    #[error("receiving {attempted} {ingredient} exceeds the ordered {ordered} plus tolerance")]
    OverReceipt {
        line: Uuid,
        ingredient: String,
        ordered: Decimal,
        attempted: Decimal,
    },
}

impl PurchaseOrder {
    pub fn new(po_number: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            po_number: po_number.into(),
            supplier_id: None,
            destination_location_id: None,
            status: PurchaseOrderStatus::Draft,
            order_date: Utc::now(),
            expected_delivery_date: None,
            actual_delivery_date: None,
            total_cost: Decimal::ZERO,
            shipping_cost: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            notes: None,
            created_by: None,
            approved_by: None,
            approved_at: None,
            items: Vec::new(),
            version: 0,
        }
    }

    pub fn grand_total(&self) -> Decimal {
        self.total_cost + self.shipping_cost + self.tax_amount
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        match self.expected_delivery_date {
            Some(expected) => !self.status.is_terminal() && now > expected,
            None => false,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_at(Utc::now())
    }

    pub fn items_count(&self) -> usize {
        self.items.len()
    }

    pub fn received_items_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_fully_received()).count()
    }

    /// Add a line while the order is still a draft
    pub fn add_item(&mut self, line: NewOrderLine) -> Result<&PurchaseOrderItem, TransitionError> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(TransitionError::new(
                "purchase order",
                self.status.as_str(),
                "add items to",
            ));
        }

        self.items.push(PurchaseOrderItem {
            id: Uuid::new_v4(),
            purchase_order_id: self.id,
            ingredient_name: line.ingredient_name,
            supplier_sku: line.supplier_sku,
            quantity_ordered: line.quantity_ordered,
            quantity_received: Decimal::ZERO,
            unit: line.unit,
            unit_price: line.unit_price,
            notes: line.notes,
        });
        self.total_cost = self.items.iter().map(PurchaseOrderItem::line_total).sum();
        Ok(&self.items[self.items.len() - 1])
    }

    fn transition(
        &mut self,
        allowed: &[PurchaseOrderStatus],
        to: PurchaseOrderStatus,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if !allowed.contains(&self.status) {
            return Err(TransitionError::new(
                "purchase order",
                self.status.as_str(),
                action,
            ));
        }
        self.status = to;
        Ok(())
    }

    /// Draft to pending approval
    pub fn submit(&mut self) -> Result<(), TransitionError> {
        self.transition(
            &[PurchaseOrderStatus::Draft],
            PurchaseOrderStatus::Pending,
            "submit",
        )
    }

    pub fn approve(&mut self, by: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(
            &[PurchaseOrderStatus::Draft, PurchaseOrderStatus::Pending],
            PurchaseOrderStatus::Approved,
            "approve",
        )?;
        self.approved_by = Some(by.into());
        self.approved_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_as_ordered(&mut self) -> Result<(), TransitionError> {
        self.transition(
            &[PurchaseOrderStatus::Approved],
            PurchaseOrderStatus::Ordered,
            "mark as ordered",
        )
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::new(
                "purchase order",
                self.status.as_str(),
                "cancel",
            ));
        }
        self.status = PurchaseOrderStatus::Cancelled;
        Ok(())
    }

    pub fn ensure_receivable(&self) -> Result<(), TransitionError> {
        match self.status {
            PurchaseOrderStatus::Ordered | PurchaseOrderStatus::PartiallyReceived => Ok(()),
            other => Err(TransitionError::new(
                "purchase order",
                other.as_str(),
                "receive goods for",
            )),
        }
    }

    /// Reconcile a delivery against this order.
    ///
    /// Either every line is applied or the order is left untouched. Each line
    /// is compared against the quantity still outstanding on its order line,
    /// and cumulative receipts may not exceed the ordered quantity by more than
    /// `tolerance_percent`.
    pub fn receive(
        &mut self,
        goods_received_note_id: Uuid,
        lines: &[ReceiptLine],
        tolerance_percent: Decimal,
    ) -> Result<Vec<GoodsReceivedItem>, ReceiptError> {
        self.ensure_receivable()?;
        if lines.is_empty() {
            return Err(ReceiptError::Empty);
        }

        let allowance = Decimal::ONE + tolerance_percent.max(Decimal::ZERO) / Decimal::ONE_HUNDRED;
        let mut running: HashMap<Uuid, Decimal> = HashMap::new();
        for line in lines {
            if line.quantity_received < Decimal::ZERO {
                return Err(ReceiptError::NegativeQuantity(line.purchase_order_item_id));
            }
            let item = self
                .items
                .iter()
                .find(|i| i.id == line.purchase_order_item_id)
                .ok_or(ReceiptError::UnknownLine(line.purchase_order_item_id))?;

            let total = running.entry(item.id).or_insert(item.quantity_received);
            *total = total
                .checked_add(line.quantity_received)
                .unwrap_or(Decimal::MAX);
            if *total > item.quantity_ordered * allowance {
                return Err(ReceiptError::OverReceipt {
                    line: item.id,
                    ingredient: item.ingredient_name.clone(),
                    ordered: item.quantity_ordered,
                    attempted: *total,
                });
            }
        }

        let mut received = Vec::with_capacity(lines.len());
        for line in lines {
            if let Some(item) = self
                .items
                .iter_mut()
                .find(|i| i.id == line.purchase_order_item_id)
            {
                let expected = item.remaining_quantity();
                received.push(GoodsReceivedItem::new(
                    goods_received_note_id,
                    item,
                    expected,
                    line.quantity_received,
                    line.discrepancy_notes.clone(),
                ));
                item.quantity_received += line.quantity_received;
            }
        }

        self.refresh_receipt_status();
        Ok(received)
    }

    fn refresh_receipt_status(&mut self) {
        if self.items.iter().all(PurchaseOrderItem::is_fully_received) {
            self.status = PurchaseOrderStatus::Delivered;
            self.actual_delivery_date = Some(Utc::now());
        } else {
            self.status = PurchaseOrderStatus::PartiallyReceived;
        }
    }
}

/// A delivery event reconciled against a purchase order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceivedNote {
    pub id: Uuid,
    /// e.g. "GRN-2026-0001"
    pub grn_number: String,
    pub purchase_order_id: Uuid,
    pub received_date: DateTime<Utc>,
    pub received_by: Option<String>,
    pub invoice_number: Option<String>,
    pub delivery_note_number: Option<String>,
    pub notes: Option<String>,
    pub has_discrepancies: bool,
    pub discrepancy_notes: Option<String>,
    pub items: Vec<GoodsReceivedItem>,
}

impl GoodsReceivedNote {
    pub fn new(id: Uuid, grn_number: impl Into<String>, purchase_order_id: Uuid, items: Vec<GoodsReceivedItem>) -> Self {
        let has_discrepancies = items.iter().any(|i| i.has_discrepancy);
        Self {
            id,
            grn_number: grn_number.into(),
            purchase_order_id,
            received_date: Utc::now(),
            received_by: None,
            invoice_number: None,
            delivery_note_number: None,
            notes: None,
            has_discrepancies,
            discrepancy_notes: None,
            items,
        }
    }
}

/// One line of a goods receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceivedItem {
    pub id: Uuid,
    pub goods_received_note_id: Uuid,
    pub purchase_order_item_id: Uuid,
    pub ingredient_name: String,
    /// Quantity expected on this delivery
    pub quantity_ordered: Decimal,
    pub quantity_received: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub has_discrepancy: bool,
    pub discrepancy_notes: Option<String>,
}

impl GoodsReceivedItem {
    fn new(
        goods_received_note_id: Uuid,
        line: &PurchaseOrderItem,
        expected: Decimal,
        received: Decimal,
        discrepancy_notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            goods_received_note_id,
            purchase_order_item_id: line.id,
            ingredient_name: line.ingredient_name.clone(),
            quantity_ordered: expected,
            quantity_received: received,
            unit: line.unit.clone(),
            unit_price: line.unit_price,
            has_discrepancy: expected != received,
            discrepancy_notes,
        }
    }

    pub fn variance(&self) -> Decimal {
        self.quantity_received - self.quantity_ordered
    }

    pub fn variance_percentage(&self) -> Decimal {
        percentage_of(self.variance(), self.quantity_ordered)
    }
}

/// Format a purchase order number: PO-YYYY-NNNN
pub fn generate_po_number(year: i32, sequence: u32) -> String {
    format!("PO-{}-{:04}", year, sequence)
}

/// Format a goods received note number: GRN-YYYY-NNNN
pub fn generate_grn_number(year: i32, sequence: u32) -> String {
    format!("GRN-{}-{:04}", year, sequence)
}
