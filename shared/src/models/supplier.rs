//! Supplier catalogue, pricing and delivery performance

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::procurement::{PurchaseOrder, PurchaseOrderStatus};
use crate::types::percentage_of;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// e.g. "Net 30", "COD"
    pub payment_terms: Option<String>,
    /// e.g. "Mon/Wed/Fri"
    pub delivery_schedule: Option<String>,
    /// 0.0 to 5.0
    pub rating: Decimal,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_order_date: Option<DateTime<Utc>>,
}

impl Supplier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            contact_name: None,
            email: None,
            phone: None,
            address: None,
            payment_terms: None,
            delivery_schedule: None,
            rating: Decimal::ZERO,
            is_active: true,
            notes: None,
            created_at: Utc::now(),
            last_order_date: None,
        }
    }
}

/// An ingredient a supplier sells, with its current price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierIngredient {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub ingredient_name: String,
    pub supplier_sku: Option<String>,
    pub unit_price: Decimal,
    pub unit: String,
    pub lead_time_days: i32,
    pub minimum_order_quantity: Decimal,
    /// e.g. "Case of 12"
    pub pack_size: Option<String>,
    pub last_price_update: DateTime<Utc>,
    pub is_preferred: bool,
    pub notes: Option<String>,
}

impl SupplierIngredient {
    pub fn new(
        supplier_id: Uuid,
        ingredient_name: impl Into<String>,
        unit_price: Decimal,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            supplier_id,
            ingredient_name: ingredient_name.into(),
            supplier_sku: None,
            unit_price,
            unit: unit.into(),
            lead_time_days: 1,
            minimum_order_quantity: Decimal::ONE,
            pack_size: None,
            last_price_update: Utc::now(),
            is_preferred: false,
            notes: None,
        }
    }

    /// Change the unit price, returning the history row to append.
    ///
    /// An unchanged price produces no history.
    pub fn update_price(&mut self, new_price: Decimal, notes: Option<String>) -> Option<PriceHistory> {
        if new_price == self.unit_price {
            return None;
        }

        let history = PriceHistory::new(self.id, self.unit_price, new_price, notes);
        self.unit_price = new_price;
        self.last_price_update = history.change_date;
        Some(history)
    }
}

/// Append-only record of a price change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: Uuid,
    pub supplier_ingredient_id: Uuid,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub change_date: DateTime<Utc>,
    pub change_percentage: Decimal,
    pub notes: Option<String>,
}

impl PriceHistory {
    pub fn new(
        supplier_ingredient_id: Uuid,
        old_price: Decimal,
        new_price: Decimal,
        notes: Option<String>,
    ) -> Self {
        let change_percentage = percentage_of(new_price - old_price, old_price);

        Self {
            id: Uuid::new_v4(),
            supplier_ingredient_id,
            old_price,
            new_price,
            change_date: Utc::now(),
            change_percentage,
            notes,
        }
    }
}

/// Delivery statistics for one supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPerformance {
    pub supplier_id: Uuid,
    pub total_orders: usize,
    pub active_orders: usize,
    pub delivered_orders: usize,
    /// Whole days from order to delivery, averaged; `None` without deliveries
    pub average_delivery_days: Option<i64>,
    /// Share of delivered orders that arrived by their expected date
    pub on_time_delivery_rate: Decimal,
}

/// Compute delivery statistics over a supplier's purchase orders
pub fn supplier_performance(supplier_id: Uuid, orders: &[PurchaseOrder]) -> SupplierPerformance {
    let orders: Vec<&PurchaseOrder> = orders
        .iter()
        .filter(|o| o.supplier_id == Some(supplier_id))
        .collect();

    let active_orders = orders.iter().filter(|o| !o.status.is_terminal()).count();
    let delivered: Vec<&&PurchaseOrder> = orders
        .iter()
        .filter(|o| o.status == PurchaseOrderStatus::Delivered)
        .collect();

    let durations: Vec<i64> = delivered
        .iter()
        .filter_map(|o| o.actual_delivery_date.map(|d| (d - o.order_date).num_days()))
        .collect();
    let average_delivery_days = if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<i64>() / durations.len() as i64)
    };

    let on_time = delivered
        .iter()
        .filter(|o| match (o.expected_delivery_date, o.actual_delivery_date) {
            (Some(expected), Some(actual)) => actual <= expected,
            _ => false,
        })
        .count();
    let on_time_delivery_rate = if delivered.is_empty() {
        Decimal::ZERO
    } else {
        Decimal::from(on_time as u64) / Decimal::from(delivered.len() as u64) * Decimal::ONE_HUNDRED
    };

    SupplierPerformance {
        supplier_id,
        total_orders: orders.len(),
        active_orders,
        delivered_orders: delivered.len(),
        average_delivery_days,
        on_time_delivery_rate,
    }
}

/// The preferred offer for an ingredient, falling back to the cheapest
pub fn preferred_offer<'a>(
    offers: &'a [SupplierIngredient],
    ingredient_name: &str,
) -> Option<&'a SupplierIngredient> {
    let matching = offers
        .iter()
        .filter(|o| o.ingredient_name.eq_ignore_ascii_case(ingredient_name));

    let mut best: Option<&SupplierIngredient> = None;
    for offer in matching {
        best = match best {
            None => Some(offer),
            Some(current) if offer.is_preferred && !current.is_preferred => Some(offer),
            Some(current) if offer.is_preferred == current.is_preferred && offer.unit_price < current.unit_price => {
                Some(offer)
            }
            keep => keep,
        };
    }
    best
}
