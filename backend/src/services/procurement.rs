//! Purchase orders and goods receipts
//!
//! `draft -> pending -> approved -> ordered -> partially_received -> delivered`,
//! with `cancel` from any non-terminal state. A goods receipt updates the
//! order lines, stores the receipt note and posts one `purchase` movement per
//! received line at the order's destination, all in one unit of work.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    generate_grn_number, generate_po_number, validate_non_negative_quantity,
    validate_positive_quantity, validate_price,
    GoodsReceivedNote, InventoryItem, LedgerEntry, NewOrderLine, PurchaseOrder,
    PurchaseOrderStatus, ReceiptLine, TransactionType, TransitionError,
};
use uuid::Uuid;
use validator::Validate;

use super::ledger::post_entry;
use super::{check, key_reused, remember, replayed, replayed_for};
use crate::config::LedgerPolicy;
use crate::error::{AppError, AppResult};
use crate::store::{Store, UnitOfWork};

const OP_CREATE: &str = "procurement.create";
const OP_SUBMIT: &str = "procurement.submit";
const OP_APPROVE: &str = "procurement.approve";
const OP_ORDER: &str = "procurement.order";
const OP_CANCEL: &str = "procurement.cancel";
const OP_RECEIVE: &str = "procurement.receive";

#[derive(Clone)]
pub struct ProcurementService {
    store: Arc<dyn Store>,
    policy: LedgerPolicy,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderLineInput {
    #[validate(length(min = 1, max = 200))]
    pub ingredient_name: String,
    #[validate(length(max = 100))]
    pub supplier_sku: Option<String>,
    pub quantity_ordered: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    pub unit_price: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl OrderLineInput {
    fn into_line(self) -> AppResult<NewOrderLine> {
        self.validate()?;
        check(validate_positive_quantity(self.quantity_ordered), "quantity_ordered")?;
        check(validate_price(self.unit_price), "unit_price")?;
        Ok(NewOrderLine {
            ingredient_name: self.ingredient_name.trim().to_string(),
            supplier_sku: self.supplier_sku,
            quantity_ordered: self.quantity_ordered,
            unit: self.unit.trim().to_string(),
            unit_price: self.unit_price,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub supplier_id: Option<Uuid>,
    /// Location the received stock is booked into
    pub destination_location_id: Option<Uuid>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(max = 100))]
    pub created_by: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLineInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApproveOrderInput {
    #[validate(length(min = 1, max = 100))]
    pub approved_by: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceiveInput {
    pub lines: Vec<ReceiptLine>,
    #[validate(length(max = 100))]
    pub received_by: Option<String>,
    #[validate(length(max = 100))]
    pub invoice_number: Option<String>,
    #[validate(length(max = 100))]
    pub delivery_note_number: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(max = 1000))]
    pub discrepancy_notes: Option<String>,
}

/// Same supplier, destination and lines as the stored order
fn same_order(order: &PurchaseOrder, input: &CreateOrderInput, lines: &[NewOrderLine]) -> bool {
    order.supplier_id == input.supplier_id
        && order.destination_location_id == input.destination_location_id
        && order.items.len() == lines.len()
        && order.items.iter().zip(lines).all(|(item, line)| {
            item.ingredient_name == line.ingredient_name
                && item.quantity_ordered == line.quantity_ordered
                && item.unit_price == line.unit_price
        })
}

async fn load_order(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<PurchaseOrder> {
    uow.get_purchase_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))
}

/// Next free `PO-YYYY-NNNN` for the current year
async fn next_po_number(uow: &mut dyn UnitOfWork) -> AppResult<String> {
    let year = Utc::now().year();
    let mut sequence = uow
        .count_purchase_orders_with_prefix(&format!("PO-{}-", year))
        .await?
        + 1;
    loop {
        let candidate = generate_po_number(year, sequence as u32);
        if !uow.purchase_order_number_exists(&candidate).await? {
            return Ok(candidate);
        }
        sequence += 1;
    }
}

/// Next free `GRN-YYYY-NNNN` for the current year
async fn next_grn_number(uow: &mut dyn UnitOfWork) -> AppResult<String> {
    let year = Utc::now().year();
    let mut sequence = uow
        .count_goods_received_notes_with_prefix(&format!("GRN-{}-", year))
        .await?
        + 1;
    loop {
        let candidate = generate_grn_number(year, sequence as u32);
        if !uow.goods_received_note_number_exists(&candidate).await? {
            return Ok(candidate);
        }
        sequence += 1;
    }
}

fn rejected(id: Uuid, err: TransitionError) -> AppError {
    tracing::warn!("Purchase order {}: {}", id, err);
    err.into()
}

impl ProcurementService {
    pub fn new(store: Arc<dyn Store>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// Create a draft order with a fresh PO number
    pub async fn create_order(
        &self,
        mut input: CreateOrderInput,
        idempotency_key: Option<&str>,
    ) -> AppResult<PurchaseOrder> {
        input.validate()?;
        check(validate_price(input.shipping_cost), "shipping_cost")?;
        check(validate_price(input.tax_amount), "tax_amount")?;
        let lines = std::mem::take(&mut input.items)
            .into_iter()
            .map(OrderLineInput::into_line)
            .collect::<AppResult<Vec<_>>>()?;

        let mut uow = self.store.begin().await?;
        if let Some(id) = replayed(&mut *uow, idempotency_key, OP_CREATE).await? {
            let order = load_order(&mut *uow, id).await?;
            if !same_order(&order, &input, &lines) {
                return Err(key_reused(OP_CREATE));
            }
            tracing::warn!("Replayed purchase order creation for key {:?}", idempotency_key);
            return Ok(order);
        }

        if let Some(supplier_id) = input.supplier_id {
            if uow.get_supplier(supplier_id).await?.is_none() {
                return Err(AppError::NotFound("Supplier".to_string()));
            }
        }
        if let Some(location_id) = input.destination_location_id {
            if uow.get_location(location_id).await?.is_none() {
                return Err(AppError::NotFound("Location".to_string()));
            }
        }

        let mut order = PurchaseOrder::new(next_po_number(&mut *uow).await?);
        order.supplier_id = input.supplier_id;
        order.destination_location_id = input.destination_location_id;
        order.expected_delivery_date = input.expected_delivery_date;
        order.shipping_cost = input.shipping_cost;
        order.tax_amount = input.tax_amount;
        order.notes = input.notes;
        order.created_by = input.created_by;
        for line in lines {
            order.add_item(line)?;
        }

        uow.insert_purchase_order(&order).await?;
        remember(&mut *uow, idempotency_key, OP_CREATE, order.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Created purchase order {} ({} lines, total {})",
            order.po_number,
            order.items.len(),
            order.grand_total()
        );
        Ok(order)
    }

    /// Add a line to a draft order
    pub async fn add_item(&self, order_id: Uuid, input: OrderLineInput) -> AppResult<PurchaseOrder> {
        let line = input.into_line()?;

        let mut uow = self.store.begin().await?;
        let mut order = load_order(&mut *uow, order_id).await?;
        order.add_item(line).map_err(|e| rejected(order_id, e))?;
        uow.update_purchase_order(&mut order).await?;
        uow.commit().await?;

        tracing::info!("Added line to purchase order {} (total {})", order.po_number, order.total_cost);
        Ok(order)
    }

    pub async fn submit(&self, id: Uuid, idempotency_key: Option<&str>) -> AppResult<PurchaseOrder> {
        self.transition(id, idempotency_key, OP_SUBMIT, PurchaseOrder::submit)
            .await
    }

    pub async fn approve(
        &self,
        id: Uuid,
        input: ApproveOrderInput,
        idempotency_key: Option<&str>,
    ) -> AppResult<PurchaseOrder> {
        input.validate()?;
        let approved_by = input.approved_by;
        self.transition(id, idempotency_key, OP_APPROVE, move |o| o.approve(approved_by))
            .await
    }

    /// Mark an approved order as sent to its supplier
    pub async fn mark_as_ordered(&self, id: Uuid, idempotency_key: Option<&str>) -> AppResult<PurchaseOrder> {
        self.transition(id, idempotency_key, OP_ORDER, PurchaseOrder::mark_as_ordered)
            .await
    }

    pub async fn cancel(&self, id: Uuid, idempotency_key: Option<&str>) -> AppResult<PurchaseOrder> {
        self.transition(id, idempotency_key, OP_CANCEL, PurchaseOrder::cancel)
            .await
    }

    /// Reconcile a delivery against an ordered purchase order.
    ///
    /// A replay with the same idempotency key returns the original note and
    /// posts nothing.
    pub async fn receive(
        &self,
        order_id: Uuid,
        input: ReceiveInput,
        idempotency_key: Option<&str>,
    ) -> AppResult<GoodsReceivedNote> {
        input.validate()?;
        for line in &input.lines {
            check(validate_non_negative_quantity(line.quantity_received), "quantity_received")?;
        }

        let mut uow = self.store.begin().await?;
        if let Some(note_id) = replayed(&mut *uow, idempotency_key, OP_RECEIVE).await? {
            let note = uow
                .get_goods_received_note(note_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Goods received note".to_string()))?;
            if note.purchase_order_id != order_id {
                return Err(key_reused(OP_RECEIVE));
            }
            tracing::warn!("Replayed goods receipt {} for order {}", note.grn_number, order_id);
            return Ok(note);
        }

        let mut order = load_order(&mut *uow, order_id).await?;
        let note_id = Uuid::new_v4();
        let items = order
            .receive(note_id, &input.lines, self.policy.over_receipt_tolerance_percent)
            .map_err(|e| {
                tracing::warn!("Rejected goods receipt for {}: {}", order.po_number, e);
                AppError::from(e)
            })?;

        let mut note = GoodsReceivedNote::new(note_id, next_grn_number(&mut *uow).await?, order.id, items);
        note.received_by = input.received_by;
        note.invoice_number = input.invoice_number;
        note.delivery_note_number = input.delivery_note_number;
        note.notes = input.notes;
        note.discrepancy_notes = input.discrepancy_notes;

        for line in note.items.iter().filter(|l| !l.quantity_received.is_zero()) {
            let mut item = match uow
                .find_item(&line.ingredient_name, order.destination_location_id)
                .await?
            {
                Some(item) => item,
                None => {
                    let mut item = InventoryItem::new(&line.ingredient_name, &line.unit);
                    item.location_id = order.destination_location_id;
                    item.unit_cost = line.unit_price;
                    uow.insert_item(&item).await?;
                    item
                }
            };

            let mut entry = LedgerEntry::new(TransactionType::Purchase, line.quantity_received)
                .with_unit_cost(line.unit_price)
                .with_reference(note.id)
                .with_notes(format!("Received on {} for {}", note.grn_number, order.po_number));
            entry.user_id = note.received_by.clone();
            post_entry(&mut *uow, &mut item, entry).await?;
        }

        uow.update_purchase_order(&mut order).await?;
        uow.insert_goods_received_note(&note).await?;
        remember(&mut *uow, idempotency_key, OP_RECEIVE, note.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Received {} against {} ({} lines, discrepancies: {}); order is now {}",
            note.grn_number,
            order.po_number,
            note.items.len(),
            note.has_discrepancies,
            order.status.as_str()
        );
        Ok(note)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        let mut uow = self.store.begin().await?;
        load_order(&mut *uow, id).await
    }

    /// Orders, newest first
    pub async fn list(&self, status: Option<PurchaseOrderStatus>) -> AppResult<Vec<PurchaseOrder>> {
        let mut uow = self.store.begin().await?;
        uow.list_purchase_orders(status).await
    }

    /// Open orders past their expected delivery date, most overdue first
    pub async fn overdue(&self) -> AppResult<Vec<PurchaseOrder>> {
        let mut uow = self.store.begin().await?;
        let now = Utc::now();
        let mut orders: Vec<PurchaseOrder> = uow
            .list_purchase_orders(None)
            .await?
            .into_iter()
            .filter(|o| o.is_overdue_at(now))
            .collect();
        orders.sort_by_key(|o| o.expected_delivery_date);
        Ok(orders)
    }

    /// Goods received notes of an order, oldest first
    pub async fn receipts(&self, order_id: Uuid) -> AppResult<Vec<GoodsReceivedNote>> {
        let mut uow = self.store.begin().await?;
        load_order(&mut *uow, order_id).await?;
        uow.list_goods_received_notes(order_id).await
    }

    async fn transition<F>(
        &self,
        id: Uuid,
        idempotency_key: Option<&str>,
        operation: &str,
        action: F,
    ) -> AppResult<PurchaseOrder>
    where
        F: FnOnce(&mut PurchaseOrder) -> Result<(), TransitionError> + Send,
    {
        let mut uow = self.store.begin().await?;
        if replayed_for(&mut *uow, idempotency_key, operation, id).await? {
            tracing::warn!("Replayed {} of purchase order {}", operation, id);
            return load_order(&mut *uow, id).await;
        }

        let mut order = load_order(&mut *uow, id).await?;
        action(&mut order).map_err(|e| rejected(id, e))?;
        uow.update_purchase_order(&mut order).await?;

        if order.status == PurchaseOrderStatus::Ordered {
            if let Some(supplier_id) = order.supplier_id {
                if let Some(mut supplier) = uow.get_supplier(supplier_id).await? {
                    supplier.last_order_date = Some(Utc::now());
                    uow.update_supplier(&supplier).await?;
                }
            }
        }

        remember(&mut *uow, idempotency_key, operation, order.id).await?;
        uow.commit().await?;

        tracing::info!("Purchase order {} is now {}", order.po_number, order.status.as_str());
        Ok(order)
    }
}
