//! Ledger core: inventory items and their append-only transaction log
//!
//! Every quantity change goes through [`post_entry`], which appends one
//! transaction and updates the item's running balance in the same unit of work.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ledger_balance, low_stock_items, total_inventory_value, validate_movement_quantity,
    validate_non_negative_quantity, validate_price, validate_stock_levels, InventoryItem,
    InventoryTransaction, LedgerEntry, LowStockAlert, TransactionType,
};
use uuid::Uuid;
use validator::Validate;

use super::{check, key_reused, remember, replayed};
use crate::error::{AppError, AppResult};
use crate::store::{Store, TransactionFilter, UnitOfWork};

const OP_CREATE_ITEM: &str = "ledger.create_item";
const OP_ADJUST: &str = "ledger.adjust";

/// Ledger service for inventory items and stock movements
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
}

/// Input for creating an inventory item
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub ingredient_name: String,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    /// Recorded as an opening adjustment
    #[serde(default)]
    pub opening_quantity: Decimal,
    pub par_level: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    #[serde(default)]
    pub unit_cost: Decimal,
    #[validate(length(max = 100))]
    pub storage_location: Option<String>,
    pub location_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Input for changing an item's settings; quantity is only changed by adjustments
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub ingredient_name: Option<String>,
    pub par_level: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    #[validate(length(max = 100))]
    pub storage_location: Option<String>,
    pub location_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Input for a manual stock adjustment
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustInput {
    pub item_id: Option<Uuid>,
    /// Signed: positive adds stock, negative removes it
    pub quantity: Decimal,
    pub transaction_type: TransactionType,
    pub unit_cost: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub reference_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub user_id: Option<String>,
}

/// Stored balance compared with the balance its ledger implies
#[derive(Debug, Clone, Serialize)]
pub struct LedgerCheck {
    pub inventory_item_id: Uuid,
    pub quantity_on_hand: Decimal,
    pub ledger_balance: Decimal,
    pub transaction_count: usize,
    pub consistent: bool,
}

/// Stock value held at one location
#[derive(Debug, Clone, Serialize)]
pub struct LocationValuation {
    /// `None` for items without a location
    pub location_id: Option<Uuid>,
    pub location_name: String,
    pub item_count: usize,
    pub total_value: Decimal,
}

const UNASSIGNED: &str = "Unassigned";

/// Append a movement to the item's ledger and persist the new balance
pub(crate) async fn post_entry(
    uow: &mut dyn UnitOfWork,
    item: &mut InventoryItem,
    entry: LedgerEntry,
) -> AppResult<InventoryTransaction> {
    let transaction = item.record(entry);
    uow.update_item(item).await?;
    uow.insert_transaction(&transaction).await?;
    Ok(transaction)
}

async fn load_item(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<InventoryItem> {
    uow.get_item(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))
}

async fn location_names(uow: &mut dyn UnitOfWork) -> AppResult<HashMap<Uuid, String>> {
    Ok(uow
        .list_locations()
        .await?
        .into_iter()
        .map(|l| (l.id, l.name))
        .collect())
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create an item, recording any opening quantity as an adjustment
    pub async fn create_item(
        &self,
        input: CreateItemInput,
        idempotency_key: Option<&str>,
    ) -> AppResult<InventoryItem> {
        input.validate()?;
        check(validate_price(input.unit_cost), "unit_cost")?;
        check(validate_non_negative_quantity(input.opening_quantity), "opening_quantity")?;

        let mut item = InventoryItem::new(input.ingredient_name.trim(), input.unit.trim());
        if let Some(par_level) = input.par_level {
            item.par_level = par_level;
        }
        if let Some(reorder_point) = input.reorder_point {
            item.reorder_point = reorder_point;
        }
        check(validate_stock_levels(item.par_level, item.reorder_point), "reorder_point")?;
        item.unit_cost = input.unit_cost;
        item.storage_location = input.storage_location;
        item.location_id = input.location_id;
        item.notes = input.notes;

        let mut uow = self.store.begin().await?;
        if let Some(id) = replayed(&mut *uow, idempotency_key, OP_CREATE_ITEM).await? {
            let existing = load_item(&mut *uow, id).await?;
            if !existing.ingredient_name.eq_ignore_ascii_case(&item.ingredient_name)
                || existing.location_id != item.location_id
            {
                return Err(key_reused(OP_CREATE_ITEM));
            }
            tracing::warn!("Replayed item creation for key {:?}", idempotency_key);
            return Ok(existing);
        }

        if let Some(location_id) = item.location_id {
            if uow.get_location(location_id).await?.is_none() {
                return Err(AppError::NotFound("Location".to_string()));
            }
        }

        let opening = if input.opening_quantity.is_zero() {
            None
        } else {
            Some(item.record(
                LedgerEntry::new(TransactionType::Adjustment, input.opening_quantity)
                    .with_notes("Opening balance"),
            ))
        };

        uow.insert_item(&item).await?;
        if let Some(transaction) = &opening {
            uow.insert_transaction(transaction).await?;
        }
        remember(&mut *uow, idempotency_key, OP_CREATE_ITEM, item.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Created inventory item {} ({}) with {} {}",
            item.id,
            item.ingredient_name,
            item.quantity_on_hand,
            item.unit
        );
        Ok(item)
    }

    pub async fn get_item(&self, id: Uuid) -> AppResult<InventoryItem> {
        let mut uow = self.store.begin().await?;
        load_item(&mut *uow, id).await
    }

    /// Items, optionally restricted to one location
    pub async fn list_items(&self, location_id: Option<Uuid>) -> AppResult<Vec<InventoryItem>> {
        tracing::debug!("Listing inventory items for location {:?}", location_id);
        let mut uow = self.store.begin().await?;
        uow.list_items(location_id).await
    }

    /// Change par level, reorder point, cost basis and placement
    pub async fn update_item(&self, id: Uuid, input: UpdateItemInput) -> AppResult<InventoryItem> {
        input.validate()?;
        if let Some(unit_cost) = input.unit_cost {
            check(validate_price(unit_cost), "unit_cost")?;
        }

        let mut uow = self.store.begin().await?;
        let mut item = load_item(&mut *uow, id).await?;

        if let Some(name) = input.ingredient_name {
            item.ingredient_name = name.trim().to_string();
        }
        if let Some(par_level) = input.par_level {
            item.par_level = par_level;
        }
        if let Some(reorder_point) = input.reorder_point {
            item.reorder_point = reorder_point;
        }
        check(validate_stock_levels(item.par_level, item.reorder_point), "reorder_point")?;
        if let Some(unit_cost) = input.unit_cost {
            item.unit_cost = unit_cost;
        }
        if input.storage_location.is_some() {
            item.storage_location = input.storage_location;
        }
        if let Some(location_id) = input.location_id {
            if uow.get_location(location_id).await?.is_none() {
                return Err(AppError::NotFound("Location".to_string()));
            }
            item.location_id = Some(location_id);
        }
        if input.notes.is_some() {
            item.notes = input.notes;
        }

        uow.update_item(&mut item).await?;
        uow.commit().await?;

        tracing::info!("Updated settings of inventory item {}", item.id);
        Ok(item)
    }

    /// Delete an item together with its transactions
    pub async fn delete_item(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_item(id).await? {
            return Err(AppError::NotFound("Inventory item".to_string()));
        }
        uow.commit().await?;

        tracing::info!("Deleted inventory item {} and its ledger", id);
        Ok(())
    }

    /// Record a signed movement against an item.
    ///
    /// The sign is not checked against the transaction type and the balance may
    /// go negative.
    pub async fn adjust(
        &self,
        input: AdjustInput,
        idempotency_key: Option<&str>,
    ) -> AppResult<InventoryTransaction> {
        input.validate()?;
        let item_id = input
            .item_id
            .ok_or_else(|| AppError::validation("item_id", "An inventory item is required"))?;
        check(validate_movement_quantity(input.quantity), "quantity")?;
        if let Some(unit_cost) = input.unit_cost {
            check(validate_price(unit_cost), "unit_cost")?;
        }

        let mut uow = self.store.begin().await?;
        if let Some(id) = replayed(&mut *uow, idempotency_key, OP_ADJUST).await? {
            let transaction = uow
                .get_transaction(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Inventory transaction".to_string()))?;
            if transaction.inventory_item_id != item_id {
                tracing::warn!(
                    "Idempotency key {:?} was used for item {}, not {}",
                    idempotency_key,
                    transaction.inventory_item_id,
                    item_id
                );
                return Err(key_reused(OP_ADJUST));
            }
            tracing::warn!("Replayed adjustment for key {:?}, returning transaction {}", idempotency_key, id);
            return Ok(transaction);
        }

        let mut item = load_item(&mut *uow, item_id).await?;

        let mut entry = LedgerEntry::new(input.transaction_type, input.quantity);
        entry.unit_cost = input.unit_cost;
        entry.notes = input.notes;
        entry.reference_id = input.reference_id;
        entry.user_id = input.user_id;

        let transaction = post_entry(&mut *uow, &mut item, entry).await?;
        remember(&mut *uow, idempotency_key, OP_ADJUST, transaction.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Recorded {} of {} {} on item {} (on hand: {})",
            transaction.transaction_type,
            transaction.quantity,
            item.unit,
            item.id,
            item.quantity_on_hand
        );
        Ok(transaction)
    }

    /// Transactions of one item, oldest first
    pub async fn transactions(&self, item_id: Uuid) -> AppResult<Vec<InventoryTransaction>> {
        let mut uow = self.store.begin().await?;
        load_item(&mut *uow, item_id).await?;
        uow.list_transactions(&TransactionFilter::for_item(item_id)).await
    }

    /// Compare the stored balance with the sum of the item's transactions
    pub async fn verify_ledger(&self, item_id: Uuid) -> AppResult<LedgerCheck> {
        let mut uow = self.store.begin().await?;
        let item = load_item(&mut *uow, item_id).await?;
        let transactions = uow
            .list_transactions(&TransactionFilter::for_item(item_id))
            .await?;

        let balance = ledger_balance(&transactions);
        let consistent = balance == item.quantity_on_hand;
        if !consistent {
            tracing::warn!(
                "Ledger mismatch on item {}: stored {}, ledger {}",
                item.id,
                item.quantity_on_hand,
                balance
            );
        }

        Ok(LedgerCheck {
            inventory_item_id: item.id,
            quantity_on_hand: item.quantity_on_hand,
            ledger_balance: balance,
            transaction_count: transactions.len(),
            consistent,
        })
    }

    /// Items at or below their reorder point, lowest quantity first
    pub async fn low_stock_items(&self, location_id: Option<Uuid>) -> AppResult<Vec<InventoryItem>> {
        let mut uow = self.store.begin().await?;
        let items = uow.list_items(location_id).await?;
        Ok(low_stock_items(&items))
    }

    /// Replenishment alerts for every item that is out of stock, low or below par
    pub async fn low_stock_alerts(&self) -> AppResult<Vec<LowStockAlert>> {
        let mut uow = self.store.begin().await?;
        let names = location_names(&mut *uow).await?;
        let items = uow.list_items(None).await?;

        let mut alerts: Vec<LowStockAlert> = items
            .iter()
            .filter_map(|item| {
                let location = item
                    .location_id
                    .and_then(|id| names.get(&id).cloned())
                    .unwrap_or_else(|| UNASSIGNED.to_string());
                LowStockAlert::for_item(item, location)
            })
            .collect();
        alerts.sort_by(|a, b| a.current_quantity.cmp(&b.current_quantity));

        tracing::debug!("{} low stock alerts", alerts.len());
        Ok(alerts)
    }

    /// Value of all stock on hand
    pub async fn total_value(&self) -> AppResult<Decimal> {
        let mut uow = self.store.begin().await?;
        let items = uow.list_items(None).await?;
        Ok(total_inventory_value(&items))
    }

    /// Stock value grouped by location, unassigned items last
    pub async fn valuation_by_location(&self) -> AppResult<Vec<LocationValuation>> {
        let mut uow = self.store.begin().await?;
        let locations = uow.list_locations().await?;
        let items = uow.list_items(None).await?;

        let mut valuations: Vec<LocationValuation> = locations
            .into_iter()
            .map(|location| {
                let held: Vec<InventoryItem> = items
                    .iter()
                    .filter(|i| i.location_id == Some(location.id))
                    .cloned()
                    .collect();
                LocationValuation {
                    location_id: Some(location.id),
                    location_name: location.name,
                    item_count: held.len(),
                    total_value: total_inventory_value(&held),
                }
            })
            .collect();

        let unassigned: Vec<InventoryItem> = items
            .iter()
            .filter(|i| !valuations.iter().any(|v| v.location_id.is_some() && v.location_id == i.location_id))
            .cloned()
            .collect();
        if !unassigned.is_empty() {
            valuations.push(LocationValuation {
                location_id: None,
                location_name: UNASSIGNED.to_string(),
                item_count: unassigned.len(),
                total_value: total_inventory_value(&unassigned),
            });
        }
        Ok(valuations)
    }
}
