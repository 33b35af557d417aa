//! Storage abstraction for the ledger
//!
//! Every mutating command runs inside one [`UnitOfWork`]. Writes become
//! visible only when [`UnitOfWork::commit`] succeeds; dropping a unit of work
//! without committing discards them, so a cancelled or timed-out command leaves
//! no effect.
//!
//! Two backends are provided:
//! - **memory**: a single in-process state guarded by an async mutex. Units of
//!   work are serialized and operate on a staged copy.
//! - **postgres**: one sqlx transaction per unit of work, with row locks on
//!   mutable aggregates and version-checked updates.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    DateRange, FinancialPeriod, GoodsReceivedNote, InventoryItem, InventoryTransaction, Location,
    MenuItem, PriceHistory, PurchaseOrder, PurchaseOrderStatus, Recipe, RecipeCostHistory,
    StockTransfer, Supplier, SupplierIngredient, TransactionType, TransferStatus, VarianceRecord,
    WasteLog,
};
use uuid::Uuid;

use crate::error::AppResult;

/// Marks a command as applied so a replay with the same key is a no-op
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub key: String,
    pub operation: String,
    /// Entity the original command produced or changed
    pub entity_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(key: impl Into<String>, operation: impl Into<String>, entity_id: Uuid) -> Self {
        Self {
            key: key.into(),
            operation: operation.into(),
            entity_id,
            created_at: Utc::now(),
        }
    }
}

/// Predicate for ledger queries; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub inventory_item_id: Option<Uuid>,
    pub transaction_types: Vec<TransactionType>,
    pub range: Option<DateRange>,
}

impl TransactionFilter {
    pub fn for_item(inventory_item_id: Uuid) -> Self {
        Self {
            inventory_item_id: Some(inventory_item_id),
            ..Default::default()
        }
    }

    pub fn of_types(mut self, types: &[TransactionType]) -> Self {
        self.transaction_types = types.to_vec();
        self
    }

    pub fn within(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn matches(&self, transaction: &InventoryTransaction) -> bool {
        self.inventory_item_id
            .map_or(true, |id| transaction.inventory_item_id == id)
            && (self.transaction_types.is_empty()
                || self.transaction_types.contains(&transaction.transaction_type))
            && self.range.map_or(true, |r| r.contains(transaction.timestamp))
    }
}

/// A storage backend able to open units of work
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name for logging
    fn backend_name(&self) -> &'static str;

    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Cheap liveness check
    async fn ping(&self) -> AppResult<()>;
}

/// One atomic batch of reads and writes.
///
/// `update_*` on versioned entities fails with a conflict when the stored
/// version differs from the one passed in, and bumps the version on success.
#[async_trait]
pub trait UnitOfWork: Send {
    // ========================================================================
    // Inventory items & ledger
    // ========================================================================

    async fn get_item(&mut self, id: Uuid) -> AppResult<Option<InventoryItem>>;

    /// Item for an ingredient at a location, matched case-insensitively
    async fn find_item(
        &mut self,
        ingredient_name: &str,
        location_id: Option<Uuid>,
    ) -> AppResult<Option<InventoryItem>>;

    async fn list_items(&mut self, location_id: Option<Uuid>) -> AppResult<Vec<InventoryItem>>;

    async fn insert_item(&mut self, item: &InventoryItem) -> AppResult<()>;

    async fn update_item(&mut self, item: &mut InventoryItem) -> AppResult<()>;

    /// Delete an item and its transactions
    async fn delete_item(&mut self, id: Uuid) -> AppResult<bool>;

    async fn insert_transaction(&mut self, transaction: &InventoryTransaction) -> AppResult<()>;

    async fn get_transaction(&mut self, id: Uuid) -> AppResult<Option<InventoryTransaction>>;

    /// Matching transactions, oldest first
    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> AppResult<Vec<InventoryTransaction>>;

    // ========================================================================
    // Locations
    // ========================================================================

    async fn insert_location(&mut self, location: &Location) -> AppResult<()>;

    async fn get_location(&mut self, id: Uuid) -> AppResult<Option<Location>>;

    async fn list_locations(&mut self) -> AppResult<Vec<Location>>;

    /// Delete a location, clearing the reference on its items
    async fn delete_location(&mut self, id: Uuid) -> AppResult<bool>;

    // ========================================================================
    // Transfers
    // ========================================================================

    async fn insert_transfer(&mut self, transfer: &StockTransfer) -> AppResult<()>;

    async fn get_transfer(&mut self, id: Uuid) -> AppResult<Option<StockTransfer>>;

    async fn update_transfer(&mut self, transfer: &mut StockTransfer) -> AppResult<()>;

    async fn list_transfers(&mut self, status: Option<TransferStatus>) -> AppResult<Vec<StockTransfer>>;

    // ========================================================================
    // Suppliers
    // ========================================================================

    async fn insert_supplier(&mut self, supplier: &Supplier) -> AppResult<()>;

    async fn get_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>>;

    async fn update_supplier(&mut self, supplier: &Supplier) -> AppResult<()>;

    async fn list_suppliers(&mut self) -> AppResult<Vec<Supplier>>;

    /// Delete a supplier with its catalogue, clearing the reference on orders
    async fn delete_supplier(&mut self, id: Uuid) -> AppResult<bool>;

    async fn insert_supplier_ingredient(&mut self, offer: &SupplierIngredient) -> AppResult<()>;

    async fn get_supplier_ingredient(&mut self, id: Uuid) -> AppResult<Option<SupplierIngredient>>;

    async fn update_supplier_ingredient(&mut self, offer: &SupplierIngredient) -> AppResult<()>;

    async fn list_supplier_ingredients(
        &mut self,
        supplier_id: Option<Uuid>,
    ) -> AppResult<Vec<SupplierIngredient>>;

    async fn insert_price_history(&mut self, history: &PriceHistory) -> AppResult<()>;

    /// Price changes for one offer, oldest first
    async fn list_price_history(&mut self, supplier_ingredient_id: Uuid) -> AppResult<Vec<PriceHistory>>;

    // ========================================================================
    // Procurement
    // ========================================================================

    /// Insert an order with its lines
    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()>;

    async fn get_purchase_order(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>>;

    /// Update an order and its lines
    async fn update_purchase_order(&mut self, order: &mut PurchaseOrder) -> AppResult<()>;

    async fn list_purchase_orders(
        &mut self,
        status: Option<PurchaseOrderStatus>,
    ) -> AppResult<Vec<PurchaseOrder>>;

    async fn count_purchase_orders_with_prefix(&mut self, prefix: &str) -> AppResult<i64>;

    async fn purchase_order_number_exists(&mut self, po_number: &str) -> AppResult<bool>;

    /// Insert a goods received note with its lines
    async fn insert_goods_received_note(&mut self, note: &GoodsReceivedNote) -> AppResult<()>;

    async fn get_goods_received_note(&mut self, id: Uuid) -> AppResult<Option<GoodsReceivedNote>>;

    async fn list_goods_received_notes(
        &mut self,
        purchase_order_id: Uuid,
    ) -> AppResult<Vec<GoodsReceivedNote>>;

    async fn count_goods_received_notes_with_prefix(&mut self, prefix: &str) -> AppResult<i64>;

    async fn goods_received_note_number_exists(&mut self, grn_number: &str) -> AppResult<bool>;

    // ========================================================================
    // Costing
    // ========================================================================

    async fn insert_recipe(&mut self, recipe: &Recipe) -> AppResult<()>;

    async fn get_recipe(&mut self, id: Uuid) -> AppResult<Option<Recipe>>;

    async fn update_recipe(&mut self, recipe: &Recipe) -> AppResult<()>;

    async fn list_recipes(&mut self) -> AppResult<Vec<Recipe>>;

    async fn insert_cost_history(&mut self, history: &RecipeCostHistory) -> AppResult<()>;

    async fn list_cost_history(&mut self, recipe_id: Option<Uuid>) -> AppResult<Vec<RecipeCostHistory>>;

    async fn insert_menu_item(&mut self, item: &MenuItem) -> AppResult<()>;

    async fn get_menu_item(&mut self, id: Uuid) -> AppResult<Option<MenuItem>>;

    async fn update_menu_item(&mut self, item: &MenuItem) -> AppResult<()>;

    async fn list_menu_items(&mut self) -> AppResult<Vec<MenuItem>>;

    // ========================================================================
    // Waste, variance & periods
    // ========================================================================

    async fn insert_waste_log(&mut self, log: &WasteLog) -> AppResult<()>;

    async fn get_waste_log(&mut self, id: Uuid) -> AppResult<Option<WasteLog>>;

    async fn list_waste_logs(&mut self, range: Option<DateRange>) -> AppResult<Vec<WasteLog>>;

    async fn insert_variance_record(&mut self, record: &VarianceRecord) -> AppResult<()>;

    async fn list_variance_records(&mut self) -> AppResult<Vec<VarianceRecord>>;

    async fn insert_financial_period(&mut self, period: &FinancialPeriod) -> AppResult<()>;

    async fn list_financial_periods(&mut self) -> AppResult<Vec<FinancialPeriod>>;

    // ========================================================================
    // Idempotency
    // ========================================================================

    async fn find_idempotency(
        &mut self,
        key: &str,
        operation: &str,
    ) -> AppResult<Option<IdempotencyRecord>>;

    async fn insert_idempotency(&mut self, record: &IdempotencyRecord) -> AppResult<()>;

    /// Make every write in this unit visible atomically
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
