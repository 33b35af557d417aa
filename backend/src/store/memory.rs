//! In-memory store
//!
//! A unit of work holds the store's mutex for its whole lifetime and works on a
//! staged clone of the state, which replaces the live state on commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    DateRange, FinancialPeriod, GoodsReceivedNote, InventoryItem, InventoryTransaction, Location,
    MenuItem, PriceHistory, PurchaseOrder, PurchaseOrderStatus, Recipe, RecipeCostHistory,
    StockTransfer, Supplier, SupplierIngredient, TransferStatus, VarianceRecord, WasteLog,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{IdempotencyRecord, Store, TransactionFilter, UnitOfWork};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default, Clone)]
struct State {
    items: HashMap<Uuid, InventoryItem>,
    transactions: Vec<InventoryTransaction>,
    locations: HashMap<Uuid, Location>,
    transfers: HashMap<Uuid, StockTransfer>,
    suppliers: HashMap<Uuid, Supplier>,
    supplier_ingredients: HashMap<Uuid, SupplierIngredient>,
    price_history: Vec<PriceHistory>,
    purchase_orders: HashMap<Uuid, PurchaseOrder>,
    goods_received_notes: Vec<GoodsReceivedNote>,
    recipes: HashMap<Uuid, Recipe>,
    cost_history: Vec<RecipeCostHistory>,
    menu_items: HashMap<Uuid, MenuItem>,
    waste_logs: Vec<WasteLog>,
    variance_records: Vec<VarianceRecord>,
    financial_periods: Vec<FinancialPeriod>,
    idempotency: HashMap<(String, String), IdempotencyRecord>,
}

/// Process-local store for tests and single-node deployments
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail with a persistence error
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            fail_next_commit: self.fail_next_commit.clone(),
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    staged: State,
    fail_next_commit: Arc<AtomicBool>,
}

fn duplicate(resource: &str, id: impl std::fmt::Display) -> AppError {
    AppError::conflict(resource, format!("{} {} already exists", resource, id))
}

fn check_version(resource: &str, stored: i64, incoming: i64) -> AppResult<()> {
    if stored != incoming {
        return Err(AppError::conflict(
            resource,
            format!(
                "{} was modified concurrently (expected version {}, found {})",
                resource, incoming, stored
            ),
        ));
    }
    Ok(())
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn get_item(&mut self, id: Uuid) -> AppResult<Option<InventoryItem>> {
        Ok(self.staged.items.get(&id).cloned())
    }

    async fn find_item(
        &mut self,
        ingredient_name: &str,
        location_id: Option<Uuid>,
    ) -> AppResult<Option<InventoryItem>> {
        let name = ingredient_name.to_lowercase();
        Ok(self
            .staged
            .items
            .values()
            .filter(|i| i.location_id == location_id && i.ingredient_name.to_lowercase() == name)
            .min_by_key(|i| i.created_at)
            .cloned())
    }

    async fn list_items(&mut self, location_id: Option<Uuid>) -> AppResult<Vec<InventoryItem>> {
        let mut items: Vec<InventoryItem> = self
            .staged
            .items
            .values()
            .filter(|i| location_id.is_none() || i.location_id == location_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.ingredient_name
                .cmp(&b.ingredient_name)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(items)
    }

    async fn insert_item(&mut self, item: &InventoryItem) -> AppResult<()> {
        if self.staged.items.contains_key(&item.id) {
            return Err(duplicate("Inventory item", item.id));
        }
        self.staged.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item(&mut self, item: &mut InventoryItem) -> AppResult<()> {
        let stored = self
            .staged
            .items
            .get(&item.id)
            .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;
        check_version("Inventory item", stored.version, item.version)?;
        item.version += 1;
        self.staged.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn delete_item(&mut self, id: Uuid) -> AppResult<bool> {
        let removed = self.staged.items.remove(&id).is_some();
        self.staged.transactions.retain(|t| t.inventory_item_id != id);
        Ok(removed)
    }

    async fn insert_transaction(&mut self, transaction: &InventoryTransaction) -> AppResult<()> {
        self.staged.transactions.push(transaction.clone());
        Ok(())
    }

    async fn get_transaction(&mut self, id: Uuid) -> AppResult<Option<InventoryTransaction>> {
        Ok(self.staged.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> AppResult<Vec<InventoryTransaction>> {
        Ok(self
            .staged
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn insert_location(&mut self, location: &Location) -> AppResult<()> {
        if self.staged.locations.contains_key(&location.id) {
            return Err(duplicate("Location", location.id));
        }
        self.staged.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn get_location(&mut self, id: Uuid) -> AppResult<Option<Location>> {
        Ok(self.staged.locations.get(&id).cloned())
    }

    async fn list_locations(&mut self) -> AppResult<Vec<Location>> {
        let mut locations: Vec<Location> = self.staged.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn delete_location(&mut self, id: Uuid) -> AppResult<bool> {
        if self.staged.locations.remove(&id).is_none() {
            return Ok(false);
        }
        for item in self.staged.items.values_mut() {
            if item.location_id == Some(id) {
                item.location_id = None;
                item.version += 1;
            }
        }
        Ok(true)
    }

    async fn insert_transfer(&mut self, transfer: &StockTransfer) -> AppResult<()> {
        if self.staged.transfers.contains_key(&transfer.id) {
            return Err(duplicate("Transfer", transfer.id));
        }
        self.staged.transfers.insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn get_transfer(&mut self, id: Uuid) -> AppResult<Option<StockTransfer>> {
        Ok(self.staged.transfers.get(&id).cloned())
    }

    async fn update_transfer(&mut self, transfer: &mut StockTransfer) -> AppResult<()> {
        let stored = self
            .staged
            .transfers
            .get(&transfer.id)
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;
        check_version("Transfer", stored.version, transfer.version)?;
        transfer.version += 1;
        self.staged.transfers.insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn list_transfers(&mut self, status: Option<TransferStatus>) -> AppResult<Vec<StockTransfer>> {
        let mut transfers: Vec<StockTransfer> = self
            .staged
            .transfers
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        transfers.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(transfers)
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> AppResult<()> {
        if self.staged.suppliers.contains_key(&supplier.id) {
            return Err(duplicate("Supplier", supplier.id));
        }
        self.staged.suppliers.insert(supplier.id, supplier.clone());
        Ok(())
    }

    async fn get_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>> {
        Ok(self.staged.suppliers.get(&id).cloned())
    }

    async fn update_supplier(&mut self, supplier: &Supplier) -> AppResult<()> {
        match self.staged.suppliers.get_mut(&supplier.id) {
            Some(stored) => {
                *stored = supplier.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Supplier".to_string())),
        }
    }

    async fn list_suppliers(&mut self) -> AppResult<Vec<Supplier>> {
        let mut suppliers: Vec<Supplier> = self.staged.suppliers.values().cloned().collect();
        suppliers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(suppliers)
    }

    async fn delete_supplier(&mut self, id: Uuid) -> AppResult<bool> {
        if self.staged.suppliers.remove(&id).is_none() {
            return Ok(false);
        }
        let offers: Vec<Uuid> = self
            .staged
            .supplier_ingredients
            .values()
            .filter(|o| o.supplier_id == id)
            .map(|o| o.id)
            .collect();
        for offer in &offers {
            self.staged.supplier_ingredients.remove(offer);
        }
        self.staged
            .price_history
            .retain(|h| !offers.contains(&h.supplier_ingredient_id));
        for order in self.staged.purchase_orders.values_mut() {
            if order.supplier_id == Some(id) {
                order.supplier_id = None;
                order.version += 1;
            }
        }
        Ok(true)
    }

    async fn insert_supplier_ingredient(&mut self, offer: &SupplierIngredient) -> AppResult<()> {
        if self.staged.supplier_ingredients.contains_key(&offer.id) {
            return Err(duplicate("Supplier ingredient", offer.id));
        }
        self.staged.supplier_ingredients.insert(offer.id, offer.clone());
        Ok(())
    }

    async fn get_supplier_ingredient(&mut self, id: Uuid) -> AppResult<Option<SupplierIngredient>> {
        Ok(self.staged.supplier_ingredients.get(&id).cloned())
    }

    async fn update_supplier_ingredient(&mut self, offer: &SupplierIngredient) -> AppResult<()> {
        match self.staged.supplier_ingredients.get_mut(&offer.id) {
            Some(stored) => {
                *stored = offer.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Supplier ingredient".to_string())),
        }
    }

    async fn list_supplier_ingredients(
        &mut self,
        supplier_id: Option<Uuid>,
    ) -> AppResult<Vec<SupplierIngredient>> {
        let mut offers: Vec<SupplierIngredient> = self
            .staged
            .supplier_ingredients
            .values()
            .filter(|o| supplier_id.map_or(true, |s| o.supplier_id == s))
            .cloned()
            .collect();
        offers.sort_by(|a, b| a.ingredient_name.cmp(&b.ingredient_name));
        Ok(offers)
    }

    async fn insert_price_history(&mut self, history: &PriceHistory) -> AppResult<()> {
        self.staged.price_history.push(history.clone());
        Ok(())
    }

    async fn list_price_history(&mut self, supplier_ingredient_id: Uuid) -> AppResult<Vec<PriceHistory>> {
        Ok(self
            .staged
            .price_history
            .iter()
            .filter(|h| h.supplier_ingredient_id == supplier_ingredient_id)
            .cloned()
            .collect())
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        if self.staged.purchase_orders.contains_key(&order.id) {
            return Err(duplicate("Purchase order", order.id));
        }
        if self
            .staged
            .purchase_orders
            .values()
            .any(|o| o.po_number == order.po_number)
        {
            return Err(duplicate("Purchase order", &order.po_number));
        }
        self.staged.purchase_orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_purchase_order(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        Ok(self.staged.purchase_orders.get(&id).cloned())
    }

    async fn update_purchase_order(&mut self, order: &mut PurchaseOrder) -> AppResult<()> {
        let stored = self
            .staged
            .purchase_orders
            .get(&order.id)
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;
        check_version("Purchase order", stored.version, order.version)?;
        order.version += 1;
        self.staged.purchase_orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn list_purchase_orders(
        &mut self,
        status: Option<PurchaseOrderStatus>,
    ) -> AppResult<Vec<PurchaseOrder>> {
        let mut orders: Vec<PurchaseOrder> = self
            .staged
            .purchase_orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn count_purchase_orders_with_prefix(&mut self, prefix: &str) -> AppResult<i64> {
        Ok(self
            .staged
            .purchase_orders
            .values()
            .filter(|o| o.po_number.starts_with(prefix))
            .count() as i64)
    }

    async fn purchase_order_number_exists(&mut self, po_number: &str) -> AppResult<bool> {
        Ok(self
            .staged
            .purchase_orders
            .values()
            .any(|o| o.po_number == po_number))
    }

    async fn insert_goods_received_note(&mut self, note: &GoodsReceivedNote) -> AppResult<()> {
        if self
            .staged
            .goods_received_notes
            .iter()
            .any(|n| n.id == note.id || n.grn_number == note.grn_number)
        {
            return Err(duplicate("Goods received note", &note.grn_number));
        }
        self.staged.goods_received_notes.push(note.clone());
        Ok(())
    }

    async fn get_goods_received_note(&mut self, id: Uuid) -> AppResult<Option<GoodsReceivedNote>> {
        Ok(self
            .staged
            .goods_received_notes
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn list_goods_received_notes(
        &mut self,
        purchase_order_id: Uuid,
    ) -> AppResult<Vec<GoodsReceivedNote>> {
        Ok(self
            .staged
            .goods_received_notes
            .iter()
            .filter(|n| n.purchase_order_id == purchase_order_id)
            .cloned()
            .collect())
    }

    async fn count_goods_received_notes_with_prefix(&mut self, prefix: &str) -> AppResult<i64> {
        Ok(self
            .staged
            .goods_received_notes
            .iter()
            .filter(|n| n.grn_number.starts_with(prefix))
            .count() as i64)
    }

    async fn goods_received_note_number_exists(&mut self, grn_number: &str) -> AppResult<bool> {
        Ok(self
            .staged
            .goods_received_notes
            .iter()
            .any(|n| n.grn_number == grn_number))
    }

    async fn insert_recipe(&mut self, recipe: &Recipe) -> AppResult<()> {
        if self.staged.recipes.contains_key(&recipe.id) {
            return Err(duplicate("Recipe", recipe.id));
        }
        self.staged.recipes.insert(recipe.id, recipe.clone());
        Ok(())
    }

    async fn get_recipe(&mut self, id: Uuid) -> AppResult<Option<Recipe>> {
        Ok(self.staged.recipes.get(&id).cloned())
    }

    async fn update_recipe(&mut self, recipe: &Recipe) -> AppResult<()> {
        match self.staged.recipes.get_mut(&recipe.id) {
            Some(stored) => {
                *stored = recipe.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Recipe".to_string())),
        }
    }

    async fn list_recipes(&mut self) -> AppResult<Vec<Recipe>> {
        let mut recipes: Vec<Recipe> = self.staged.recipes.values().cloned().collect();
        recipes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(recipes)
    }

    async fn insert_cost_history(&mut self, history: &RecipeCostHistory) -> AppResult<()> {
        self.staged.cost_history.push(history.clone());
        Ok(())
    }

    async fn list_cost_history(&mut self, recipe_id: Option<Uuid>) -> AppResult<Vec<RecipeCostHistory>> {
        Ok(self
            .staged
            .cost_history
            .iter()
            .filter(|h| recipe_id.map_or(true, |id| h.recipe_id == id))
            .cloned()
            .collect())
    }

    async fn insert_menu_item(&mut self, item: &MenuItem) -> AppResult<()> {
        if self.staged.menu_items.contains_key(&item.id) {
            return Err(duplicate("Menu item", item.id));
        }
        self.staged.menu_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_menu_item(&mut self, id: Uuid) -> AppResult<Option<MenuItem>> {
        Ok(self.staged.menu_items.get(&id).cloned())
    }

    async fn update_menu_item(&mut self, item: &MenuItem) -> AppResult<()> {
        match self.staged.menu_items.get_mut(&item.id) {
            Some(stored) => {
                *stored = item.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Menu item".to_string())),
        }
    }

    async fn list_menu_items(&mut self) -> AppResult<Vec<MenuItem>> {
        let mut items: Vec<MenuItem> = self.staged.menu_items.values().cloned().collect();
        items.sort_by(|a, b| a.recipe_name.cmp(&b.recipe_name));
        Ok(items)
    }

    async fn insert_waste_log(&mut self, log: &WasteLog) -> AppResult<()> {
        self.staged.waste_logs.push(log.clone());
        Ok(())
    }

    async fn get_waste_log(&mut self, id: Uuid) -> AppResult<Option<WasteLog>> {
        Ok(self.staged.waste_logs.iter().find(|l| l.id == id).cloned())
    }

    async fn list_waste_logs(&mut self, range: Option<DateRange>) -> AppResult<Vec<WasteLog>> {
        Ok(self
            .staged
            .waste_logs
            .iter()
            .filter(|l| range.map_or(true, |r| r.contains(l.timestamp)))
            .cloned()
            .collect())
    }

    async fn insert_variance_record(&mut self, record: &VarianceRecord) -> AppResult<()> {
        self.staged.variance_records.push(record.clone());
        Ok(())
    }

    async fn list_variance_records(&mut self) -> AppResult<Vec<VarianceRecord>> {
        Ok(self.staged.variance_records.clone())
    }

    async fn insert_financial_period(&mut self, period: &FinancialPeriod) -> AppResult<()> {
        self.staged.financial_periods.push(period.clone());
        Ok(())
    }

    async fn list_financial_periods(&mut self) -> AppResult<Vec<FinancialPeriod>> {
        Ok(self.staged.financial_periods.clone())
    }

    async fn find_idempotency(
        &mut self,
        key: &str,
        operation: &str,
    ) -> AppResult<Option<IdempotencyRecord>> {
        Ok(self
            .staged
            .idempotency
            .get(&(key.to_string(), operation.to_string()))
            .cloned())
    }

    async fn insert_idempotency(&mut self, record: &IdempotencyRecord) -> AppResult<()> {
        let key = (record.key.clone(), record.operation.clone());
        if self.staged.idempotency.contains_key(&key) {
            return Err(duplicate("Idempotency key", &record.key));
        }
        self.staged.idempotency.insert(key, record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::Persistence("commit failed".to_string()));
        }
        let MemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}
