//! PostgreSQL store
//!
//! A unit of work is one database transaction. Mutable aggregates are read
//! with `FOR UPDATE` and written back with a version check.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    DateRange, FinancialPeriod, GoodsReceivedItem, GoodsReceivedNote, Ingredient, IngredientCost,
    InventoryItem, InventoryTransaction, Location, LocationType, MenuItem, PeriodType,
    PriceHistory, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, Recipe,
    RecipeCostHistory, StockTransfer, Supplier, SupplierIngredient, TransactionType,
    TransferStatus, VarianceRecord, WasteCategory, WasteLog,
};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{IdempotencyRecord, Store, TransactionFilter, UnitOfWork};
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            AppError::Configuration("database.url is required for the postgres backend".to_string())
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Persistence(format!("migration failed: {}", e)))
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn decode<T>(value: &str, what: &str, parse: impl Fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| AppError::Persistence(format!("unknown {} '{}' in storage", what, value)))
}

/// Error for a version-checked update that touched no row
async fn stale(conn: &mut PgConnection, table: &str, resource: &str, id: Uuid) -> AppError {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table);
    match sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(conn).await {
        Ok(true) => AppError::conflict(resource, format!("{} was modified concurrently", resource)),
        Ok(false) => AppError::NotFound(resource.to_string()),
        Err(e) => e.into(),
    }
}

// ============================================================================
// Row types
// ============================================================================

const ITEM_COLUMNS: &str = "id, ingredient_name, quantity_on_hand, unit, par_level, reorder_point, \
     unit_cost, storage_location, location_id, notes, last_updated, created_at, version";

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    ingredient_name: String,
    quantity_on_hand: Decimal,
    unit: String,
    par_level: Decimal,
    reorder_point: Decimal,
    unit_cost: Decimal,
    storage_location: Option<String>,
    location_id: Option<Uuid>,
    notes: Option<String>,
    last_updated: DateTime<Utc>,
    created_at: DateTime<Utc>,
    version: i64,
}

impl From<ItemRow> for InventoryItem {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            ingredient_name: row.ingredient_name,
            quantity_on_hand: row.quantity_on_hand,
            unit: row.unit,
            par_level: row.par_level,
            reorder_point: row.reorder_point,
            unit_cost: row.unit_cost,
            storage_location: row.storage_location,
            location_id: row.location_id,
            notes: row.notes,
            last_updated: row.last_updated,
            created_at: row.created_at,
            version: row.version,
        }
    }
}

const TRANSACTION_COLUMNS: &str = "id, inventory_item_id, transaction_type, quantity, unit_cost, \
     \"timestamp\", user_id, notes, reference_id";

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    inventory_item_id: Uuid,
    transaction_type: String,
    quantity: Decimal,
    unit_cost: Decimal,
    timestamp: DateTime<Utc>,
    user_id: Option<String>,
    notes: Option<String>,
    reference_id: Option<Uuid>,
}

impl TryFrom<TransactionRow> for InventoryTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            inventory_item_id: row.inventory_item_id,
            transaction_type: decode(&row.transaction_type, "transaction type", TransactionType::from_str)?,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            timestamp: row.timestamp,
            user_id: row.user_id,
            notes: row.notes,
            reference_id: row.reference_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: Uuid,
    name: String,
    location_type: String,
    address: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<LocationRow> for Location {
    type Error = AppError;

    fn try_from(row: LocationRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            location_type: decode(&row.location_type, "location type", LocationType::from_str)?,
            address: row.address,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

const TRANSFER_COLUMNS: &str = "id, from_location_id, to_location_id, ingredient_name, quantity, unit, \
     status, requested_by, approved_by, requested_at, approved_at, completed_at, notes, version";

#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    from_location_id: Uuid,
    to_location_id: Uuid,
    ingredient_name: String,
    quantity: Decimal,
    unit: String,
    status: String,
    requested_by: Option<String>,
    approved_by: Option<String>,
    requested_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    version: i64,
}

impl TryFrom<TransferRow> for StockTransfer {
    type Error = AppError;

    fn try_from(row: TransferRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            from_location_id: row.from_location_id,
            to_location_id: row.to_location_id,
            ingredient_name: row.ingredient_name,
            quantity: row.quantity,
            unit: row.unit,
            status: decode(&row.status, "transfer status", TransferStatus::from_str)?,
            requested_by: row.requested_by,
            approved_by: row.approved_by,
            requested_at: row.requested_at,
            approved_at: row.approved_at,
            completed_at: row.completed_at,
            notes: row.notes,
            version: row.version,
        })
    }
}

const SUPPLIER_COLUMNS: &str = "id, name, contact_name, email, phone, address, payment_terms, \
     delivery_schedule, rating, is_active, notes, created_at, last_order_date";

#[derive(Debug, FromRow)]
struct SupplierRow {
    id: Uuid,
    name: String,
    contact_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    payment_terms: Option<String>,
    delivery_schedule: Option<String>,
    rating: Decimal,
    is_active: bool,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    last_order_date: Option<DateTime<Utc>>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            contact_name: row.contact_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            payment_terms: row.payment_terms,
            delivery_schedule: row.delivery_schedule,
            rating: row.rating,
            is_active: row.is_active,
            notes: row.notes,
            created_at: row.created_at,
            last_order_date: row.last_order_date,
        }
    }
}

const OFFER_COLUMNS: &str = "id, supplier_id, ingredient_name, supplier_sku, unit_price, unit, \
     lead_time_days, minimum_order_quantity, pack_size, last_price_update, is_preferred, notes";

#[derive(Debug, FromRow)]
struct OfferRow {
    id: Uuid,
    supplier_id: Uuid,
    ingredient_name: String,
    supplier_sku: Option<String>,
    unit_price: Decimal,
    unit: String,
    lead_time_days: i32,
    minimum_order_quantity: Decimal,
    pack_size: Option<String>,
    last_price_update: DateTime<Utc>,
    is_preferred: bool,
    notes: Option<String>,
}

impl From<OfferRow> for SupplierIngredient {
    fn from(row: OfferRow) -> Self {
        Self {
            id: row.id,
            supplier_id: row.supplier_id,
            ingredient_name: row.ingredient_name,
            supplier_sku: row.supplier_sku,
            unit_price: row.unit_price,
            unit: row.unit,
            lead_time_days: row.lead_time_days,
            minimum_order_quantity: row.minimum_order_quantity,
            pack_size: row.pack_size,
            last_price_update: row.last_price_update,
            is_preferred: row.is_preferred,
            notes: row.notes,
        }
    }
}

#[derive(Debug, FromRow)]
struct PriceHistoryRow {
    id: Uuid,
    supplier_ingredient_id: Uuid,
    old_price: Decimal,
    new_price: Decimal,
    change_date: DateTime<Utc>,
    change_percentage: Decimal,
    notes: Option<String>,
}

impl From<PriceHistoryRow> for PriceHistory {
    fn from(row: PriceHistoryRow) -> Self {
        Self {
            id: row.id,
            supplier_ingredient_id: row.supplier_ingredient_id,
            old_price: row.old_price,
            new_price: row.new_price,
            change_date: row.change_date,
            change_percentage: row.change_percentage,
            notes: row.notes,
        }
    }
}

const ORDER_COLUMNS: &str = "id, po_number, supplier_id, destination_location_id, status, order_date, \
     expected_delivery_date, actual_delivery_date, total_cost, shipping_cost, tax_amount, notes, \
     created_by, approved_by, approved_at, version";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    po_number: String,
    supplier_id: Option<Uuid>,
    destination_location_id: Option<Uuid>,
    status: String,
    order_date: DateTime<Utc>,
    expected_delivery_date: Option<DateTime<Utc>>,
    actual_delivery_date: Option<DateTime<Utc>>,
    total_cost: Decimal,
    shipping_cost: Decimal,
    tax_amount: Decimal,
    notes: Option<String>,
    created_by: Option<String>,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    version: i64,
}

impl OrderRow {
    fn into_order(self, items: Vec<PurchaseOrderItem>) -> AppResult<PurchaseOrder> {
        Ok(PurchaseOrder {
            id: self.id,
            po_number: self.po_number,
            supplier_id: self.supplier_id,
            destination_location_id: self.destination_location_id,
            status: decode(&self.status, "purchase order status", PurchaseOrderStatus::from_str)?,
            order_date: self.order_date,
            expected_delivery_date: self.expected_delivery_date,
            actual_delivery_date: self.actual_delivery_date,
            total_cost: self.total_cost,
            shipping_cost: self.shipping_cost,
            tax_amount: self.tax_amount,
            notes: self.notes,
            created_by: self.created_by,
            approved_by: self.approved_by,
            approved_at: self.approved_at,
            items,
            version: self.version,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    purchase_order_id: Uuid,
    ingredient_name: String,
    supplier_sku: Option<String>,
    quantity_ordered: Decimal,
    quantity_received: Decimal,
    unit: String,
    unit_price: Decimal,
    notes: Option<String>,
}

impl From<OrderItemRow> for PurchaseOrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            purchase_order_id: row.purchase_order_id,
            ingredient_name: row.ingredient_name,
            supplier_sku: row.supplier_sku,
            quantity_ordered: row.quantity_ordered,
            quantity_received: row.quantity_received,
            unit: row.unit,
            unit_price: row.unit_price,
            notes: row.notes,
        }
    }
}

const NOTE_COLUMNS: &str = "id, grn_number, purchase_order_id, received_date, received_by, \
     invoice_number, delivery_note_number, notes, has_discrepancies, discrepancy_notes";

#[derive(Debug, FromRow)]
struct NoteRow {
    id: Uuid,
    grn_number: String,
    purchase_order_id: Uuid,
    received_date: DateTime<Utc>,
    received_by: Option<String>,
    invoice_number: Option<String>,
    delivery_note_number: Option<String>,
    notes: Option<String>,
    has_discrepancies: bool,
    discrepancy_notes: Option<String>,
}

impl NoteRow {
    fn into_note(self, items: Vec<GoodsReceivedItem>) -> GoodsReceivedNote {
        GoodsReceivedNote {
            id: self.id,
            grn_number: self.grn_number,
            purchase_order_id: self.purchase_order_id,
            received_date: self.received_date,
            received_by: self.received_by,
            invoice_number: self.invoice_number,
            delivery_note_number: self.delivery_note_number,
            notes: self.notes,
            has_discrepancies: self.has_discrepancies,
            discrepancy_notes: self.discrepancy_notes,
            items,
        }
    }
}

#[derive(Debug, FromRow)]
struct NoteItemRow {
    id: Uuid,
    goods_received_note_id: Uuid,
    purchase_order_item_id: Uuid,
    ingredient_name: String,
    quantity_ordered: Decimal,
    quantity_received: Decimal,
    unit: String,
    unit_price: Decimal,
    has_discrepancy: bool,
    discrepancy_notes: Option<String>,
}

impl From<NoteItemRow> for GoodsReceivedItem {
    fn from(row: NoteItemRow) -> Self {
        Self {
            id: row.id,
            goods_received_note_id: row.goods_received_note_id,
            purchase_order_item_id: row.purchase_order_item_id,
            ingredient_name: row.ingredient_name,
            quantity_ordered: row.quantity_ordered,
            quantity_received: row.quantity_received,
            unit: row.unit,
            unit_price: row.unit_price,
            has_discrepancy: row.has_discrepancy,
            discrepancy_notes: row.discrepancy_notes,
        }
    }
}

const RECIPE_COLUMNS: &str = "id, name, description, course, cuisine, portion_size, category, \
     ingredients, selling_price, target_food_cost_percentage, last_cost_calculation, \
     total_production_count, last_produced_date, is_active, menu_category, allergens";

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    name: String,
    description: String,
    course: String,
    cuisine: String,
    portion_size: String,
    category: String,
    ingredients: Json<Vec<Ingredient>>,
    selling_price: Option<Decimal>,
    target_food_cost_percentage: Option<Decimal>,
    last_cost_calculation: Option<DateTime<Utc>>,
    total_production_count: i64,
    last_produced_date: Option<DateTime<Utc>>,
    is_active: bool,
    menu_category: Option<String>,
    allergens: Vec<String>,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            course: row.course,
            cuisine: row.cuisine,
            portion_size: row.portion_size,
            category: row.category,
            ingredients: row.ingredients.0,
            selling_price: row.selling_price,
            target_food_cost_percentage: row.target_food_cost_percentage,
            last_cost_calculation: row.last_cost_calculation,
            total_production_count: row.total_production_count,
            last_produced_date: row.last_produced_date,
            is_active: row.is_active,
            menu_category: row.menu_category,
            allergens: row.allergens,
        }
    }
}

const COST_HISTORY_COLUMNS: &str = "id, recipe_id, recipe_name, date, total_cost, portion_cost, \
     selling_price, target_food_cost_percentage, actual_food_cost_percentage, ingredient_costs, \
     portion_size, notes";

#[derive(Debug, FromRow)]
struct CostHistoryRow {
    id: Uuid,
    recipe_id: Uuid,
    recipe_name: String,
    date: DateTime<Utc>,
    total_cost: Decimal,
    portion_cost: Decimal,
    selling_price: Option<Decimal>,
    target_food_cost_percentage: Option<Decimal>,
    actual_food_cost_percentage: Option<Decimal>,
    ingredient_costs: Json<Vec<IngredientCost>>,
    portion_size: String,
    notes: Option<String>,
}

impl From<CostHistoryRow> for RecipeCostHistory {
    fn from(row: CostHistoryRow) -> Self {
        Self {
            id: row.id,
            recipe_id: row.recipe_id,
            recipe_name: row.recipe_name,
            date: row.date,
            total_cost: row.total_cost,
            portion_cost: row.portion_cost,
            selling_price: row.selling_price,
            target_food_cost_percentage: row.target_food_cost_percentage,
            actual_food_cost_percentage: row.actual_food_cost_percentage,
            ingredient_costs: row.ingredient_costs.0,
            portion_size: row.portion_size,
            notes: row.notes,
        }
    }
}

const MENU_ITEM_COLUMNS: &str = "id, recipe_id, recipe_name, menu_category, selling_price, \
     cost_per_portion, target_food_cost_percentage, is_active, popularity, last_sold_date";

#[derive(Debug, FromRow)]
struct MenuItemRow {
    id: Uuid,
    recipe_id: Uuid,
    recipe_name: String,
    menu_category: String,
    selling_price: Decimal,
    cost_per_portion: Decimal,
    target_food_cost_percentage: Decimal,
    is_active: bool,
    popularity: i64,
    last_sold_date: Option<DateTime<Utc>>,
}

impl From<MenuItemRow> for MenuItem {
    fn from(row: MenuItemRow) -> Self {
        Self {
            id: row.id,
            recipe_id: row.recipe_id,
            recipe_name: row.recipe_name,
            menu_category: row.menu_category,
            selling_price: row.selling_price,
            cost_per_portion: row.cost_per_portion,
            target_food_cost_percentage: row.target_food_cost_percentage,
            is_active: row.is_active,
            popularity: row.popularity,
            last_sold_date: row.last_sold_date,
        }
    }
}

const WASTE_COLUMNS: &str = "id, ingredient_name, inventory_item_id, quantity, unit, waste_category, \
     waste_reason, cost_impact, \"timestamp\", location_id, logged_by, recipe_id, notes";

#[derive(Debug, FromRow)]
struct WasteRow {
    id: Uuid,
    ingredient_name: String,
    inventory_item_id: Option<Uuid>,
    quantity: Decimal,
    unit: String,
    waste_category: String,
    waste_reason: Option<String>,
    cost_impact: Decimal,
    timestamp: DateTime<Utc>,
    location_id: Option<Uuid>,
    logged_by: Option<String>,
    recipe_id: Option<Uuid>,
    notes: Option<String>,
}

impl TryFrom<WasteRow> for WasteLog {
    type Error = AppError;

    fn try_from(row: WasteRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            ingredient_name: row.ingredient_name,
            inventory_item_id: row.inventory_item_id,
            quantity: row.quantity,
            unit: row.unit,
            waste_category: decode(&row.waste_category, "waste category", WasteCategory::from_str)?,
            waste_reason: row.waste_reason,
            cost_impact: row.cost_impact,
            timestamp: row.timestamp,
            location_id: row.location_id,
            logged_by: row.logged_by,
            recipe_id: row.recipe_id,
            notes: row.notes,
        })
    }
}

const VARIANCE_COLUMNS: &str = "id, ingredient_name, period_start, period_end, theoretical_usage, \
     actual_usage, variance, variance_percentage, unit, cost_impact, is_acceptable, \
     acceptable_threshold, investigation_notes, root_cause";

#[derive(Debug, FromRow)]
struct VarianceRow {
    id: Uuid,
    ingredient_name: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    theoretical_usage: Decimal,
    actual_usage: Decimal,
    variance: Decimal,
    variance_percentage: Decimal,
    unit: String,
    cost_impact: Decimal,
    is_acceptable: bool,
    acceptable_threshold: Decimal,
    investigation_notes: Option<String>,
    root_cause: Option<String>,
}

impl From<VarianceRow> for VarianceRecord {
    fn from(row: VarianceRow) -> Self {
        Self {
            id: row.id,
            ingredient_name: row.ingredient_name,
            period_start: row.period_start,
            period_end: row.period_end,
            theoretical_usage: row.theoretical_usage,
            actual_usage: row.actual_usage,
            variance: row.variance,
            variance_percentage: row.variance_percentage,
            unit: row.unit,
            cost_impact: row.cost_impact,
            is_acceptable: row.is_acceptable,
            acceptable_threshold: row.acceptable_threshold,
            investigation_notes: row.investigation_notes,
            root_cause: row.root_cause,
        }
    }
}

const PERIOD_COLUMNS: &str = "id, period_type, start_date, end_date, total_revenue, total_cogs, \
     total_waste_cost, total_purchases, opening_inventory_value, closing_inventory_value, \
     food_cost_percentage, target_food_cost_percentage, notes";

#[derive(Debug, FromRow)]
struct PeriodRow {
    id: Uuid,
    period_type: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    total_revenue: Decimal,
    total_cogs: Decimal,
    total_waste_cost: Decimal,
    total_purchases: Decimal,
    opening_inventory_value: Decimal,
    closing_inventory_value: Decimal,
    food_cost_percentage: Decimal,
    target_food_cost_percentage: Decimal,
    notes: Option<String>,
}

impl TryFrom<PeriodRow> for FinancialPeriod {
    type Error = AppError;

    fn try_from(row: PeriodRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            period_type: decode(&row.period_type, "period type", PeriodType::from_str)?,
            start_date: row.start_date,
            end_date: row.end_date,
            total_revenue: row.total_revenue,
            total_cogs: row.total_cogs,
            total_waste_cost: row.total_waste_cost,
            total_purchases: row.total_purchases,
            opening_inventory_value: row.opening_inventory_value,
            closing_inventory_value: row.closing_inventory_value,
            food_cost_percentage: row.food_cost_percentage,
            target_food_cost_percentage: row.target_food_cost_percentage,
            notes: row.notes,
        })
    }
}

// ============================================================================
// Child rows
// ============================================================================

async fn upsert_order_items(conn: &mut PgConnection, order: &PurchaseOrder) -> AppResult<()> {
    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (
                id, purchase_order_id, position, ingredient_name, supplier_sku,
                quantity_ordered, quantity_received, unit, unit_price, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                supplier_sku = EXCLUDED.supplier_sku,
                quantity_ordered = EXCLUDED.quantity_ordered,
                quantity_received = EXCLUDED.quantity_received,
                unit_price = EXCLUDED.unit_price,
                notes = EXCLUDED.notes
            "#,
        )
        .bind(item.id)
        .bind(order.id)
        .bind(position as i32)
        .bind(&item.ingredient_name)
        .bind(&item.supplier_sku)
        .bind(item.quantity_ordered)
        .bind(item.quantity_received)
        .bind(&item.unit)
        .bind(item.unit_price)
        .bind(&item.notes)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load_order_items(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<PurchaseOrderItem>>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT id, purchase_order_id, ingredient_name, supplier_sku, quantity_ordered,
               quantity_received, unit, unit_price, notes
        FROM purchase_order_items
        WHERE purchase_order_id = ANY($1)
        ORDER BY purchase_order_id, position
        "#,
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<PurchaseOrderItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.purchase_order_id).or_default().push(row.into());
    }
    Ok(grouped)
}

async fn load_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> AppResult<Vec<PurchaseOrder>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut items = load_order_items(conn, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let lines = items.remove(&row.id).unwrap_or_default();
            row.into_order(lines)
        })
        .collect()
}

async fn load_notes(conn: &mut PgConnection, rows: Vec<NoteRow>) -> AppResult<Vec<GoodsReceivedNote>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let item_rows = sqlx::query_as::<_, NoteItemRow>(
        r#"
        SELECT id, goods_received_note_id, purchase_order_item_id, ingredient_name,
               quantity_ordered, quantity_received, unit, unit_price, has_discrepancy,
               discrepancy_notes
        FROM goods_received_items
        WHERE goods_received_note_id = ANY($1)
        ORDER BY goods_received_note_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<GoodsReceivedItem>> = HashMap::new();
    for row in item_rows {
        grouped.entry(row.goods_received_note_id).or_default().push(row.into());
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let lines = grouped.remove(&row.id).unwrap_or_default();
            row.into_note(lines)
        })
        .collect())
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn get_item(&mut self, id: Uuid) -> AppResult<Option<InventoryItem>> {
        let sql = format!("SELECT {} FROM inventory_items WHERE id = $1 FOR UPDATE", ITEM_COLUMNS);
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_item(
        &mut self,
        ingredient_name: &str,
        location_id: Option<Uuid>,
    ) -> AppResult<Option<InventoryItem>> {
        let sql = format!(
            "SELECT {} FROM inventory_items \
             WHERE LOWER(ingredient_name) = LOWER($1) AND location_id IS NOT DISTINCT FROM $2 \
             ORDER BY created_at LIMIT 1 FOR UPDATE",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(ingredient_name)
            .bind(location_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_items(&mut self, location_id: Option<Uuid>) -> AppResult<Vec<InventoryItem>> {
        let sql = format!(
            "SELECT {} FROM inventory_items \
             WHERE ($1::uuid IS NULL OR location_id = $1) \
             ORDER BY ingredient_name, created_at",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(location_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_item(&mut self, item: &InventoryItem) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, ingredient_name, quantity_on_hand, unit, par_level, reorder_point,
                unit_cost, storage_location, location_id, notes, last_updated, created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(item.id)
        .bind(&item.ingredient_name)
        .bind(item.quantity_on_hand)
        .bind(&item.unit)
        .bind(item.par_level)
        .bind(item.reorder_point)
        .bind(item.unit_cost)
        .bind(&item.storage_location)
        .bind(item.location_id)
        .bind(&item.notes)
        .bind(item.last_updated)
        .bind(item.created_at)
        .bind(item.version)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_item(&mut self, item: &mut InventoryItem) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET ingredient_name = $3, quantity_on_hand = $4, unit = $5, par_level = $6,
                reorder_point = $7, unit_cost = $8, storage_location = $9, location_id = $10,
                notes = $11, last_updated = $12, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(item.id)
        .bind(item.version)
        .bind(&item.ingredient_name)
        .bind(item.quantity_on_hand)
        .bind(&item.unit)
        .bind(item.par_level)
        .bind(item.reorder_point)
        .bind(item.unit_cost)
        .bind(&item.storage_location)
        .bind(item.location_id)
        .bind(&item.notes)
        .bind(item.last_updated)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(stale(&mut self.tx, "inventory_items", "Inventory item", item.id).await);
        }
        item.version += 1;
        Ok(())
    }

    async fn delete_item(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_transaction(&mut self, transaction: &InventoryTransaction) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (
                id, inventory_item_id, transaction_type, quantity, unit_cost, "timestamp",
                user_id, notes, reference_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.inventory_item_id)
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.quantity)
        .bind(transaction.unit_cost)
        .bind(transaction.timestamp)
        .bind(&transaction.user_id)
        .bind(&transaction.notes)
        .bind(transaction.reference_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_transaction(&mut self, id: Uuid) -> AppResult<Option<InventoryTransaction>> {
        let sql = format!("SELECT {} FROM inventory_transactions WHERE id = $1", TRANSACTION_COLUMNS);
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> AppResult<Vec<InventoryTransaction>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM inventory_transactions WHERE TRUE",
            TRANSACTION_COLUMNS
        ));
        if let Some(item_id) = filter.inventory_item_id {
            query.push(" AND inventory_item_id = ").push_bind(item_id);
        }
        if !filter.transaction_types.is_empty() {
            let types: Vec<String> = filter
                .transaction_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect();
            query.push(" AND transaction_type = ANY(").push_bind(types).push(")");
        }
        if let Some(range) = filter.range {
            query
                .push(" AND \"timestamp\" BETWEEN ")
                .push_bind(range.start)
                .push(" AND ")
                .push_bind(range.end);
        }
        query.push(" ORDER BY seq");

        let rows = query
            .build_query_as::<TransactionRow>()
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_location(&mut self, location: &Location) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (id, name, location_type, address, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(location.id)
        .bind(&location.name)
        .bind(location.location_type.as_str())
        .bind(&location.address)
        .bind(location.is_active)
        .bind(location.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_location(&mut self, id: Uuid) -> AppResult<Option<Location>> {
        let row = sqlx::query_as::<_, LocationRow>(
            "SELECT id, name, location_type, address, is_active, created_at FROM locations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_locations(&mut self) -> AppResult<Vec<Location>> {
        let rows = sqlx::query_as::<_, LocationRow>(
            "SELECT id, name, location_type, address, is_active, created_at FROM locations ORDER BY name",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_location(&mut self, id: Uuid) -> AppResult<bool> {
        sqlx::query(
            "UPDATE inventory_items SET location_id = NULL, version = version + 1 WHERE location_id = $1",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_transfer(&mut self, transfer: &StockTransfer) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_transfers (
                id, from_location_id, to_location_id, ingredient_name, quantity, unit, status,
                requested_by, approved_by, requested_at, approved_at, completed_at, notes, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.from_location_id)
        .bind(transfer.to_location_id)
        .bind(&transfer.ingredient_name)
        .bind(transfer.quantity)
        .bind(&transfer.unit)
        .bind(transfer.status.as_str())
        .bind(&transfer.requested_by)
        .bind(&transfer.approved_by)
        .bind(transfer.requested_at)
        .bind(transfer.approved_at)
        .bind(transfer.completed_at)
        .bind(&transfer.notes)
        .bind(transfer.version)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_transfer(&mut self, id: Uuid) -> AppResult<Option<StockTransfer>> {
        let sql = format!("SELECT {} FROM stock_transfers WHERE id = $1 FOR UPDATE", TRANSFER_COLUMNS);
        let row = sqlx::query_as::<_, TransferRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_transfer(&mut self, transfer: &mut StockTransfer) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stock_transfers
            SET status = $3, approved_by = $4, approved_at = $5, completed_at = $6, notes = $7,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.version)
        .bind(transfer.status.as_str())
        .bind(&transfer.approved_by)
        .bind(transfer.approved_at)
        .bind(transfer.completed_at)
        .bind(&transfer.notes)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(stale(&mut self.tx, "stock_transfers", "Transfer", transfer.id).await);
        }
        transfer.version += 1;
        Ok(())
    }

    async fn list_transfers(&mut self, status: Option<TransferStatus>) -> AppResult<Vec<StockTransfer>> {
        let sql = format!(
            "SELECT {} FROM stock_transfers WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY requested_at DESC",
            TRANSFER_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransferRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (
                id, name, contact_name, email, phone, address, payment_terms, delivery_schedule,
                rating, is_active, notes, created_at, last_order_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.payment_terms)
        .bind(&supplier.delivery_schedule)
        .bind(supplier.rating)
        .bind(supplier.is_active)
        .bind(&supplier.notes)
        .bind(supplier.created_at)
        .bind(supplier.last_order_date)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_supplier(&mut self, id: Uuid) -> AppResult<Option<Supplier>> {
        let sql = format!("SELECT {} FROM suppliers WHERE id = $1", SUPPLIER_COLUMNS);
        let row = sqlx::query_as::<_, SupplierRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_supplier(&mut self, supplier: &Supplier) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET name = $2, contact_name = $3, email = $4, phone = $5, address = $6,
                payment_terms = $7, delivery_schedule = $8, rating = $9, is_active = $10,
                notes = $11, last_order_date = $12
            WHERE id = $1
            "#,
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_name)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.payment_terms)
        .bind(&supplier.delivery_schedule)
        .bind(supplier.rating)
        .bind(supplier.is_active)
        .bind(&supplier.notes)
        .bind(supplier.last_order_date)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Supplier".to_string()));
        }
        Ok(())
    }

    async fn list_suppliers(&mut self) -> AppResult<Vec<Supplier>> {
        let sql = format!("SELECT {} FROM suppliers ORDER BY name", SUPPLIER_COLUMNS);
        let rows = sqlx::query_as::<_, SupplierRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_supplier(&mut self, id: Uuid) -> AppResult<bool> {
        sqlx::query(
            "UPDATE purchase_orders SET supplier_id = NULL, version = version + 1 WHERE supplier_id = $1",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_supplier_ingredient(&mut self, offer: &SupplierIngredient) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO supplier_ingredients (
                id, supplier_id, ingredient_name, supplier_sku, unit_price, unit, lead_time_days,
                minimum_order_quantity, pack_size, last_price_update, is_preferred, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(offer.id)
        .bind(offer.supplier_id)
        .bind(&offer.ingredient_name)
        .bind(&offer.supplier_sku)
        .bind(offer.unit_price)
        .bind(&offer.unit)
        .bind(offer.lead_time_days)
        .bind(offer.minimum_order_quantity)
        .bind(&offer.pack_size)
        .bind(offer.last_price_update)
        .bind(offer.is_preferred)
        .bind(&offer.notes)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_supplier_ingredient(&mut self, id: Uuid) -> AppResult<Option<SupplierIngredient>> {
        let sql = format!("SELECT {} FROM supplier_ingredients WHERE id = $1 FOR UPDATE", OFFER_COLUMNS);
        let row = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_supplier_ingredient(&mut self, offer: &SupplierIngredient) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE supplier_ingredients
            SET ingredient_name = $2, supplier_sku = $3, unit_price = $4, unit = $5,
                lead_time_days = $6, minimum_order_quantity = $7, pack_size = $8,
                last_price_update = $9, is_preferred = $10, notes = $11
            WHERE id = $1
            "#,
        )
        .bind(offer.id)
        .bind(&offer.ingredient_name)
        .bind(&offer.supplier_sku)
        .bind(offer.unit_price)
        .bind(&offer.unit)
        .bind(offer.lead_time_days)
        .bind(offer.minimum_order_quantity)
        .bind(&offer.pack_size)
        .bind(offer.last_price_update)
        .bind(offer.is_preferred)
        .bind(&offer.notes)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Supplier ingredient".to_string()));
        }
        Ok(())
    }

    async fn list_supplier_ingredients(
        &mut self,
        supplier_id: Option<Uuid>,
    ) -> AppResult<Vec<SupplierIngredient>> {
        let sql = format!(
            "SELECT {} FROM supplier_ingredients WHERE ($1::uuid IS NULL OR supplier_id = $1) \
             ORDER BY ingredient_name",
            OFFER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(supplier_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_price_history(&mut self, history: &PriceHistory) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history (
                id, supplier_ingredient_id, old_price, new_price, change_date, change_percentage, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(history.id)
        .bind(history.supplier_ingredient_id)
        .bind(history.old_price)
        .bind(history.new_price)
        .bind(history.change_date)
        .bind(history.change_percentage)
        .bind(&history.notes)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_price_history(&mut self, supplier_ingredient_id: Uuid) -> AppResult<Vec<PriceHistory>> {
        let rows = sqlx::query_as::<_, PriceHistoryRow>(
            r#"
            SELECT id, supplier_ingredient_id, old_price, new_price, change_date, change_percentage, notes
            FROM price_history
            WHERE supplier_ingredient_id = $1
            ORDER BY seq
            "#,
        )
        .bind(supplier_ingredient_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, po_number, supplier_id, destination_location_id, status, order_date,
                expected_delivery_date, actual_delivery_date, total_cost, shipping_cost, tax_amount,
                notes, created_by, approved_by, approved_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(order.id)
        .bind(&order.po_number)
        .bind(order.supplier_id)
        .bind(order.destination_location_id)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(order.expected_delivery_date)
        .bind(order.actual_delivery_date)
        .bind(order.total_cost)
        .bind(order.shipping_cost)
        .bind(order.tax_amount)
        .bind(&order.notes)
        .bind(&order.created_by)
        .bind(&order.approved_by)
        .bind(order.approved_at)
        .bind(order.version)
        .execute(&mut *self.tx)
        .await?;

        upsert_order_items(&mut self.tx, order).await
    }

    async fn get_purchase_order(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        let sql = format!("SELECT {} FROM purchase_orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => Ok(load_orders(&mut self.tx, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_purchase_order(&mut self, order: &mut PurchaseOrder) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET supplier_id = $3, destination_location_id = $4, status = $5,
                expected_delivery_date = $6, actual_delivery_date = $7, total_cost = $8,
                shipping_cost = $9, tax_amount = $10, notes = $11, approved_by = $12,
                approved_at = $13, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id)
        .bind(order.version)
        .bind(order.supplier_id)
        .bind(order.destination_location_id)
        .bind(order.status.as_str())
        .bind(order.expected_delivery_date)
        .bind(order.actual_delivery_date)
        .bind(order.total_cost)
        .bind(order.shipping_cost)
        .bind(order.tax_amount)
        .bind(&order.notes)
        .bind(&order.approved_by)
        .bind(order.approved_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(stale(&mut self.tx, "purchase_orders", "Purchase order", order.id).await);
        }
        upsert_order_items(&mut self.tx, order).await?;
        order.version += 1;
        Ok(())
    }

    async fn list_purchase_orders(
        &mut self,
        status: Option<PurchaseOrderStatus>,
    ) -> AppResult<Vec<PurchaseOrder>> {
        let sql = format!(
            "SELECT {} FROM purchase_orders WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY order_date DESC",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&mut *self.tx)
            .await?;
        load_orders(&mut self.tx, rows).await
    }

    async fn count_purchase_orders_with_prefix(&mut self, prefix: &str) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM purchase_orders WHERE po_number LIKE $1")
            .bind(format!("{}%", prefix))
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn purchase_order_number_exists(&mut self, po_number: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM purchase_orders WHERE po_number = $1)",
        )
        .bind(po_number)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_goods_received_note(&mut self, note: &GoodsReceivedNote) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO goods_received_notes (
                id, grn_number, purchase_order_id, received_date, received_by, invoice_number,
                delivery_note_number, notes, has_discrepancies, discrepancy_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(note.id)
        .bind(&note.grn_number)
        .bind(note.purchase_order_id)
        .bind(note.received_date)
        .bind(&note.received_by)
        .bind(&note.invoice_number)
        .bind(&note.delivery_note_number)
        .bind(&note.notes)
        .bind(note.has_discrepancies)
        .bind(&note.discrepancy_notes)
        .execute(&mut *self.tx)
        .await?;

        for (position, item) in note.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO goods_received_items (
                    id, goods_received_note_id, position, purchase_order_item_id, ingredient_name,
                    quantity_ordered, quantity_received, unit, unit_price, has_discrepancy,
                    discrepancy_notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id)
            .bind(note.id)
            .bind(position as i32)
            .bind(item.purchase_order_item_id)
            .bind(&item.ingredient_name)
            .bind(item.quantity_ordered)
            .bind(item.quantity_received)
            .bind(&item.unit)
            .bind(item.unit_price)
            .bind(item.has_discrepancy)
            .bind(&item.discrepancy_notes)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn get_goods_received_note(&mut self, id: Uuid) -> AppResult<Option<GoodsReceivedNote>> {
        let sql = format!("SELECT {} FROM goods_received_notes WHERE id = $1", NOTE_COLUMNS);
        let row = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => Ok(load_notes(&mut self.tx, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_goods_received_notes(
        &mut self,
        purchase_order_id: Uuid,
    ) -> AppResult<Vec<GoodsReceivedNote>> {
        let sql = format!(
            "SELECT {} FROM goods_received_notes WHERE purchase_order_id = $1 ORDER BY seq",
            NOTE_COLUMNS
        );
        let rows = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(purchase_order_id)
            .fetch_all(&mut *self.tx)
            .await?;
        load_notes(&mut self.tx, rows).await
    }

    async fn count_goods_received_notes_with_prefix(&mut self, prefix: &str) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM goods_received_notes WHERE grn_number LIKE $1",
        )
        .bind(format!("{}%", prefix))
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn goods_received_note_number_exists(&mut self, grn_number: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM goods_received_notes WHERE grn_number = $1)",
        )
        .bind(grn_number)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_recipe(&mut self, recipe: &Recipe) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recipes (
                id, name, description, course, cuisine, portion_size, category, ingredients,
                selling_price, target_food_cost_percentage, last_cost_calculation,
                total_production_count, last_produced_date, is_active, menu_category, allergens
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(recipe.id)
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(&recipe.course)
        .bind(&recipe.cuisine)
        .bind(&recipe.portion_size)
        .bind(&recipe.category)
        .bind(Json(&recipe.ingredients))
        .bind(recipe.selling_price)
        .bind(recipe.target_food_cost_percentage)
        .bind(recipe.last_cost_calculation)
        .bind(recipe.total_production_count)
        .bind(recipe.last_produced_date)
        .bind(recipe.is_active)
        .bind(&recipe.menu_category)
        .bind(&recipe.allergens)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_recipe(&mut self, id: Uuid) -> AppResult<Option<Recipe>> {
        let sql = format!("SELECT {} FROM recipes WHERE id = $1 FOR UPDATE", RECIPE_COLUMNS);
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_recipe(&mut self, recipe: &Recipe) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE recipes
            SET name = $2, description = $3, course = $4, cuisine = $5, portion_size = $6,
                category = $7, ingredients = $8, selling_price = $9,
                target_food_cost_percentage = $10, last_cost_calculation = $11,
                total_production_count = $12, last_produced_date = $13, is_active = $14,
                menu_category = $15, allergens = $16
            WHERE id = $1
            "#,
        )
        .bind(recipe.id)
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(&recipe.course)
        .bind(&recipe.cuisine)
        .bind(&recipe.portion_size)
        .bind(&recipe.category)
        .bind(Json(&recipe.ingredients))
        .bind(recipe.selling_price)
        .bind(recipe.target_food_cost_percentage)
        .bind(recipe.last_cost_calculation)
        .bind(recipe.total_production_count)
        .bind(recipe.last_produced_date)
        .bind(recipe.is_active)
        .bind(&recipe.menu_category)
        .bind(&recipe.allergens)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Recipe".to_string()));
        }
        Ok(())
    }

    async fn list_recipes(&mut self) -> AppResult<Vec<Recipe>> {
        let sql = format!("SELECT {} FROM recipes ORDER BY name", RECIPE_COLUMNS);
        let rows = sqlx::query_as::<_, RecipeRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_cost_history(&mut self, history: &RecipeCostHistory) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recipe_cost_history (
                id, recipe_id, recipe_name, date, total_cost, portion_cost, selling_price,
                target_food_cost_percentage, actual_food_cost_percentage, ingredient_costs,
                portion_size, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(history.id)
        .bind(history.recipe_id)
        .bind(&history.recipe_name)
        .bind(history.date)
        .bind(history.total_cost)
        .bind(history.portion_cost)
        .bind(history.selling_price)
        .bind(history.target_food_cost_percentage)
        .bind(history.actual_food_cost_percentage)
        .bind(Json(&history.ingredient_costs))
        .bind(&history.portion_size)
        .bind(&history.notes)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_cost_history(&mut self, recipe_id: Option<Uuid>) -> AppResult<Vec<RecipeCostHistory>> {
        let sql = format!(
            "SELECT {} FROM recipe_cost_history WHERE ($1::uuid IS NULL OR recipe_id = $1) ORDER BY seq",
            COST_HISTORY_COLUMNS
        );
        let rows = sqlx::query_as::<_, CostHistoryRow>(&sql)
            .bind(recipe_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_menu_item(&mut self, item: &MenuItem) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO menu_items (
                id, recipe_id, recipe_name, menu_category, selling_price, cost_per_portion,
                target_food_cost_percentage, is_active, popularity, last_sold_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.id)
        .bind(item.recipe_id)
        .bind(&item.recipe_name)
        .bind(&item.menu_category)
        .bind(item.selling_price)
        .bind(item.cost_per_portion)
        .bind(item.target_food_cost_percentage)
        .bind(item.is_active)
        .bind(item.popularity)
        .bind(item.last_sold_date)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_menu_item(&mut self, id: Uuid) -> AppResult<Option<MenuItem>> {
        let sql = format!("SELECT {} FROM menu_items WHERE id = $1 FOR UPDATE", MENU_ITEM_COLUMNS);
        let row = sqlx::query_as::<_, MenuItemRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_menu_item(&mut self, item: &MenuItem) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE menu_items
            SET recipe_name = $2, menu_category = $3, selling_price = $4, cost_per_portion = $5,
                target_food_cost_percentage = $6, is_active = $7, popularity = $8,
                last_sold_date = $9
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(&item.recipe_name)
        .bind(&item.menu_category)
        .bind(item.selling_price)
        .bind(item.cost_per_portion)
        .bind(item.target_food_cost_percentage)
        .bind(item.is_active)
        .bind(item.popularity)
        .bind(item.last_sold_date)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Menu item".to_string()));
        }
        Ok(())
    }

    async fn list_menu_items(&mut self) -> AppResult<Vec<MenuItem>> {
        let sql = format!("SELECT {} FROM menu_items ORDER BY recipe_name", MENU_ITEM_COLUMNS);
        let rows = sqlx::query_as::<_, MenuItemRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_waste_log(&mut self, log: &WasteLog) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO waste_logs (
                id, ingredient_name, inventory_item_id, quantity, unit, waste_category,
                waste_reason, cost_impact, "timestamp", location_id, logged_by, recipe_id, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(log.id)
        .bind(&log.ingredient_name)
        .bind(log.inventory_item_id)
        .bind(log.quantity)
        .bind(&log.unit)
        .bind(log.waste_category.as_str())
        .bind(&log.waste_reason)
        .bind(log.cost_impact)
        .bind(log.timestamp)
        .bind(log.location_id)
        .bind(&log.logged_by)
        .bind(log.recipe_id)
        .bind(&log.notes)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_waste_log(&mut self, id: Uuid) -> AppResult<Option<WasteLog>> {
        let sql = format!("SELECT {} FROM waste_logs WHERE id = $1", WASTE_COLUMNS);
        let row = sqlx::query_as::<_, WasteRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_waste_logs(&mut self, range: Option<DateRange>) -> AppResult<Vec<WasteLog>> {
        let sql = format!(
            "SELECT {} FROM waste_logs \
             WHERE ($1::timestamptz IS NULL OR \"timestamp\" BETWEEN $1 AND $2) ORDER BY seq",
            WASTE_COLUMNS
        );
        let rows = sqlx::query_as::<_, WasteRow>(&sql)
            .bind(range.map(|r| r.start))
            .bind(range.map(|r| r.end))
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_variance_record(&mut self, record: &VarianceRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO variance_records (
                id, ingredient_name, period_start, period_end, theoretical_usage, actual_usage,
                variance, variance_percentage, unit, cost_impact, is_acceptable,
                acceptable_threshold, investigation_notes, root_cause
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id)
        .bind(&record.ingredient_name)
        .bind(record.period_start)
        .bind(record.period_end)
        .bind(record.theoretical_usage)
        .bind(record.actual_usage)
        .bind(record.variance)
        .bind(record.variance_percentage)
        .bind(&record.unit)
        .bind(record.cost_impact)
        .bind(record.is_acceptable)
        .bind(record.acceptable_threshold)
        .bind(&record.investigation_notes)
        .bind(&record.root_cause)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_variance_records(&mut self) -> AppResult<Vec<VarianceRecord>> {
        let sql = format!("SELECT {} FROM variance_records ORDER BY seq", VARIANCE_COLUMNS);
        let rows = sqlx::query_as::<_, VarianceRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_financial_period(&mut self, period: &FinancialPeriod) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO financial_periods (
                id, period_type, start_date, end_date, total_revenue, total_cogs, total_waste_cost,
                total_purchases, opening_inventory_value, closing_inventory_value,
                food_cost_percentage, target_food_cost_percentage, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(period.id)
        .bind(period.period_type.as_str())
        .bind(period.start_date)
        .bind(period.end_date)
        .bind(period.total_revenue)
        .bind(period.total_cogs)
        .bind(period.total_waste_cost)
        .bind(period.total_purchases)
        .bind(period.opening_inventory_value)
        .bind(period.closing_inventory_value)
        .bind(period.food_cost_percentage)
        .bind(period.target_food_cost_percentage)
        .bind(&period.notes)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_financial_periods(&mut self) -> AppResult<Vec<FinancialPeriod>> {
        let sql = format!("SELECT {} FROM financial_periods ORDER BY seq", PERIOD_COLUMNS);
        let rows = sqlx::query_as::<_, PeriodRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_idempotency(
        &mut self,
        key: &str,
        operation: &str,
    ) -> AppResult<Option<IdempotencyRecord>> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            SELECT key, operation, entity_id, created_at
            FROM idempotency_keys
            WHERE key = $1 AND operation = $2
            "#,
        )
        .bind(key)
        .bind(operation)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(record)
    }

    async fn insert_idempotency(&mut self, record: &IdempotencyRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, operation, entity_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&record.key)
        .bind(&record.operation)
        .bind(record.entity_id)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
