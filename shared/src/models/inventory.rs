//! Inventory ledger models
//!
//! An [`InventoryItem`] holds the current stock state of one ingredient at one
//! storage context. Every quantity change is recorded as an immutable
//! [`InventoryTransaction`]; the item's `quantity_on_hand` is always the sum of
//! its transaction quantities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default par level for new items
pub const DEFAULT_PAR_LEVEL: i64 = 10;
/// Default reorder point for new items
pub const DEFAULT_REORDER_POINT: i64 = 5;

/// Kinds of ledger movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Usage,
    Transfer,
    Wastage,
    Adjustment,
    /// Used in recipe production
    Production,
    Return,
}

/// Conventional sign of a transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl TransactionType {
    pub const ALL: [TransactionType; 7] = [
        TransactionType::Purchase,
        TransactionType::Usage,
        TransactionType::Transfer,
        TransactionType::Wastage,
        TransactionType::Adjustment,
        TransactionType::Production,
        TransactionType::Return,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Usage => "usage",
            TransactionType::Transfer => "transfer",
            TransactionType::Wastage => "wastage",
            TransactionType::Adjustment => "adjustment",
            TransactionType::Production => "production",
            TransactionType::Return => "return",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Direction callers conventionally use when entering a magnitude.
    ///
    /// The ledger itself accepts either sign for every type.
    pub fn default_direction(&self) -> Direction {
        match self {
            TransactionType::Usage | TransactionType::Wastage | TransactionType::Transfer => {
                Direction::Outbound
            }
            _ => Direction::Inbound,
        }
    }

    /// Apply the conventional direction to a magnitude
    pub fn signed(&self, magnitude: Decimal) -> Decimal {
        match self.default_direction() {
            Direction::Inbound => magnitude.abs(),
            Direction::Outbound => -magnitude.abs(),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock status, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    BelowPar,
    InStock,
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockStatus::OutOfStock => write!(f, "Out of Stock"),
            StockStatus::LowStock => write!(f, "Low Stock"),
            StockStatus::BelowPar => write!(f, "Below Par"),
            StockStatus::InStock => write!(f, "In Stock"),
        }
    }
}

/// Current stock state of one ingredient at a storage context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub ingredient_name: String,
    pub quantity_on_hand: Decimal,
    pub unit: String,
    /// Ideal on-hand quantity
    pub par_level: Decimal,
    pub reorder_point: Decimal,
    pub unit_cost: Decimal,
    /// Free-text spot within the location, e.g. "Shelf A3"
    pub storage_location: Option<String>,
    pub location_id: Option<Uuid>,
    pub notes: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every update
    pub version: i64,
}

impl InventoryItem {
    /// New empty item with the default par level and reorder point
    pub fn new(ingredient_name: impl Into<String>, unit: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ingredient_name: ingredient_name.into(),
            quantity_on_hand: Decimal::ZERO,
            unit: unit.into(),
            par_level: Decimal::from(DEFAULT_PAR_LEVEL),
            reorder_point: Decimal::from(DEFAULT_REORDER_POINT),
            unit_cost: Decimal::ZERO,
            storage_location: None,
            location_id: None,
            notes: None,
            last_updated: now,
            created_at: now,
            version: 0,
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity_on_hand <= self.reorder_point
    }

    pub fn is_below_par(&self) -> bool {
        self.quantity_on_hand < self.par_level
    }

    pub fn stock_status(&self) -> StockStatus {
        if self.quantity_on_hand <= Decimal::ZERO {
            StockStatus::OutOfStock
        } else if self.is_low_stock() {
            StockStatus::LowStock
        } else if self.is_below_par() {
            StockStatus::BelowPar
        } else {
            StockStatus::InStock
        }
    }

    pub fn total_value(&self) -> Decimal {
        self.quantity_on_hand * self.unit_cost
    }

    /// Build the ledger entry for a signed movement and apply it to this item.
    ///
    /// A purchase at a new price becomes the item's unit cost. The returned
    /// transaction must be persisted in the same unit of work as the updated
    /// item.
    pub fn record(&mut self, entry: LedgerEntry) -> InventoryTransaction {
        let transaction = InventoryTransaction {
            id: Uuid::new_v4(),
            inventory_item_id: self.id,
            transaction_type: entry.transaction_type,
            quantity: entry.quantity,
            unit_cost: entry.unit_cost.unwrap_or(self.unit_cost),
            timestamp: Utc::now(),
            user_id: entry.user_id,
            notes: entry.notes,
            reference_id: entry.reference_id,
        };
        self.apply(&transaction);
        if transaction.transaction_type == TransactionType::Purchase {
            self.unit_cost = transaction.unit_cost;
        }
        transaction
    }

    /// Apply an already-built transaction to the running balance
    pub fn apply(&mut self, transaction: &InventoryTransaction) {
        self.quantity_on_hand += transaction.quantity;
        self.last_updated = transaction.timestamp;
    }
}

/// Fields of a ledger movement before it is bound to an item
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub transaction_type: TransactionType,
    /// Signed quantity: positive adds stock, negative removes it
    pub quantity: Decimal,
    /// Falls back to the item's current unit cost
    pub unit_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub reference_id: Option<Uuid>,
    pub user_id: Option<String>,
}

impl LedgerEntry {
    pub fn new(transaction_type: TransactionType, quantity: Decimal) -> Self {
        Self {
            transaction_type,
            quantity,
            unit_cost: None,
            notes: None,
            reference_id: None,
            user_id: None,
        }
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }
}

/// One immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub inventory_item_id: Uuid,
    pub transaction_type: TransactionType,
    /// Positive for additions, negative for subtractions
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub notes: Option<String>,
    /// Purchase order, transfer, waste log, etc.
    pub reference_id: Option<Uuid>,
}

impl InventoryTransaction {
    pub fn total_cost(&self) -> Decimal {
        self.quantity.abs() * self.unit_cost
    }
}

/// Sum of transaction quantities, i.e. the balance the ledger implies
pub fn ledger_balance(transactions: &[InventoryTransaction]) -> Decimal {
    transactions.iter().map(|t| t.quantity).sum()
}

/// Items at or below their reorder point, lowest quantity first
pub fn low_stock_items(items: &[InventoryItem]) -> Vec<InventoryItem> {
    let mut low: Vec<InventoryItem> = items.iter().filter(|i| i.is_low_stock()).cloned().collect();
    low.sort_by(|a, b| a.quantity_on_hand.cmp(&b.quantity_on_hand));
    low
}

/// Total stock value across items
pub fn total_inventory_value(items: &[InventoryItem]) -> Decimal {
    items.iter().map(InventoryItem::total_value).sum()
}

/// Severity of a low-stock alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Out of stock
    Critical,
    /// At or below reorder point
    High,
    /// Below par
    Medium,
}

/// Replenishment alert for one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub inventory_item_id: Uuid,
    pub ingredient_name: String,
    pub current_quantity: Decimal,
    pub reorder_point: Decimal,
    pub par_level: Decimal,
    pub unit: String,
    pub location: String,
    pub severity: AlertSeverity,
}

impl LowStockAlert {
    /// Alert for an item that needs replenishment, `None` when in stock
    pub fn for_item(item: &InventoryItem, location: impl Into<String>) -> Option<Self> {
        let severity = match item.stock_status() {
            StockStatus::OutOfStock => AlertSeverity::Critical,
            StockStatus::LowStock => AlertSeverity::High,
            StockStatus::BelowPar => AlertSeverity::Medium,
            StockStatus::InStock => return None,
        };

        Some(Self {
            inventory_item_id: item.id,
            ingredient_name: item.ingredient_name.clone(),
            current_quantity: item.quantity_on_hand,
            reorder_point: item.reorder_point,
            par_level: item.par_level,
            unit: item.unit.clone(),
            location: location.into(),
            severity,
        })
    }
}
