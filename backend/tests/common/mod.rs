//! Fixtures shared by the service tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use kitchen_ledger::services::ledger::{CreateItemInput, LedgerService};
use kitchen_ledger::services::location::{CreateLocationInput, LocationService};
use kitchen_ledger::{MemoryStore, Store};
use rust_decimal::Decimal;
use shared::{InventoryItem, Location, LocationType};
use uuid::Uuid;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A fresh in-memory store, plus a trait-object handle sharing its state
pub fn memory() -> (MemoryStore, Arc<dyn Store>) {
    let memory = MemoryStore::new();
    let store: Arc<dyn Store> = Arc::new(memory.clone());
    (memory, store)
}

pub async fn location(store: &Arc<dyn Store>, name: &str, location_type: LocationType) -> Location {
    LocationService::new(store.clone())
        .create(CreateLocationInput {
            name: name.to_string(),
            location_type,
            address: None,
        })
        .await
        .unwrap()
}

pub fn item_input(name: &str, unit: &str, opening: &str, cost: &str, location_id: Option<Uuid>) -> CreateItemInput {
    CreateItemInput {
        ingredient_name: name.to_string(),
        unit: unit.to_string(),
        opening_quantity: dec(opening),
        par_level: None,
        reorder_point: None,
        unit_cost: dec(cost),
        storage_location: None,
        location_id,
        notes: None,
    }
}

pub async fn item(
    store: &Arc<dyn Store>,
    name: &str,
    unit: &str,
    opening: &str,
    cost: &str,
    location_id: Option<Uuid>,
) -> InventoryItem {
    LedgerService::new(store.clone())
        .create_item(item_input(name, unit, opening, cost, location_id), None)
        .await
        .unwrap()
}
