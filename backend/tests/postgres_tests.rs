//! PostgreSQL store tests
//!
//! Ignored by default because they need a running database with permission to
//! run migrations. Run with:
//! `DATABASE_URL=postgres://... cargo test -p kitchen-ledger-backend --test postgres_tests -- --ignored`
//!
//! Every test works on freshly created rows, so a shared database is fine.

mod common;

use std::sync::Arc;

use common::{dec, item_input};
use kitchen_ledger::config::LedgerPolicy;
use kitchen_ledger::services::costing::{CostingService, CreateRecipeInput, IngredientInput, SnapshotInput};
use kitchen_ledger::services::ledger::{AdjustInput, LedgerService};
use kitchen_ledger::services::location::{CreateLocationInput, LocationService};
use kitchen_ledger::services::procurement::{
    ApproveOrderInput, CreateOrderInput, OrderLineInput, ProcurementService, ReceiveInput,
};
use kitchen_ledger::store::IdempotencyRecord;
use kitchen_ledger::{ErrorKind, PgStore, Store};
use shared::{LocationType, PurchaseOrderStatus, ReceiptLine, TransactionType};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn pg() -> Arc<dyn Store> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect to postgres");
    let store = PgStore::from_pool(pool);
    store.migrate().await.expect("run migrations");
    Arc::new(store)
}

fn unique(name: &str) -> String {
    format!("{} {}", name, Uuid::new_v4().simple())
}

fn usage(item_id: Uuid, quantity: &str) -> AdjustInput {
    AdjustInput {
        item_id: Some(item_id),
        quantity: dec(quantity),
        transaction_type: TransactionType::Usage,
        unit_cost: None,
        notes: None,
        reference_id: None,
        user_id: None,
    }
}

// ============================================================================
// Ledger rows
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_pg_adjust_keeps_balance_and_ledger_in_step() {
    let store = pg().await;
    let ledger = LedgerService::new(store.clone());

    let flour = ledger
        .create_item(item_input(&unique("Flour"), "kg", "25", "1.20", None), None)
        .await
        .unwrap();
    ledger.adjust(usage(flour.id, "-4.5"), None).await.unwrap();

    let stored = ledger.get_item(flour.id).await.unwrap();
    assert_eq!(stored.quantity_on_hand, dec("20.5"));
    assert_eq!(stored.unit_cost, dec("1.20"));
    assert!(stored.version > flour.version);

    let check = ledger.verify_ledger(flour.id).await.unwrap();
    assert!(check.consistent);
    assert_eq!(check.transaction_count, 2);
}

#[tokio::test]
#[ignore]
async fn test_pg_concurrent_adjustments_serialize_on_the_item_row() {
    let store = pg().await;
    let ledger = LedgerService::new(store.clone());
    let eggs = ledger
        .create_item(item_input(&unique("Eggs"), "each", "30", "0.25", None), None)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let ledger = ledger.clone();
        tasks.push(tokio::spawn(async move { ledger.adjust(usage(eggs.id, "-2"), None).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let eggs = ledger.get_item(eggs.id).await.unwrap();
    assert_eq!(eggs.quantity_on_hand, dec("6"));
    let check = ledger.verify_ledger(eggs.id).await.unwrap();
    assert!(check.consistent);
    assert_eq!(check.transaction_count, 13);
}

#[tokio::test]
#[ignore]
async fn test_pg_stale_version_is_a_conflict() {
    let store = pg().await;
    let ledger = LedgerService::new(store.clone());
    let cream = ledger
        .create_item(item_input(&unique("Cream"), "l", "6", "3", None), None)
        .await
        .unwrap();

    let mut uow = store.begin().await.unwrap();
    let mut fresh = uow.get_item(cream.id).await.unwrap().unwrap();
    fresh.notes = Some("moved to walk-in".to_string());
    uow.update_item(&mut fresh).await.unwrap();
    uow.commit().await.unwrap();

    let mut stale = cream.clone();
    let mut uow = store.begin().await.unwrap();
    let err = uow.update_item(&mut stale).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    drop(uow);

    let stored = ledger.get_item(cream.id).await.unwrap();
    assert_eq!(stored.notes.as_deref(), Some("moved to walk-in"));
}

#[tokio::test]
#[ignore]
async fn test_pg_dropped_unit_of_work_rolls_back() {
    let store = pg().await;
    let ledger = LedgerService::new(store.clone());
    let salt = ledger
        .create_item(item_input(&unique("Salt"), "kg", "5", "0.50", None), None)
        .await
        .unwrap();

    {
        let mut uow = store.begin().await.unwrap();
        let mut item = uow.get_item(salt.id).await.unwrap().unwrap();
        item.quantity_on_hand = dec("999");
        uow.update_item(&mut item).await.unwrap();
    }

    assert_eq!(ledger.get_item(salt.id).await.unwrap().quantity_on_hand, dec("5"));
}

// ============================================================================
// Idempotency rows
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_pg_idempotency_replay_and_reuse() {
    let store = pg().await;
    let ledger = LedgerService::new(store.clone());
    let key = Uuid::new_v4().to_string();
    let sugar = ledger
        .create_item(item_input(&unique("Sugar"), "kg", "10", "1", None), None)
        .await
        .unwrap();
    let rice = ledger
        .create_item(item_input(&unique("Rice"), "kg", "10", "1", None), None)
        .await
        .unwrap();

    let first = ledger.adjust(usage(sugar.id, "-2"), Some(&key)).await.unwrap();
    let replay = ledger.adjust(usage(sugar.id, "-2"), Some(&key)).await.unwrap();
    assert_eq!(first.id, replay.id);
    assert_eq!(ledger.get_item(sugar.id).await.unwrap().quantity_on_hand, dec("8"));

    let err = ledger.adjust(usage(rice.id, "-3"), Some(&key)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(ledger.get_item(rice.id).await.unwrap().quantity_on_hand, dec("10"));
}

#[tokio::test]
#[ignore]
async fn test_pg_duplicate_idempotency_row_is_a_conflict() {
    let store = pg().await;
    let record = IdempotencyRecord::new(Uuid::new_v4().to_string(), "ledger.adjust", Uuid::new_v4());

    let mut uow = store.begin().await.unwrap();
    uow.insert_idempotency(&record).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let found = uow
        .find_idempotency(&record.key, &record.operation)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.entity_id, record.entity_id);

    let err = uow.insert_idempotency(&record).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// ============================================================================
// Aggregates
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_pg_goods_receipt_round_trip() {
    let store = pg().await;
    let procurement = ProcurementService::new(store.clone(), LedgerPolicy::default());
    let ledger = LedgerService::new(store.clone());
    let cold_room = LocationService::new(store.clone())
        .create(CreateLocationInput {
            name: unique("Cold Room"),
            location_type: LocationType::Freezer,
            address: None,
        })
        .await
        .unwrap();

    let order = procurement
        .create_order(
            CreateOrderInput {
                supplier_id: None,
                destination_location_id: Some(cold_room.id),
                expected_delivery_date: None,
                shipping_cost: dec("5"),
                tax_amount: dec("0"),
                notes: None,
                created_by: None,
                items: vec![OrderLineInput {
                    ingredient_name: "Tomatoes".to_string(),
                    supplier_sku: None,
                    quantity_ordered: dec("10"),
                    unit: "kg".to_string(),
                    unit_price: dec("3.20"),
                    notes: None,
                }],
            },
            None,
        )
        .await
        .unwrap();
    procurement.submit(order.id, None).await.unwrap();
    procurement
        .approve(order.id, ApproveOrderInput { approved_by: "owner".to_string() }, None)
        .await
        .unwrap();
    procurement.mark_as_ordered(order.id, None).await.unwrap();

    let note = procurement
        .receive(
            order.id,
            ReceiveInput {
                lines: vec![ReceiptLine {
                    purchase_order_item_id: order.items[0].id,
                    quantity_received: dec("6"),
                    discrepancy_notes: None,
                }],
                received_by: None,
                invoice_number: None,
                delivery_note_number: None,
                notes: None,
                discrepancy_notes: None,
            },
            None,
        )
        .await
        .unwrap();

    let stored = procurement.get(order.id).await.unwrap();
    assert_eq!(stored.status, PurchaseOrderStatus::PartiallyReceived);
    assert_eq!(stored.items[0].quantity_received, dec("6"));
    assert_eq!(stored.total_cost, dec("32.00"));

    let receipts = procurement.receipts(order.id).await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].id, note.id);
    assert_eq!(receipts[0].grn_number, note.grn_number);
    assert_eq!(receipts[0].items, note.items);

    let tomatoes = ledger.list_items(Some(cold_room.id)).await.unwrap();
    assert_eq!(tomatoes.len(), 1);
    assert_eq!(tomatoes[0].quantity_on_hand, dec("6"));
}

#[tokio::test]
#[ignore]
async fn test_pg_recipe_ingredients_and_snapshots_round_trip() {
    let store = pg().await;
    let costing = CostingService::new(store.clone());

    let recipe = costing
        .create_recipe(CreateRecipeInput {
            name: unique("Short Rib"),
            description: String::new(),
            course: "main".to_string(),
            cuisine: "french".to_string(),
            portion_size: "6 servings".to_string(),
            category: String::new(),
            ingredients: vec![IngredientInput {
                name: "Short Rib".to_string(),
                quantity: "1.5".to_string(),
                unit: "kg".to_string(),
                category: None,
                cost_per_unit: Some(dec("12.00")),
                allergens: vec!["sulphites".to_string()],
                notes: None,
            }],
            selling_price: Some(dec("10")),
            target_food_cost_percentage: None,
            menu_category: None,
            allergens: Vec::new(),
        })
        .await
        .unwrap();

    let stored = costing.get_recipe(recipe.id).await.unwrap();
    assert_eq!(stored.ingredients, recipe.ingredients);
    assert_eq!(stored.total_cost(), dec("18.00"));

    let snapshot = costing
        .snapshot(recipe.id, SnapshotInput { notes: Some("menu launch".to_string()) })
        .await
        .unwrap();
    let trend = costing.cost_trend(recipe.id).await.unwrap();
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].ingredient_costs, snapshot.ingredient_costs);
    assert_eq!(trend[0].total_cost, dec("18.00"));
}
