//! Ledger core tests
//!
//! Items, signed adjustments, low-stock queries and valuation over the
//! in-memory store.

mod common;

use common::{dec, item, item_input, location, memory};
use kitchen_ledger::services::ledger::{AdjustInput, LedgerService, UpdateItemInput};
use kitchen_ledger::services::location::LocationService;
use kitchen_ledger::ErrorKind;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{AlertSeverity, LocationType, StockStatus, TransactionType};
use uuid::Uuid;

fn adjustment(item_id: Uuid, quantity: &str, transaction_type: TransactionType) -> AdjustInput {
    AdjustInput {
        item_id: Some(item_id),
        quantity: dec(quantity),
        transaction_type,
        unit_cost: None,
        notes: None,
        reference_id: None,
        user_id: None,
    }
}

// ============================================================================
// Items
// ============================================================================

#[tokio::test]
async fn test_opening_balance_is_a_ledger_entry() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());

    let flour = item(&store, "Flour", "kg", "25", "1.20", None).await;
    assert_eq!(flour.quantity_on_hand, dec("25"));
    assert_eq!(flour.stock_status(), StockStatus::InStock);

    let transactions = service.transactions(flour.id).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].transaction_type, TransactionType::Adjustment);
    assert_eq!(transactions[0].notes.as_deref(), Some("Opening balance"));

    let check = service.verify_ledger(flour.id).await.unwrap();
    assert!(check.consistent);
    assert_eq!(check.ledger_balance, dec("25"));
}

#[tokio::test]
async fn test_empty_item_has_no_transactions() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());

    let salt = item(&store, "Salt", "kg", "0", "0.50", None).await;
    assert!(service.transactions(salt.id).await.unwrap().is_empty());
    assert_eq!(salt.stock_status(), StockStatus::OutOfStock);
}

#[tokio::test]
async fn test_create_item_rejects_unknown_location() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());

    let err = service
        .create_item(item_input("Milk", "l", "5", "1", Some(Uuid::new_v4())), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(service.list_items(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_item_replay_returns_original() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());

    let first = service
        .create_item(item_input("Butter", "kg", "4", "8", None), Some("create-butter"))
        .await
        .unwrap();
    let second = service
        .create_item(item_input("Butter", "kg", "4", "8", None), Some("create-butter"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(service.list_items(None).await.unwrap().len(), 1);
    assert_eq!(service.transactions(first.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_item_key_reused_for_other_item_conflicts() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());

    service
        .create_item(item_input("Butter", "kg", "4", "8", None), Some("create-1"))
        .await
        .unwrap();
    let err = service
        .create_item(item_input("Lard", "kg", "2", "5", None), Some("create-1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    let items = service.list_items(None).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].ingredient_name, "Butter");
}

#[tokio::test]
async fn test_create_item_rejects_oversized_values() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());

    let err = service
        .create_item(item_input("Flour", "kg", &Decimal::MAX.to_string(), "1", None), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .create_item(item_input("Flour", "kg", "1", &Decimal::MAX.to_string(), None), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(service.list_items(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_item_changes_settings_only() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let cream = item(&store, "Cream", "l", "6", "3.00", None).await;

    let updated = service
        .update_item(
            cream.id,
            UpdateItemInput {
                reorder_point: Some(dec("6")),
                par_level: Some(dec("12")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.quantity_on_hand, dec("6"));
    assert!(updated.is_low_stock());
    assert!(updated.version > cream.version);
}

// ============================================================================
// Adjustments
// ============================================================================

#[tokio::test]
async fn test_adjust_updates_balance_and_appends() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let eggs = item(&store, "Eggs", "each", "60", "0.25", None).await;

    let usage = service
        .adjust(adjustment(eggs.id, "-18", TransactionType::Usage), None)
        .await
        .unwrap();
    assert_eq!(usage.quantity, dec("-18"));
    assert_eq!(usage.unit_cost, dec("0.25"));
    assert_eq!(usage.total_cost(), dec("4.50"));

    let eggs = service.get_item(eggs.id).await.unwrap();
    assert_eq!(eggs.quantity_on_hand, dec("42"));
    assert_eq!(service.transactions(eggs.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_negative_balance_is_allowed() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let lemons = item(&store, "Lemons", "each", "3", "0.40", None).await;

    service
        .adjust(adjustment(lemons.id, "-5", TransactionType::Usage), None)
        .await
        .unwrap();

    let lemons = service.get_item(lemons.id).await.unwrap();
    assert_eq!(lemons.quantity_on_hand, dec("-2"));
    assert_eq!(lemons.stock_status(), StockStatus::OutOfStock);
    assert!(service.verify_ledger(lemons.id).await.unwrap().consistent);
}

#[tokio::test]
async fn test_purchase_at_new_price_updates_unit_cost() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let oil = item(&store, "Olive Oil", "l", "2", "9.00", None).await;

    let mut purchase = adjustment(oil.id, "10", TransactionType::Purchase);
    purchase.unit_cost = Some(dec("9.80"));
    service.adjust(purchase, None).await.unwrap();

    let oil = service.get_item(oil.id).await.unwrap();
    assert_eq!(oil.unit_cost, dec("9.80"));
    assert_eq!(oil.quantity_on_hand, dec("12"));

    // Other movement types keep the cost basis
    let mut usage = adjustment(oil.id, "-1", TransactionType::Usage);
    usage.unit_cost = Some(dec("1.00"));
    service.adjust(usage, None).await.unwrap();
    assert_eq!(service.get_item(oil.id).await.unwrap().unit_cost, dec("9.80"));
}

#[tokio::test]
async fn test_adjust_validation() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let rice = item(&store, "Rice", "kg", "10", "2", None).await;

    let err = service
        .adjust(adjustment(rice.id, "0", TransactionType::Adjustment), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut missing = adjustment(rice.id, "1", TransactionType::Adjustment);
    missing.item_id = None;
    let err = service.adjust(missing, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .adjust(adjustment(Uuid::new_v4(), "1", TransactionType::Adjustment), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(service.get_item(rice.id).await.unwrap().quantity_on_hand, dec("10"));
}

#[tokio::test]
async fn test_adjust_replay_does_not_duplicate() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let sugar = item(&store, "Sugar", "kg", "10", "1", None).await;

    let first = service
        .adjust(adjustment(sugar.id, "-2", TransactionType::Usage), Some("usage-1"))
        .await
        .unwrap();
    let replay = service
        .adjust(adjustment(sugar.id, "-2", TransactionType::Usage), Some("usage-1"))
        .await
        .unwrap();

    assert_eq!(first.id, replay.id);
    assert_eq!(service.get_item(sugar.id).await.unwrap().quantity_on_hand, dec("8"));
    assert_eq!(service.transactions(sugar.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_adjust_key_reused_on_other_item_conflicts() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let flour = item(&store, "Flour", "kg", "10", "1", None).await;
    let sugar = item(&store, "Sugar", "kg", "10", "1", None).await;

    service
        .adjust(adjustment(flour.id, "-2", TransactionType::Usage), Some("k1"))
        .await
        .unwrap();
    let err = service
        .adjust(adjustment(sugar.id, "-3", TransactionType::Usage), Some("k1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(service.get_item(flour.id).await.unwrap().quantity_on_hand, dec("8"));
    assert_eq!(service.get_item(sugar.id).await.unwrap().quantity_on_hand, dec("10"));
    assert_eq!(service.transactions(sugar.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_adjust_rejects_quantities_beyond_bound() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let flour = item(&store, "Flour", "kg", "10", "1", None).await;

    for _ in 0..2 {
        let mut input = adjustment(flour.id, "1", TransactionType::Purchase);
        input.quantity = Decimal::MAX;
        let err = service.adjust(input, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    let mut input = adjustment(flour.id, "1", TransactionType::Usage);
    input.quantity = Decimal::MIN;
    assert_eq!(service.adjust(input, None).await.unwrap_err().kind(), ErrorKind::Validation);

    let mut input = adjustment(flour.id, "1", TransactionType::Purchase);
    input.unit_cost = Some(Decimal::MAX);
    assert_eq!(service.adjust(input, None).await.unwrap_err().kind(), ErrorKind::Validation);

    // The bound itself is accepted
    let mut input = adjustment(flour.id, "1", TransactionType::Purchase);
    input.quantity = shared::MAX_QUANTITY;
    input.unit_cost = Some(shared::MAX_AMOUNT);
    service.adjust(input, None).await.unwrap();

    let flour = service.get_item(flour.id).await.unwrap();
    assert_eq!(flour.quantity_on_hand, shared::MAX_QUANTITY + dec("10"));
    assert!(service.verify_ledger(flour.id).await.unwrap().consistent);
}

#[tokio::test]
async fn test_failed_commit_leaves_no_effect() {
    let (memory, store) = memory();
    let service = LedgerService::new(store.clone());
    let stock = item(&store, "Veal Stock", "l", "8", "4", None).await;

    memory.fail_next_commit();
    let err = service
        .adjust(adjustment(stock.id, "-3", TransactionType::Usage), Some("stock-usage"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);

    assert_eq!(service.get_item(stock.id).await.unwrap().quantity_on_hand, dec("8"));
    assert_eq!(service.transactions(stock.id).await.unwrap().len(), 1);

    // The key was not consumed, so a retry applies
    service
        .adjust(adjustment(stock.id, "-3", TransactionType::Usage), Some("stock-usage"))
        .await
        .unwrap();
    assert_eq!(service.get_item(stock.id).await.unwrap().quantity_on_hand, dec("5"));
}

// ============================================================================
// Stock levels & valuation
// ============================================================================

#[tokio::test]
async fn test_low_stock_boundary_is_inclusive() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());

    // Default reorder point is 5
    let at_point = item(&store, "Thyme", "bunch", "5", "1", None).await;
    let below = item(&store, "Basil", "bunch", "2", "1", None).await;
    let above = item(&store, "Parsley", "bunch", "6", "1", None).await;

    let low = service.low_stock_items(None).await.unwrap();
    let ids: Vec<Uuid> = low.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![below.id, at_point.id]);
    assert!(!ids.contains(&above.id));
}

#[tokio::test]
async fn test_low_stock_alerts_carry_severity_and_location() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let walk_in = location(&store, "Walk-in", LocationType::Storage).await;

    item(&store, "Shallots", "kg", "0", "3", Some(walk_in.id)).await;
    item(&store, "Garlic", "kg", "4", "3", None).await;
    item(&store, "Onions", "kg", "8", "1", Some(walk_in.id)).await;
    item(&store, "Potatoes", "kg", "40", "1", Some(walk_in.id)).await;

    let alerts = service.low_stock_alerts().await.unwrap();
    let summary: Vec<(&str, AlertSeverity, &str)> = alerts
        .iter()
        .map(|a| (a.ingredient_name.as_str(), a.severity, a.location.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Shallots", AlertSeverity::Critical, "Walk-in"),
            ("Garlic", AlertSeverity::High, "Unassigned"),
            ("Onions", AlertSeverity::Medium, "Walk-in"),
        ]
    );
}

#[tokio::test]
async fn test_valuation_by_location() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let kitchen = location(&store, "Main Kitchen", LocationType::Kitchen).await;
    let freezer = location(&store, "Freezer", LocationType::Freezer).await;

    item(&store, "Chicken Thigh", "kg", "10", "6.50", Some(freezer.id)).await;
    item(&store, "Shrimp", "kg", "4", "18", Some(freezer.id)).await;
    item(&store, "Butter", "kg", "3", "8", Some(kitchen.id)).await;
    item(&store, "Vinegar", "l", "2", "2.50", None).await;

    assert_eq!(service.total_value().await.unwrap(), dec("166"));

    let valuations = service.valuation_by_location().await.unwrap();
    let freezer_value = valuations
        .iter()
        .find(|v| v.location_id == Some(freezer.id))
        .unwrap();
    assert_eq!(freezer_value.item_count, 2);
    assert_eq!(freezer_value.total_value, dec("137"));

    let unassigned = valuations.last().unwrap();
    assert_eq!(unassigned.location_id, None);
    assert_eq!(unassigned.total_value, dec("5"));
}

#[tokio::test]
async fn test_deleting_location_unassigns_items() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let pantry = location(&store, "Pantry", LocationType::DryStorage).await;
    let pasta = item(&store, "Pasta", "kg", "12", "2", Some(pantry.id)).await;

    LocationService::new(store.clone()).delete(pantry.id).await.unwrap();

    let pasta = service.get_item(pasta.id).await.unwrap();
    assert_eq!(pasta.location_id, None);
    assert_eq!(pasta.quantity_on_hand, dec("12"));
}

#[tokio::test]
async fn test_delete_item_removes_its_ledger() {
    let (_, store) = memory();
    let service = LedgerService::new(store.clone());
    let capers = item(&store, "Capers", "jar", "3", "4", None).await;

    service.delete_item(capers.id).await.unwrap();
    assert_eq!(service.get_item(capers.id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.delete_item(capers.id).await.unwrap_err().kind(), ErrorKind::NotFound);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn movement() -> impl Strategy<Value = (i64, TransactionType)> {
    let kinds = prop_oneof![
        Just(TransactionType::Purchase),
        Just(TransactionType::Usage),
        Just(TransactionType::Wastage),
        Just(TransactionType::Adjustment),
        Just(TransactionType::Return),
    ];
    ((-5000i64..5000).prop_filter("non-zero", |q| *q != 0), kinds)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The stored balance always equals the sum of the item's transactions
    #[test]
    fn prop_balance_matches_ledger(
        opening in 0i64..1000,
        movements in prop::collection::vec(movement(), 1..20),
    ) {
        tokio_test::block_on(async {
            let (_, store) = memory();
            let service = LedgerService::new(store.clone());
            let item = item(&store, "Flour", "kg", &opening.to_string(), "1", None).await;

            let mut expected = Decimal::from(opening);
            for (hundredths, kind) in &movements {
                let quantity = Decimal::new(*hundredths, 2);
                expected += quantity;
                let mut input = adjustment(item.id, "1", *kind);
                input.quantity = quantity;
                service.adjust(input, None).await.unwrap();
            }

            let check = service.verify_ledger(item.id).await.unwrap();
            prop_assert!(check.consistent);
            prop_assert_eq!(check.quantity_on_hand, expected);
            prop_assert_eq!(check.transaction_count, movements.len() + usize::from(opening != 0));
            Ok(())
        })?;
    }
}
