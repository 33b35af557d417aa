//! Waste, variance and period close tests

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{dec, item, location, memory};
use kitchen_ledger::config::LedgerPolicy;
use kitchen_ledger::services::analytics::{
    AnalyticsService, ClosePeriodInput, LogWasteInput, RecipeSale, RecordVarianceInput,
};
use kitchen_ledger::services::costing::{CostingService, CreateRecipeInput, IngredientInput};
use kitchen_ledger::services::ledger::{AdjustInput, LedgerService};
use kitchen_ledger::{ErrorKind, Store};
use shared::{DateRange, LocationType, PeriodType, TransactionType, VarianceType, WasteCategory};
use uuid::Uuid;

fn analytics(store: &Arc<dyn Store>) -> AnalyticsService {
    AnalyticsService::new(store.clone(), LedgerPolicy::default())
}

fn around_now() -> DateRange {
    DateRange::new(Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1))
}

fn waste(name: &str, quantity: &str, category: WasteCategory) -> LogWasteInput {
    LogWasteInput {
        ingredient_name: name.to_string(),
        inventory_item_id: None,
        quantity: dec(quantity),
        unit: "kg".to_string(),
        waste_category: category,
        waste_reason: None,
        cost_impact: None,
        location_id: None,
        logged_by: Some("closing chef".to_string()),
        recipe_id: None,
        notes: None,
    }
}

fn movement(item_id: Uuid, quantity: &str, transaction_type: TransactionType, cost: Option<&str>) -> AdjustInput {
    AdjustInput {
        item_id: Some(item_id),
        quantity: dec(quantity),
        transaction_type,
        unit_cost: cost.map(dec),
        notes: None,
        reference_id: None,
        user_id: None,
    }
}

// ============================================================================
// Waste
// ============================================================================

#[tokio::test]
async fn test_linked_waste_leaves_the_ledger() {
    let (_, store) = memory();
    let walk_in = location(&store, "Walk-in", LocationType::Freezer).await;
    let cream = item(&store, "Cream", "L", "10", "4.00", Some(walk_in.id)).await;

    let mut input = waste("Cream", "2.5", WasteCategory::Spoilage);
    input.inventory_item_id = Some(cream.id);
    input.unit = "l".to_string();
    let log = analytics(&store).log_waste(input, None).await.unwrap();

    assert_eq!(log.cost_impact, dec("10"));
    assert_eq!(log.location_id, Some(walk_in.id));

    let ledger = LedgerService::new(store.clone());
    let cream = ledger.get_item(cream.id).await.unwrap();
    assert_eq!(cream.quantity_on_hand, dec("7.5"));

    let wastage = ledger.transactions(cream.id).await.unwrap().pop().unwrap();
    assert_eq!(wastage.transaction_type, TransactionType::Wastage);
    assert_eq!(wastage.quantity, dec("-2.5"));
    assert_eq!(wastage.reference_id, Some(log.id));
    assert_eq!(wastage.user_id.as_deref(), Some("closing chef"));
}

#[tokio::test]
async fn test_unlinked_waste_is_record_only() {
    let (_, store) = memory();
    let service = analytics(&store);

    let log = service
        .log_waste(waste("Bread", "1", WasteCategory::Service), None)
        .await
        .unwrap();
    assert_eq!(log.cost_impact, dec("0"));

    let mut priced = waste("Bread", "2", WasteCategory::Service);
    priced.cost_impact = Some(dec("3.60"));
    let log = service.log_waste(priced, None).await.unwrap();
    assert_eq!(log.cost_impact, dec("3.60"));

    assert_eq!(service.list_waste_logs(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_log_waste_rejects_bad_input() {
    let (_, store) = memory();
    let service = analytics(&store);

    let err = service
        .log_waste(waste("Milk", "0", WasteCategory::ExpiredStock), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut missing = waste("Milk", "1", WasteCategory::ExpiredStock);
    missing.inventory_item_id = Some(Uuid::new_v4());
    let err = service.log_waste(missing, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(service.list_waste_logs(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_log_waste_replay() {
    let (_, store) = memory();
    let herbs = item(&store, "Chives", "bunch", "6", "1.50", None).await;
    let service = analytics(&store);

    let mut input = waste("Chives", "2", WasteCategory::Prep);
    input.inventory_item_id = Some(herbs.id);
    input.unit = "bunch".to_string();
    let first = service.log_waste(input.clone(), Some("waste-77")).await.unwrap();
    let again = service.log_waste(input, Some("waste-77")).await.unwrap();
    assert_eq!(first.id, again.id);

    let herbs = LedgerService::new(store.clone()).get_item(herbs.id).await.unwrap();
    assert_eq!(herbs.quantity_on_hand, dec("4"));
    assert_eq!(service.list_waste_logs(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_log_waste_key_reused_for_other_waste_conflicts() {
    let (_, store) = memory();
    let service = analytics(&store);

    service
        .log_waste(waste("Bread", "1", WasteCategory::Service), Some("waste-80"))
        .await
        .unwrap();
    let err = service
        .log_waste(waste("Fish", "3", WasteCategory::Spoilage), Some("waste-80"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(service.list_waste_logs(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_linked_waste_in_another_unit_is_rejected() {
    let (_, store) = memory();
    let flour = item(&store, "Flour", "kg", "10", "2.00", None).await;
    let service = analytics(&store);

    let mut input = waste("Flour", "500", WasteCategory::Prep);
    input.inventory_item_id = Some(flour.id);
    input.unit = "g".to_string();
    let err = service.log_waste(input, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let ledger = LedgerService::new(store.clone());
    assert_eq!(ledger.get_item(flour.id).await.unwrap().quantity_on_hand, dec("10"));
    assert_eq!(ledger.transactions(flour.id).await.unwrap().len(), 1);
    assert!(service.list_waste_logs(None).await.unwrap().is_empty());

    // Unlinked waste is a free-text record in any unit
    let mut loose = waste("Flour", "500", WasteCategory::Prep);
    loose.unit = "g".to_string();
    service.log_waste(loose, None).await.unwrap();
}

#[tokio::test]
async fn test_log_waste_rejects_oversized_quantity() {
    let (_, store) = memory();
    let service = analytics(&store);

    let mut input = waste("Flour", "1", WasteCategory::Prep);
    input.quantity = rust_decimal::Decimal::MAX;
    assert_eq!(service.log_waste(input, None).await.unwrap_err().kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_waste_totals_by_category() {
    let (_, store) = memory();
    let service = analytics(&store);

    for (name, cost, category) in [
        ("Lettuce", "4.20", WasteCategory::Spoilage),
        ("Tomatoes", "2.80", WasteCategory::Spoilage),
        ("Onion", "0.90", WasteCategory::Prep),
    ] {
        let mut input = waste(name, "1", category);
        input.cost_impact = Some(dec(cost));
        service.log_waste(input, None).await.unwrap();
    }

    let range = around_now();
    assert_eq!(service.waste_total(range).await.unwrap(), dec("7.90"));

    let by_category = service.waste_by_category(range).await.unwrap();
    assert_eq!(by_category.len(), 2);
    assert_eq!(by_category[&WasteCategory::Spoilage], dec("7.00"));
    assert_eq!(by_category[&WasteCategory::Prep], dec("0.90"));
    assert!(!by_category.contains_key(&WasteCategory::Service));

    // Nothing logged in last week's window
    let last_week = DateRange::new(Utc::now() - Duration::days(14), Utc::now() - Duration::days(7));
    assert_eq!(service.waste_total(last_week).await.unwrap(), dec("0"));

    let backwards = DateRange::new(Utc::now(), Utc::now() - Duration::days(1));
    let err = service.waste_total(backwards).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ============================================================================
// Usage and variance
// ============================================================================

#[tokio::test]
async fn test_theoretical_usage_scales_by_portions() {
    let (_, store) = memory();
    let costing = CostingService::new(store.clone());
    let recipe = costing
        .create_recipe(CreateRecipeInput {
            name: "Short Rib".to_string(),
            description: String::new(),
            course: String::new(),
            cuisine: String::new(),
            portion_size: "6 servings".to_string(),
            category: String::new(),
            ingredients: vec![
                IngredientInput {
                    name: "Short Rib".to_string(),
                    quantity: "1.2".to_string(),
                    unit: "kg".to_string(),
                    category: None,
                    cost_per_unit: None,
                    allergens: Vec::new(),
                    notes: None,
                },
                IngredientInput {
                    name: "Salt".to_string(),
                    quantity: "to taste".to_string(),
                    unit: String::new(),
                    category: None,
                    cost_per_unit: None,
                    allergens: Vec::new(),
                    notes: None,
                },
            ],
            selling_price: None,
            target_food_cost_percentage: None,
            menu_category: None,
            allergens: Vec::new(),
        })
        .await
        .unwrap();

    let usage = analytics(&store)
        .theoretical_usage(vec![RecipeSale {
            recipe_id: recipe.id,
            portions_sold: dec("12"),
        }])
        .await
        .unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].ingredient_name, "Short Rib");
    assert_eq!(usage[0].quantity, dec("2.4"));

    let err = analytics(&store)
        .theoretical_usage(vec![RecipeSale {
            recipe_id: Uuid::new_v4(),
            portions_sold: dec("1"),
        }])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_variance_outside_threshold() {
    let (_, store) = memory();
    let flour = item(&store, "Flour", "kg", "200", "2.00", None).await;
    let range = around_now();

    let record = analytics(&store)
        .record_variance(RecordVarianceInput {
            inventory_item_id: flour.id,
            period_start: range.start,
            period_end: range.end,
            theoretical_usage: dec("100"),
            actual_usage: Some(dec("108")),
            investigation_notes: None,
            root_cause: Some("over-portioning".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(record.variance, dec("8"));
    assert_eq!(record.variance_percentage, dec("8"));
    assert_eq!(record.cost_impact, dec("16"));
    assert!(!record.is_acceptable);
    assert_eq!(record.variance_type(), VarianceType::Overuse);
    assert_eq!(analytics(&store).list_variance_records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_variance_measured_from_ledger() {
    let (_, store) = memory();
    let butter = item(&store, "Butter", "kg", "50", "9.00", None).await;
    let ledger = LedgerService::new(store.clone());
    let service = analytics(&store);

    ledger
        .adjust(movement(butter.id, "-12", TransactionType::Usage, None), None)
        .await
        .unwrap();
    // Purchases are not consumption
    ledger
        .adjust(movement(butter.id, "5", TransactionType::Purchase, Some("9.00")), None)
        .await
        .unwrap();
    let mut input = waste("Butter", "3", WasteCategory::Overcooking);
    input.inventory_item_id = Some(butter.id);
    service.log_waste(input, None).await.unwrap();

    let range = around_now();
    assert_eq!(service.actual_usage(butter.id, range).await.unwrap(), dec("15"));

    let record = service
        .record_variance(RecordVarianceInput {
            inventory_item_id: butter.id,
            period_start: range.start,
            period_end: range.end,
            theoretical_usage: dec("15"),
            actual_usage: None,
            investigation_notes: None,
            root_cause: None,
        })
        .await
        .unwrap();
    assert_eq!(record.actual_usage, dec("15"));
    assert!(record.is_acceptable);
    assert_eq!(record.variance_type(), VarianceType::None);

    let err = service.actual_usage(Uuid::new_v4(), range).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// Period close
// ============================================================================

#[tokio::test]
async fn test_close_period_from_ledger() {
    let (_, store) = memory();
    let rice = item(&store, "Rice", "kg", "0", "3.00", None).await;
    LedgerService::new(store.clone())
        .adjust(movement(rice.id, "10", TransactionType::Purchase, Some("3.00")), None)
        .await
        .unwrap();
    let service = analytics(&store);
    let mut spoiled = waste("Greens", "1", WasteCategory::Spoilage);
    spoiled.cost_impact = Some(dec("5"));
    service.log_waste(spoiled, None).await.unwrap();

    let range = around_now();
    let period = service
        .close_period(ClosePeriodInput {
            period_type: PeriodType::Weekly,
            start_date: range.start,
            end_date: range.end,
            total_revenue: dec("200"),
            opening_inventory_value: dec("40"),
            closing_inventory_value: None,
            notes: None,
        })
        .await
        .unwrap();

    assert_eq!(period.total_purchases, dec("30"));
    assert_eq!(period.closing_inventory_value, dec("30"));
    assert_eq!(period.total_cogs, dec("40"));
    assert_eq!(period.total_waste_cost, dec("5"));
    assert_eq!(period.food_cost_percentage, dec("20"));
    assert_eq!(period.target_food_cost_percentage, dec("30"));
    assert!(period.is_on_target());
    assert_eq!(period.gross_profit(), dec("160"));

    assert_eq!(service.list_periods().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_close_period_validation() {
    let (_, store) = memory();
    let service = analytics(&store);

    let err = service
        .close_period(ClosePeriodInput {
            period_type: PeriodType::Daily,
            start_date: Utc::now(),
            end_date: Utc::now() - Duration::days(1),
            total_revenue: dec("100"),
            opening_inventory_value: dec("0"),
            closing_inventory_value: Some(dec("0")),
            notes: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(service.list_periods().await.unwrap().is_empty());
}
