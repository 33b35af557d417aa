//! Recipe costing and menu engineering tests

mod common;

use common::{dec, item, memory};
use kitchen_ledger::services::costing::{
    AddMenuItemInput, CostingService, CountInput, CreateRecipeInput, IngredientInput, PricingInput,
    SnapshotInput,
};
use kitchen_ledger::ErrorKind;
use shared::{MenuClass, Recipe};
use uuid::Uuid;

fn ingredient(name: &str, quantity: &str, unit: &str, cost: Option<&str>) -> IngredientInput {
    IngredientInput {
        name: name.to_string(),
        quantity: quantity.to_string(),
        unit: unit.to_string(),
        category: None,
        cost_per_unit: cost.map(dec),
        allergens: Vec::new(),
        notes: None,
    }
}

fn short_rib_input() -> CreateRecipeInput {
    CreateRecipeInput {
        name: "Braised Short Rib".to_string(),
        description: String::new(),
        course: "main".to_string(),
        cuisine: "french".to_string(),
        portion_size: "6 servings".to_string(),
        category: String::new(),
        ingredients: vec![
            ingredient("Short Rib", "1", "kg", Some("12.00")),
            ingredient("Red Wine", "1", "bottle", Some("3.50")),
        ],
        selling_price: Some(dec("10")),
        target_food_cost_percentage: None,
        menu_category: Some("Mains".to_string()),
        allergens: vec!["sulphites".to_string()],
    }
}

async fn short_rib(costing: &CostingService) -> Recipe {
    costing.create_recipe(short_rib_input()).await.unwrap()
}

fn menu_item(recipe_id: Uuid, price: &str) -> AddMenuItemInput {
    AddMenuItemInput {
        recipe_id,
        menu_category: "Mains".to_string(),
        selling_price: dec(price),
    }
}

// ============================================================================
// Recipe costs
// ============================================================================

#[tokio::test]
async fn test_recipe_cost_figures() {
    let (_, store) = memory();
    let costing = CostingService::new(store);
    let recipe = short_rib(&costing).await;

    assert_eq!(recipe.total_cost(), dec("15.50"));
    assert_eq!(recipe.portion_count(), 6);
    assert_eq!(recipe.cost_per_portion().round_dp(3), dec("2.583"));
    assert_eq!(recipe.actual_food_cost_percentage().unwrap().round_dp(2), dec("25.83"));
    assert_eq!(recipe.target_food_cost_percentage, Some(dec("30")));
    assert!(recipe.is_within_target_cost());

    // Categories inferred from ingredient names
    assert_eq!(recipe.ingredients[0].category.as_deref(), Some("BEEF"));

    let stored = costing.get_recipe(recipe.id).await.unwrap();
    assert_eq!(stored, recipe);
}

#[tokio::test]
async fn test_create_recipe_validation() {
    let (_, store) = memory();
    let costing = CostingService::new(store);

    let mut input = short_rib_input();
    input.name = String::new();
    let err = costing.create_recipe(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut input = short_rib_input();
    input.target_food_cost_percentage = Some(dec("140"));
    let err = costing.create_recipe(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut input = short_rib_input();
    input.ingredients[1].cost_per_unit = Some(dec("-1"));
    let err = costing.create_recipe(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut input = short_rib_input();
    input.ingredients[0].quantity = "79228162514264337593543950335".to_string();
    let err = costing.create_recipe(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut input = short_rib_input();
    input.selling_price = Some(rust_decimal::Decimal::MAX);
    let err = costing.create_recipe(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(costing.list_recipes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_pricing_moves_off_target() {
    let (_, store) = memory();
    let costing = CostingService::new(store);
    let recipe = short_rib(&costing).await;

    let recipe = costing
        .update_pricing(
            recipe.id,
            PricingInput {
                selling_price: Some(dec("8")),
                target_food_cost_percentage: Some(dec("25")),
            },
        )
        .await
        .unwrap();
    assert_eq!(recipe.selling_price, Some(dec("8")));
    assert!(!recipe.is_within_target_cost());

    let err = costing
        .update_pricing(Uuid::new_v4(), PricingInput::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_refresh_costs_from_inventory() {
    let (_, store) = memory();
    let costing = CostingService::new(store.clone());
    let recipe = short_rib(&costing).await;
    let menu = costing.add_menu_item(menu_item(recipe.id, "10")).await.unwrap();

    item(&store, "short rib", "kg", "5", "14.00", None).await;
    // Unpriced stock does not override the recipe's cost
    item(&store, "Red Wine", "bottle", "3", "0", None).await;

    let recipe = costing.refresh_costs(recipe.id).await.unwrap();
    assert_eq!(recipe.ingredients[0].current_cost_per_unit, Some(dec("14.00")));
    assert_eq!(recipe.ingredients[1].current_cost_per_unit, Some(dec("3.50")));
    assert_eq!(recipe.total_cost(), dec("17.50"));
    assert!(recipe.last_cost_calculation.is_some());

    let menu_items = costing.list_menu_items().await.unwrap();
    let refreshed = menu_items.iter().find(|m| m.id == menu.id).unwrap();
    assert_eq!(refreshed.cost_per_portion, recipe.cost_per_portion());
    assert_eq!(refreshed.cost_per_portion.round_dp(2), dec("2.92"));
}

#[tokio::test]
async fn test_snapshots_and_trend() {
    let (_, store) = memory();
    let costing = CostingService::new(store);
    let recipe = short_rib(&costing).await;

    let first = costing
        .snapshot(
            recipe.id,
            SnapshotInput {
                notes: Some("menu launch".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(first.total_cost, dec("15.50"));
    assert_eq!(first.ingredient_costs.len(), 2);
    assert!(first.is_within_target());

    costing
        .update_pricing(
            recipe.id,
            PricingInput {
                selling_price: Some(dec("12")),
                target_food_cost_percentage: None,
            },
        )
        .await
        .unwrap();
    costing.snapshot(recipe.id, SnapshotInput { notes: None }).await.unwrap();

    let trend = costing.cost_trend(recipe.id).await.unwrap();
    assert_eq!(trend.len(), 2);
    assert!(trend[0].date >= trend[1].date);
    assert!(trend.iter().any(|s| s.selling_price == Some(dec("12"))));

    // Later pricing does not rewrite an existing snapshot
    let launch = trend.iter().find(|s| s.id == first.id).unwrap();
    assert_eq!(launch.selling_price, Some(dec("10")));
}

#[tokio::test]
async fn test_record_production() {
    let (_, store) = memory();
    let costing = CostingService::new(store);
    let recipe = short_rib(&costing).await;

    costing.record_production(recipe.id, CountInput { quantity: 2 }).await.unwrap();
    let recipe = costing.record_production(recipe.id, CountInput { quantity: 3 }).await.unwrap();
    assert_eq!(recipe.total_production_count, 5);
    assert!(recipe.last_produced_date.is_some());

    let err = costing
        .record_production(recipe.id, CountInput { quantity: 0 })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = costing
        .record_production(recipe.id, CountInput { quantity: i64::MAX })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(costing.get_recipe(recipe.id).await.unwrap().total_production_count, 5);
}

// ============================================================================
// Menu engineering
// ============================================================================

#[tokio::test]
async fn test_menu_engineering_quadrants() {
    let (_, store) = memory();
    let costing = CostingService::new(store);
    let recipe = short_rib(&costing).await;

    let star = costing.add_menu_item(menu_item(recipe.id, "20")).await.unwrap();
    let puzzle = costing.add_menu_item(menu_item(recipe.id, "20")).await.unwrap();
    let horse = costing.add_menu_item(menu_item(recipe.id, "5")).await.unwrap();

    costing.record_sale(star.id, CountInput { quantity: 40 }).await.unwrap();
    costing.record_sale(puzzle.id, CountInput { quantity: 2 }).await.unwrap();
    let horse_now = costing.record_sale(horse.id, CountInput { quantity: 40 }).await.unwrap();
    assert_eq!(horse_now.popularity, 40);
    assert!(horse_now.last_sold_date.is_some());

    let report = costing.menu_engineering().await.unwrap();
    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.average_popularity.round_dp(2), dec("27.33"));

    let class_of = |id: Uuid| report.entries.iter().find(|e| e.menu_item_id == id).unwrap().class;
    assert_eq!(class_of(star.id), MenuClass::Star);
    assert_eq!(class_of(puzzle.id), MenuClass::Puzzle);
    assert_eq!(class_of(horse.id), MenuClass::Horse);
}

#[tokio::test]
async fn test_menu_item_requires_recipe() {
    let (_, store) = memory();
    let costing = CostingService::new(store);

    let err = costing.add_menu_item(menu_item(Uuid::new_v4(), "12")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = costing
        .record_sale(Uuid::new_v4(), CountInput { quantity: 1 })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let report = costing.menu_engineering().await.unwrap();
    assert!(report.entries.is_empty());
}
