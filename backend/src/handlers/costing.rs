//! HTTP handlers for recipe costing and menu engineering

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{MenuEngineeringReport, MenuItem, Recipe, RecipeCostHistory};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::costing::{
    AddMenuItemInput, CostingService, CountInput, CreateRecipeInput, PricingInput, SnapshotInput,
};
use crate::AppState;

/// Recipe with its computed costs
#[derive(Debug, Serialize)]
pub struct RecipeView {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub total_cost: Decimal,
    pub portion_count: u32,
    pub cost_per_portion: Decimal,
    pub actual_food_cost_percentage: Option<Decimal>,
    pub profit_margin: Option<Decimal>,
    pub profit_margin_percentage: Option<Decimal>,
    pub is_within_target_cost: bool,
    pub all_allergens: Vec<String>,
}

impl From<Recipe> for RecipeView {
    fn from(recipe: Recipe) -> Self {
        Self {
            total_cost: recipe.total_cost(),
            portion_count: recipe.portion_count(),
            cost_per_portion: recipe.cost_per_portion(),
            actual_food_cost_percentage: recipe.actual_food_cost_percentage(),
            profit_margin: recipe.profit_margin(),
            profit_margin_percentage: recipe.profit_margin_percentage(),
            is_within_target_cost: recipe.is_within_target_cost(),
            all_allergens: recipe.all_allergens(),
            recipe,
        }
    }
}

pub async fn create_recipe(
    State(state): State<AppState>,
    Json(input): Json<CreateRecipeInput>,
) -> AppResult<(StatusCode, Json<RecipeView>)> {
    let service = CostingService::new(state.store.clone());
    let recipe = service.create_recipe(input).await?;
    Ok((StatusCode::CREATED, Json(recipe.into())))
}

pub async fn list_recipes(State(state): State<AppState>) -> AppResult<Json<Vec<RecipeView>>> {
    let service = CostingService::new(state.store.clone());
    let recipes = service.list_recipes().await?;
    Ok(Json(recipes.into_iter().map(RecipeView::from).collect()))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<RecipeView>> {
    let service = CostingService::new(state.store.clone());
    let recipe = service.get_recipe(recipe_id).await?;
    Ok(Json(recipe.into()))
}

pub async fn update_pricing(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
    Json(input): Json<PricingInput>,
) -> AppResult<Json<RecipeView>> {
    let service = CostingService::new(state.store.clone());
    let recipe = service.update_pricing(recipe_id, input).await?;
    Ok(Json(recipe.into()))
}

/// Refresh ingredient costs from current inventory prices
pub async fn refresh_costs(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<RecipeView>> {
    let service = CostingService::new(state.store.clone());
    let recipe = service.refresh_costs(recipe_id).await?;
    Ok(Json(recipe.into()))
}

pub async fn record_production(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
    Json(input): Json<CountInput>,
) -> AppResult<Json<RecipeView>> {
    let service = CostingService::new(state.store.clone());
    let recipe = service.record_production(recipe_id, input).await?;
    Ok(Json(recipe.into()))
}

pub async fn create_snapshot(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
    Json(input): Json<SnapshotInput>,
) -> AppResult<(StatusCode, Json<RecipeCostHistory>)> {
    let service = CostingService::new(state.store.clone());
    let snapshot = service.snapshot(recipe_id, input).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Cost snapshots, newest first
pub async fn cost_trend(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<Vec<RecipeCostHistory>>> {
    let service = CostingService::new(state.store.clone());
    let trend = service.cost_trend(recipe_id).await?;
    Ok(Json(trend))
}

pub async fn add_menu_item(
    State(state): State<AppState>,
    Json(input): Json<AddMenuItemInput>,
) -> AppResult<(StatusCode, Json<MenuItem>)> {
    let service = CostingService::new(state.store.clone());
    let item = service.add_menu_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_menu_items(State(state): State<AppState>) -> AppResult<Json<Vec<MenuItem>>> {
    let service = CostingService::new(state.store.clone());
    let items = service.list_menu_items().await?;
    Ok(Json(items))
}

pub async fn record_sale(
    State(state): State<AppState>,
    Path(menu_item_id): Path<Uuid>,
    Json(input): Json<CountInput>,
) -> AppResult<Json<MenuItem>> {
    let service = CostingService::new(state.store.clone());
    let item = service.record_sale(menu_item_id, input).await?;
    Ok(Json(item))
}

pub async fn menu_engineering(State(state): State<AppState>) -> AppResult<Json<MenuEngineeringReport>> {
    let service = CostingService::new(state.store.clone());
    let report = service.menu_engineering().await?;
    Ok(Json(report))
}
