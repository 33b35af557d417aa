//! Recipe costing, cost snapshots and menu engineering
//!
//! Formulas live in `shared`; this service loads recipes and prices, applies
//! them and persists the results.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    cost_trend, infer_category, menu_engineering, validate_count, validate_non_negative_quantity,
    validate_percentage, validate_price, Ingredient,
    InventoryItem, MenuEngineeringReport, MenuItem, Recipe, RecipeCostHistory,
};
use uuid::Uuid;
use validator::Validate;

use super::check;
use crate::error::{AppError, AppResult};
use crate::store::{Store, UnitOfWork};

#[derive(Clone)]
pub struct CostingService {
    store: Arc<dyn Store>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IngredientInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// As written in the recipe, e.g. "1.5"
    #[validate(length(min = 1, max = 50))]
    pub quantity: String,
    #[validate(length(max = 50))]
    pub unit: String,
    /// Inferred from the name when absent
    #[validate(length(max = 50))]
    pub category: Option<String>,
    pub cost_per_unit: Option<Decimal>,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl IngredientInput {
    fn into_ingredient(self) -> AppResult<Ingredient> {
        self.validate()?;
        if let Some(cost) = self.cost_per_unit {
            check(validate_price(cost), "cost_per_unit")?;
        }

        let name = self.name.trim().to_string();
        let category = self
            .category
            .unwrap_or_else(|| infer_category(&name).label().to_string());
        let mut ingredient = Ingredient::new(name, self.quantity.trim(), self.unit.trim());
        if let Some(quantity) = ingredient.quantity_value() {
            check(validate_non_negative_quantity(quantity), "quantity")?;
        }
        if let Some(cost) = self.cost_per_unit {
            ingredient = ingredient.with_cost(cost);
        }
        ingredient.category = Some(category);
        ingredient.allergens = self.allergens;
        ingredient.notes = self.notes;
        Ok(ingredient)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRecipeInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub course: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub cuisine: String,
    /// Free text such as "6 servings"
    #[validate(length(max = 100))]
    pub portion_size: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub category: String,
    #[serde(default)]
    pub ingredients: Vec<IngredientInput>,
    pub selling_price: Option<Decimal>,
    pub target_food_cost_percentage: Option<Decimal>,
    #[validate(length(max = 50))]
    pub menu_category: Option<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricingInput {
    pub selling_price: Option<Decimal>,
    pub target_food_cost_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SnapshotInput {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountInput {
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddMenuItemInput {
    pub recipe_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub menu_category: String,
    pub selling_price: Decimal,
}

fn check_pricing(selling_price: Option<Decimal>, target: Option<Decimal>) -> AppResult<()> {
    if let Some(price) = selling_price {
        check(validate_price(price), "selling_price")?;
    }
    if let Some(target) = target {
        check(validate_percentage(target), "target_food_cost_percentage")?;
    }
    Ok(())
}

async fn load_recipe(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<Recipe> {
    uow.get_recipe(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe".to_string()))
}

async fn load_menu_item(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<MenuItem> {
    uow.get_menu_item(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Menu item".to_string()))
}

/// Latest priced stock of an ingredient across all locations
fn current_cost(items: &[InventoryItem], ingredient_name: &str) -> Option<Decimal> {
    items
        .iter()
        .filter(|i| i.ingredient_name.eq_ignore_ascii_case(ingredient_name))
        .filter(|i| i.unit_cost > Decimal::ZERO)
        .max_by_key(|i| i.last_updated)
        .map(|i| i.unit_cost)
}

impl CostingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_recipe(&self, input: CreateRecipeInput) -> AppResult<Recipe> {
        input.validate()?;
        check_pricing(input.selling_price, input.target_food_cost_percentage)?;
        let ingredients = input
            .ingredients
            .into_iter()
            .map(IngredientInput::into_ingredient)
            .collect::<AppResult<Vec<_>>>()?;

        let mut recipe = Recipe::new(input.name.trim(), input.portion_size.trim(), ingredients);
        recipe.description = input.description;
        recipe.course = input.course;
        recipe.cuisine = input.cuisine;
        recipe.category = input.category;
        recipe.selling_price = input.selling_price;
        if input.target_food_cost_percentage.is_some() {
            recipe.target_food_cost_percentage = input.target_food_cost_percentage;
        }
        recipe.menu_category = input.menu_category;
        recipe.allergens = input.allergens;

        let mut uow = self.store.begin().await?;
        uow.insert_recipe(&recipe).await?;
        uow.commit().await?;

        tracing::info!(
            "Created recipe {} ({}) with {} ingredients",
            recipe.id,
            recipe.name,
            recipe.ingredients.len()
        );
        Ok(recipe)
    }

    pub async fn get_recipe(&self, id: Uuid) -> AppResult<Recipe> {
        let mut uow = self.store.begin().await?;
        load_recipe(&mut *uow, id).await
    }

    pub async fn list_recipes(&self) -> AppResult<Vec<Recipe>> {
        let mut uow = self.store.begin().await?;
        uow.list_recipes().await
    }

    pub async fn update_pricing(&self, id: Uuid, input: PricingInput) -> AppResult<Recipe> {
        check_pricing(input.selling_price, input.target_food_cost_percentage)?;

        let mut uow = self.store.begin().await?;
        let mut recipe = load_recipe(&mut *uow, id).await?;
        if input.selling_price.is_some() {
            recipe.selling_price = input.selling_price;
        }
        if input.target_food_cost_percentage.is_some() {
            recipe.target_food_cost_percentage = input.target_food_cost_percentage;
        }
        uow.update_recipe(&recipe).await?;
        uow.commit().await?;

        tracing::info!(
            "Repriced recipe {}: food cost {:?}% against target {:?}%",
            recipe.name,
            recipe.actual_food_cost_percentage().map(|p| p.round_dp(2)),
            recipe.target_food_cost_percentage
        );
        Ok(recipe)
    }

    /// Pull current unit costs from inventory into the recipe's ingredients
    /// and carry the new portion cost to its menu items.
    ///
    /// Ingredients without priced stock keep their last known cost.
    pub async fn refresh_costs(&self, id: Uuid) -> AppResult<Recipe> {
        let mut uow = self.store.begin().await?;
        let mut recipe = load_recipe(&mut *uow, id).await?;
        let items = uow.list_items(None).await?;

        let now = Utc::now();
        let mut refreshed = 0;
        for ingredient in recipe.ingredients.iter_mut() {
            if let Some(cost) = current_cost(&items, &ingredient.name) {
                ingredient.current_cost_per_unit = Some(cost);
                ingredient.last_cost_update = Some(now);
                refreshed += 1;
            }
        }
        recipe.last_cost_calculation = Some(now);
        uow.update_recipe(&recipe).await?;

        let portion_cost = recipe.cost_per_portion();
        for mut menu_item in uow
            .list_menu_items()
            .await?
            .into_iter()
            .filter(|m| m.recipe_id == recipe.id)
        {
            menu_item.cost_per_portion = portion_cost;
            uow.update_menu_item(&menu_item).await?;
        }
        uow.commit().await?;

        tracing::info!(
            "Refreshed {} of {} ingredient costs for {}: {} per portion",
            refreshed,
            recipe.ingredients.len(),
            recipe.name,
            portion_cost.round_dp(4)
        );
        Ok(recipe)
    }

    /// Record the recipe's current cost as an immutable snapshot
    pub async fn snapshot(&self, id: Uuid, input: SnapshotInput) -> AppResult<RecipeCostHistory> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let recipe = load_recipe(&mut *uow, id).await?;
        let snapshot = RecipeCostHistory::snapshot(&recipe, input.notes);
        uow.insert_cost_history(&snapshot).await?;
        uow.commit().await?;

        tracing::info!(
            "Cost snapshot for {}: total {} / portion {}",
            snapshot.recipe_name,
            snapshot.total_cost,
            snapshot.portion_cost.round_dp(4)
        );
        Ok(snapshot)
    }

    /// Snapshots for a recipe, newest first
    pub async fn cost_trend(&self, id: Uuid) -> AppResult<Vec<RecipeCostHistory>> {
        let mut uow = self.store.begin().await?;
        load_recipe(&mut *uow, id).await?;
        let history = uow.list_cost_history(Some(id)).await?;
        Ok(cost_trend(&history, id))
    }

    pub async fn record_production(&self, id: Uuid, input: CountInput) -> AppResult<Recipe> {
        check(validate_count(input.quantity), "quantity")?;

        let mut uow = self.store.begin().await?;
        let mut recipe = load_recipe(&mut *uow, id).await?;
        recipe.record_production(input.quantity);
        uow.update_recipe(&recipe).await?;
        uow.commit().await?;

        tracing::info!(
            "Produced {} batches of {} ({} total)",
            input.quantity,
            recipe.name,
            recipe.total_production_count
        );
        Ok(recipe)
    }

    pub async fn add_menu_item(&self, input: AddMenuItemInput) -> AppResult<MenuItem> {
        input.validate()?;
        check(validate_price(input.selling_price), "selling_price")?;

        let mut uow = self.store.begin().await?;
        let recipe = load_recipe(&mut *uow, input.recipe_id).await?;
        let item = MenuItem::from_recipe(&recipe, input.menu_category.trim(), input.selling_price);
        uow.insert_menu_item(&item).await?;
        uow.commit().await?;

        tracing::info!(
            "Added {} to the menu at {} ({}% food cost)",
            item.recipe_name,
            item.selling_price,
            item.food_cost_percentage().round_dp(2)
        );
        Ok(item)
    }

    pub async fn record_sale(&self, menu_item_id: Uuid, input: CountInput) -> AppResult<MenuItem> {
        check(validate_count(input.quantity), "quantity")?;

        let mut uow = self.store.begin().await?;
        let mut item = load_menu_item(&mut *uow, menu_item_id).await?;
        item.record_sale(input.quantity, Utc::now());
        uow.update_menu_item(&item).await?;
        uow.commit().await?;

        tracing::debug!("Sold {} x {}", input.quantity, item.recipe_name);
        Ok(item)
    }

    pub async fn list_menu_items(&self) -> AppResult<Vec<MenuItem>> {
        let mut uow = self.store.begin().await?;
        uow.list_menu_items().await
    }

    /// Classify active menu items against the cohort averages
    pub async fn menu_engineering(&self) -> AppResult<MenuEngineeringReport> {
        let mut uow = self.store.begin().await?;
        let items = uow.list_menu_items().await?;
        Ok(menu_engineering(&items))
    }
}
