//! Recipe costing and menu engineering
//!
//! Everything here is a pure function of recipe and price data. Snapshots
//! ([`RecipeCostHistory`]) are computed once and never recalculated.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::percentage_of;

/// Default target food cost percentage
pub const DEFAULT_TARGET_FOOD_COST: Decimal = Decimal::from_parts(30, 0, 0, false, 0);

/// An ingredient line in a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    /// Free text as written in the recipe, e.g. "1.5"
    pub quantity: String,
    pub unit: String,
    pub category: Option<String>,
    pub current_cost_per_unit: Option<Decimal>,
    pub last_cost_update: Option<DateTime<Utc>>,
    pub allergens: Vec<String>,
    pub notes: Option<String>,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            unit: unit.into(),
            category: None,
            current_cost_per_unit: None,
            last_cost_update: None,
            allergens: Vec::new(),
            notes: None,
        }
    }

    pub fn with_cost(mut self, cost_per_unit: Decimal) -> Self {
        self.current_cost_per_unit = Some(cost_per_unit);
        self.last_cost_update = Some(Utc::now());
        self
    }

    /// Numeric quantity, `None` when the text is not a number
    pub fn quantity_value(&self) -> Option<Decimal> {
        Decimal::from_str(self.quantity.trim()).ok()
    }

    /// Quantity times current unit cost; zero when either is unknown
    pub fn line_cost(&self) -> Decimal {
        match (self.quantity_value(), self.current_cost_per_unit) {
            (Some(qty), Some(cost)) => qty * cost,
            _ => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub course: String,
    pub cuisine: String,
    /// Free text, e.g. "6 servings"
    pub portion_size: String,
    pub category: String,
    pub ingredients: Vec<Ingredient>,
    pub selling_price: Option<Decimal>,
    pub target_food_cost_percentage: Option<Decimal>,
    pub last_cost_calculation: Option<DateTime<Utc>>,
    pub total_production_count: i64,
    pub last_produced_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub menu_category: Option<String>,
    /// Allergens entered on the recipe itself
    pub allergens: Vec<String>,
}

impl Recipe {
    pub fn new(name: impl Into<String>, portion_size: impl Into<String>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            course: String::new(),
            cuisine: String::new(),
            portion_size: portion_size.into(),
            category: String::new(),
            ingredients,
            selling_price: None,
            target_food_cost_percentage: Some(DEFAULT_TARGET_FOOD_COST),
            last_cost_calculation: None,
            total_production_count: 0,
            last_produced_date: None,
            is_active: true,
            menu_category: None,
            allergens: Vec::new(),
        }
    }

    pub fn total_cost(&self) -> Decimal {
        self.ingredients.iter().map(Ingredient::line_cost).sum()
    }

    pub fn portion_count(&self) -> u32 {
        parse_portion_count(&self.portion_size)
    }

    pub fn cost_per_portion(&self) -> Decimal {
        self.total_cost() / Decimal::from(self.portion_count())
    }

    /// `None` without a positive selling price
    pub fn actual_food_cost_percentage(&self) -> Option<Decimal> {
        let price = self.selling_price.filter(|p| *p > Decimal::ZERO)?;
        Some(percentage_of(self.cost_per_portion(), price))
    }

    pub fn profit_margin(&self) -> Option<Decimal> {
        self.selling_price.map(|price| price - self.cost_per_portion())
    }

    pub fn profit_margin_percentage(&self) -> Option<Decimal> {
        let price = self.selling_price.filter(|p| *p > Decimal::ZERO)?;
        Some(percentage_of(price - self.cost_per_portion(), price))
    }

    pub fn is_within_target_cost(&self) -> bool {
        match (self.target_food_cost_percentage, self.actual_food_cost_percentage()) {
            (Some(target), Some(actual)) => actual <= target,
            _ => false,
        }
    }

    /// Union of ingredient and recipe allergens, sorted
    pub fn all_allergens(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .ingredients
            .iter()
            .flat_map(|i| i.allergens.iter())
            .chain(self.allergens.iter())
            .collect();
        set.into_iter().cloned().collect()
    }

    pub fn record_production(&mut self, quantity: i64) {
        self.total_production_count = self.total_production_count.saturating_add(quantity);
        self.last_produced_date = Some(Utc::now());
    }
}

/// Portions encoded in free text: the first run of digits, 1 when absent or
/// zero. A run too large for `u32` saturates at `u32::MAX`.
pub fn parse_portion_count(portion_size: &str) -> u32 {
    let digits: String = portion_size
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return 1;
    }

    match digits.parse::<u32>() {
        Ok(0) => 1,
        Ok(n) => n,
        Err(_) => u32::MAX,
    }
}

/// Cost of one ingredient line at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientCost {
    pub ingredient_name: String,
    pub quantity: String,
    pub unit: String,
    pub cost_per_unit: Option<Decimal>,
    pub line_cost: Decimal,
}

/// Immutable snapshot of a recipe's cost at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeCostHistory {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub date: DateTime<Utc>,
    pub total_cost: Decimal,
    pub portion_cost: Decimal,
    pub selling_price: Option<Decimal>,
    pub target_food_cost_percentage: Option<Decimal>,
    pub actual_food_cost_percentage: Option<Decimal>,
    pub ingredient_costs: Vec<IngredientCost>,
    pub portion_size: String,
    pub notes: Option<String>,
}

impl RecipeCostHistory {
    pub fn snapshot(recipe: &Recipe, notes: Option<String>) -> Self {
        let ingredient_costs = recipe
            .ingredients
            .iter()
            .map(|i| IngredientCost {
                ingredient_name: i.name.clone(),
                quantity: i.quantity.clone(),
                unit: i.unit.clone(),
                cost_per_unit: i.current_cost_per_unit,
                line_cost: i.line_cost(),
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            recipe_id: recipe.id,
            recipe_name: recipe.name.clone(),
            date: Utc::now(),
            total_cost: recipe.total_cost(),
            portion_cost: recipe.cost_per_portion(),
            selling_price: recipe.selling_price,
            target_food_cost_percentage: recipe.target_food_cost_percentage,
            actual_food_cost_percentage: recipe.actual_food_cost_percentage(),
            ingredient_costs,
            portion_size: recipe.portion_size.clone(),
            notes,
        }
    }

    pub fn gross_profit(&self) -> Option<Decimal> {
        self.selling_price.map(|price| price - self.portion_cost)
    }

    pub fn profit_margin(&self) -> Option<Decimal> {
        let price = self.selling_price.filter(|p| *p > Decimal::ZERO)?;
        Some(percentage_of(price - self.portion_cost, price))
    }

    pub fn is_within_target(&self) -> bool {
        match (self.target_food_cost_percentage, self.actual_food_cost_percentage) {
            (Some(target), Some(actual)) => actual <= target,
            _ => false,
        }
    }
}

/// Snapshots for one recipe, newest first
pub fn cost_trend(history: &[RecipeCostHistory], recipe_id: Uuid) -> Vec<RecipeCostHistory> {
    let mut trend: Vec<RecipeCostHistory> = history
        .iter()
        .filter(|h| h.recipe_id == recipe_id)
        .cloned()
        .collect();
    trend.sort_by(|a, b| b.date.cmp(&a.date));
    trend
}

/// Menu engineering quadrant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuClass {
    /// Popular and profitable
    Star,
    /// Popular, below-average margin
    Horse,
    /// Profitable, below-average popularity
    Puzzle,
    Dog,
}

impl MenuClass {
    pub const ALL: [MenuClass; 4] = [MenuClass::Star, MenuClass::Horse, MenuClass::Puzzle, MenuClass::Dog];

    pub fn as_str(&self) -> &'static str {
        match self {
            MenuClass::Star => "star",
            MenuClass::Horse => "horse",
            MenuClass::Puzzle => "puzzle",
            MenuClass::Dog => "dog",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            MenuClass::Star => "Keep and promote",
            MenuClass::Horse => "Increase price or reduce cost",
            MenuClass::Puzzle => "Promote or reposition",
            MenuClass::Dog => "Consider removing",
        }
    }
}

/// A recipe on the menu with its sales count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub menu_category: String,
    pub selling_price: Decimal,
    pub cost_per_portion: Decimal,
    pub target_food_cost_percentage: Decimal,
    pub is_active: bool,
    /// Units sold
    pub popularity: i64,
    pub last_sold_date: Option<DateTime<Utc>>,
}

impl MenuItem {
    pub fn from_recipe(recipe: &Recipe, menu_category: impl Into<String>, selling_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipe_id: recipe.id,
            recipe_name: recipe.name.clone(),
            menu_category: menu_category.into(),
            selling_price,
            cost_per_portion: recipe.cost_per_portion(),
            target_food_cost_percentage: recipe
                .target_food_cost_percentage
                .unwrap_or(DEFAULT_TARGET_FOOD_COST),
            is_active: true,
            popularity: 0,
            last_sold_date: None,
        }
    }

    pub fn food_cost_percentage(&self) -> Decimal {
        percentage_of(self.cost_per_portion, self.selling_price)
    }

    pub fn contribution_margin(&self) -> Decimal {
        self.selling_price - self.cost_per_portion
    }

    pub fn profit_margin(&self) -> Decimal {
        percentage_of(self.contribution_margin(), self.selling_price)
    }

    /// Quadrant against cohort averages; ties count as meeting the average
    pub fn classify(&self, average_popularity: Decimal, average_margin: Decimal) -> MenuClass {
        let popular = Decimal::from(self.popularity) >= average_popularity;
        let profitable = self.contribution_margin() >= average_margin;

        match (popular, profitable) {
            (true, true) => MenuClass::Star,
            (true, false) => MenuClass::Horse,
            (false, true) => MenuClass::Puzzle,
            (false, false) => MenuClass::Dog,
        }
    }

    pub fn record_sale(&mut self, quantity: i64, at: DateTime<Utc>) {
        self.popularity = self.popularity.saturating_add(quantity);
        self.last_sold_date = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuEngineeringEntry {
    pub menu_item_id: Uuid,
    pub recipe_name: String,
    pub popularity: i64,
    pub contribution_margin: Decimal,
    pub food_cost_percentage: Decimal,
    pub class: MenuClass,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuEngineeringReport {
    pub average_popularity: Decimal,
    pub average_margin: Decimal,
    pub entries: Vec<MenuEngineeringEntry>,
}

/// Classify every active menu item against the active cohort's averages
pub fn menu_engineering(items: &[MenuItem]) -> MenuEngineeringReport {
    let active: Vec<&MenuItem> = items.iter().filter(|i| i.is_active).collect();
    if active.is_empty() {
        return MenuEngineeringReport {
            average_popularity: Decimal::ZERO,
            average_margin: Decimal::ZERO,
            entries: Vec::new(),
        };
    }

    let count = Decimal::from(active.len() as u64);
    let average_popularity = active.iter().map(|i| Decimal::from(i.popularity)).sum::<Decimal>() / count;
    let average_margin = active.iter().map(|i| i.contribution_margin()).sum::<Decimal>() / count;

    let entries = active
        .iter()
        .map(|item| {
            let class = item.classify(average_popularity, average_margin);
            MenuEngineeringEntry {
                menu_item_id: item.id,
                recipe_name: item.recipe_name.clone(),
                popularity: item.popularity,
                contribution_margin: item.contribution_margin(),
                food_cost_percentage: item.food_cost_percentage(),
                class,
                recommendation: class.recommendation().to_string(),
            }
        })
        .collect();

    MenuEngineeringReport {
        average_popularity,
        average_margin,
        entries,
    }
}

/// Expected consumption of one ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalUsage {
    pub ingredient_name: String,
    pub unit: String,
    pub quantity: Decimal,
}

/// Expected ingredient consumption for the given portions sold per recipe.
///
/// Lines are grouped by ingredient name ignoring case; lines with a
/// non-numeric quantity contribute nothing.
pub fn theoretical_usage(sales: &[(&Recipe, Decimal)]) -> Vec<TheoreticalUsage> {
    let mut usage: BTreeMap<String, TheoreticalUsage> = BTreeMap::new();

    for (recipe, portions_sold) in sales {
        let portions = Decimal::from(recipe.portion_count());
        for ingredient in &recipe.ingredients {
            let Some(quantity) = ingredient.quantity_value() else {
                continue;
            };
            let entry = usage
                .entry(ingredient.name.to_lowercase())
                .or_insert_with(|| TheoreticalUsage {
                    ingredient_name: ingredient.name.clone(),
                    unit: ingredient.unit.clone(),
                    quantity: Decimal::ZERO,
                });
            entry.quantity += quantity / portions * *portions_sold;
        }
    }

    usage.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_recipe() -> Recipe {
        let mut recipe = Recipe::new(
            "Braised Short Rib",
            "6 servings",
            vec![
                Ingredient::new("Short Rib", "1", "kg").with_cost(Decimal::new(1200, 2)),
                Ingredient::new("Red Wine", "1", "bottle").with_cost(Decimal::new(350, 2)),
            ],
        );
        recipe.selling_price = Some(Decimal::new(1000, 2));
        recipe
    }

    #[test]
    fn test_recipe_costing() {
        let recipe = sample_recipe();
        assert_eq!(recipe.total_cost(), Decimal::new(1550, 2));
        assert_eq!(recipe.portion_count(), 6);
        assert_eq!(recipe.cost_per_portion().round_dp(3), Decimal::new(2583, 3));

        let pct = recipe.actual_food_cost_percentage().unwrap();
        assert_eq!(pct.round_dp(2), Decimal::new(2583, 2));
        assert!(recipe.is_within_target_cost());
        assert_eq!(
            recipe.profit_margin().unwrap().round_dp(3),
            Decimal::new(7417, 3)
        );
    }

    #[test]
    fn test_costing_without_price() {
        let mut recipe = sample_recipe();
        recipe.selling_price = None;
        assert!(recipe.actual_food_cost_percentage().is_none());
        assert!(recipe.profit_margin().is_none());
        assert!(!recipe.is_within_target_cost());

        recipe.selling_price = Some(Decimal::ZERO);
        assert!(recipe.actual_food_cost_percentage().is_none());
        assert!(recipe.profit_margin_percentage().is_none());
    }

    #[test]
    fn test_line_cost_unknown_is_zero() {
        assert_eq!(Ingredient::new("Salt", "a pinch", "g").with_cost(Decimal::ONE).line_cost(), Decimal::ZERO);
        assert_eq!(Ingredient::new("Salt", "2", "g").line_cost(), Decimal::ZERO);
    }

    #[test]
    fn test_parse_portion_count() {
        assert_eq!(parse_portion_count("6 servings"), 6);
        assert_eq!(parse_portion_count("serves 4 to 6"), 4);
        assert_eq!(parse_portion_count("1 plate"), 1);
        assert_eq!(parse_portion_count("0 portions"), 1);
        assert_eq!(parse_portion_count("family style"), 1);
        assert_eq!(parse_portion_count(""), 1);
        assert_eq!(parse_portion_count("0006 servings"), 6);
        assert_eq!(parse_portion_count("99999999999 portions"), u32::MAX);
    }

    #[test]
    fn test_counters_saturate() {
        let mut recipe = sample_recipe();
        recipe.total_production_count = i64::MAX - 1;
        recipe.record_production(5);
        assert_eq!(recipe.total_production_count, i64::MAX);

        let mut item = MenuItem::from_recipe(&recipe, "Mains", Decimal::from(20));
        item.popularity = i64::MAX;
        item.record_sale(1, Utc::now());
        assert_eq!(item.popularity, i64::MAX);
        assert!(item.last_sold_date.is_some());
    }

    #[test]
    fn test_all_allergens_deduplicated() {
        let mut recipe = sample_recipe();
        recipe.ingredients[0].allergens = vec!["sulphites".into(), "celery".into()];
        recipe.ingredients[1].allergens = vec!["sulphites".into()];
        recipe.allergens = vec!["mustard".into()];
        assert_eq!(recipe.all_allergens(), vec!["celery", "mustard", "sulphites"]);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut recipe = sample_recipe();
        let snapshot = RecipeCostHistory::snapshot(&recipe, None);
        recipe.ingredients[0].current_cost_per_unit = Some(Decimal::from(50));

        assert_eq!(snapshot.total_cost, Decimal::new(1550, 2));
        assert_eq!(snapshot.ingredient_costs.len(), 2);
        assert!(snapshot.is_within_target());
        assert_eq!(
            snapshot.gross_profit(),
            Some(Decimal::new(1000, 2) - snapshot.portion_cost)
        );
    }

    fn menu_item(popularity: i64, margin: i64) -> MenuItem {
        let recipe = sample_recipe();
        let mut item = MenuItem::from_recipe(&recipe, "Mains", Decimal::from(margin) + Decimal::from(2));
        item.cost_per_portion = Decimal::from(2);
        item.popularity = popularity;
        item
    }

    #[test]
    fn test_classify() {
        let avg_pop = Decimal::from(40);
        let avg_margin = Decimal::from(5);
        assert_eq!(menu_item(50, 6).classify(avg_pop, avg_margin), MenuClass::Star);
        assert_eq!(menu_item(20, 6).classify(avg_pop, avg_margin), MenuClass::Puzzle);
        assert_eq!(menu_item(50, 4).classify(avg_pop, avg_margin), MenuClass::Horse);
        assert_eq!(menu_item(20, 4).classify(avg_pop, avg_margin), MenuClass::Dog);
        assert_eq!(menu_item(40, 5).classify(avg_pop, avg_margin), MenuClass::Star);
    }

    #[test]
    fn test_menu_engineering_report() {
        let mut retired = menu_item(1000, 100);
        retired.is_active = false;
        let items = vec![menu_item(60, 6), menu_item(20, 4), retired];

        let report = menu_engineering(&items);
        assert_eq!(report.average_popularity, Decimal::from(40));
        assert_eq!(report.average_margin, Decimal::from(5));
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].class, MenuClass::Star);
        assert_eq!(report.entries[1].class, MenuClass::Dog);
        assert_eq!(report.entries[1].recommendation, "Consider removing");
    }

    #[test]
    fn test_theoretical_usage() {
        let recipe = Recipe::new(
            "Pancakes",
            "4 portions",
            vec![
                Ingredient::new("Flour", "0.4", "kg"),
                Ingredient::new("Eggs", "2", "each"),
            ],
        );
        let other = Recipe::new("Crepes", "2", vec![Ingredient::new("flour", "0.1", "kg")]);

        let usage = theoretical_usage(&[(&recipe, Decimal::from(10)), (&other, Decimal::from(4))]);
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].ingredient_name, "Eggs");
        assert_eq!(usage[0].quantity, Decimal::from(5));
        assert_eq!(usage[1].ingredient_name, "Flour");
        assert_eq!(usage[1].quantity, Decimal::new(12, 1));
    }
}
