//! Reference data for clients: enum display tables and category inference

use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};
use shared::{
    infer_category, AlertSeverity, DisplayMeta, Displayable, IngredientCategory, MenuClass,
    PurchaseOrderStatus, TransactionType, TransferStatus, VarianceType, WasteCategory,
};

#[derive(Debug, Serialize)]
pub struct DisplayEntry<T> {
    pub value: T,
    #[serde(flatten)]
    pub meta: DisplayMeta,
}

#[derive(Debug, Serialize)]
pub struct DisplayTables {
    pub transaction_types: Vec<DisplayEntry<TransactionType>>,
    pub transfer_statuses: Vec<DisplayEntry<TransferStatus>>,
    pub purchase_order_statuses: Vec<DisplayEntry<PurchaseOrderStatus>>,
    pub waste_categories: Vec<DisplayEntry<WasteCategory>>,
    pub variance_types: Vec<DisplayEntry<VarianceType>>,
    pub menu_classes: Vec<DisplayEntry<MenuClass>>,
    pub alert_severities: Vec<DisplayEntry<AlertSeverity>>,
}

fn entries<T: Displayable>() -> Vec<DisplayEntry<T>> {
    T::table()
        .iter()
        .map(|(value, meta)| DisplayEntry {
            value: *value,
            meta: *meta,
        })
        .collect()
}

/// Labels, icons and colors for every displayed enum
pub async fn display_tables() -> Json<DisplayTables> {
    Json(DisplayTables {
        transaction_types: entries(),
        transfer_statuses: entries(),
        purchase_order_statuses: entries(),
        waste_categories: entries(),
        variance_types: entries(),
        menu_classes: entries(),
        alert_severities: entries(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub ingredient: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryGuess {
    pub ingredient: String,
    pub category: IngredientCategory,
    pub label: &'static str,
}

pub async fn infer_ingredient_category(Query(query): Query<CategoryQuery>) -> Json<CategoryGuess> {
    let category = infer_category(&query.ingredient);
    Json(CategoryGuess {
        label: category.label(),
        category,
        ingredient: query.ingredient,
    })
}
