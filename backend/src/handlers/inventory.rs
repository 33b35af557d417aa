//! HTTP handlers for inventory items and ledger movements

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{InventoryItem, InventoryTransaction, LowStockAlert, StockStatus};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::IdempotencyKey;
use crate::services::ledger::{
    AdjustInput, CreateItemInput, LedgerCheck, LedgerService, LocationValuation, UpdateItemInput,
};
use crate::AppState;

/// Item with its derived stock properties
#[derive(Debug, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub stock_status: StockStatus,
    pub is_low_stock: bool,
    pub is_below_par: bool,
    pub total_value: Decimal,
}

impl From<InventoryItem> for ItemView {
    fn from(item: InventoryItem) -> Self {
        Self {
            stock_status: item.stock_status(),
            is_low_stock: item.is_low_stock(),
            is_below_par: item.is_below_par(),
            total_value: item.total_value(),
            item,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct InventoryValue {
    pub total_value: Decimal,
}

/// Create an inventory item
pub async fn create_item(
    State(state): State<AppState>,
    key: IdempotencyKey,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<ItemView>)> {
    let service = LedgerService::new(state.store.clone());
    let item = service.create_item(input, key.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// List items, optionally at one location
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<Vec<ItemView>>> {
    let service = LedgerService::new(state.store.clone());
    let items = service.list_items(query.location_id).await?;
    Ok(Json(items.into_iter().map(ItemView::from).collect()))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ItemView>> {
    let service = LedgerService::new(state.store.clone());
    let item = service.get_item(item_id).await?;
    Ok(Json(item.into()))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<ItemView>> {
    let service = LedgerService::new(state.store.clone());
    let item = service.update_item(item_id, input).await?;
    Ok(Json(item.into()))
}

/// Delete an item together with its ledger
pub async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = LedgerService::new(state.store.clone());
    service.delete_item(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Post a signed stock movement against an item
pub async fn adjust(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    key: IdempotencyKey,
    Json(mut input): Json<AdjustInput>,
) -> AppResult<(StatusCode, Json<InventoryTransaction>)> {
    input.item_id = Some(item_id);
    let service = LedgerService::new(state.store.clone());
    let transaction = service.adjust(input, key.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventoryTransaction>>> {
    let service = LedgerService::new(state.store.clone());
    let transactions = service.transactions(item_id).await?;
    Ok(Json(transactions))
}

/// Compare an item's balance with its ledger
pub async fn verify_ledger(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<LedgerCheck>> {
    let service = LedgerService::new(state.store.clone());
    let check = service.verify_ledger(item_id).await?;
    Ok(Json(check))
}

pub async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<Vec<ItemView>>> {
    let service = LedgerService::new(state.store.clone());
    let items = service.low_stock_items(query.location_id).await?;
    Ok(Json(items.into_iter().map(ItemView::from).collect()))
}

pub async fn low_stock_alerts(State(state): State<AppState>) -> AppResult<Json<Vec<LowStockAlert>>> {
    let service = LedgerService::new(state.store.clone());
    let alerts = service.low_stock_alerts().await?;
    Ok(Json(alerts))
}

pub async fn total_value(State(state): State<AppState>) -> AppResult<Json<InventoryValue>> {
    let service = LedgerService::new(state.store.clone());
    let total_value = service.total_value().await?;
    Ok(Json(InventoryValue { total_value }))
}

pub async fn valuation_by_location(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<LocationValuation>>> {
    let service = LedgerService::new(state.store.clone());
    let valuations = service.valuation_by_location().await?;
    Ok(Json(valuations))
}
