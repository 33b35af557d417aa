//! HTTP handlers for purchase orders and goods receipts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{GoodsReceivedNote, PurchaseOrder, PurchaseOrderStatus};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::IdempotencyKey;
use crate::services::procurement::{
    ApproveOrderInput, CreateOrderInput, OrderLineInput, ProcurementService, ReceiveInput,
};
use crate::AppState;

fn service(state: &AppState) -> ProcurementService {
    ProcurementService::new(state.store.clone(), state.config.ledger_policy())
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<PurchaseOrderStatus>,
}

/// Order with its derived totals
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub grand_total: Decimal,
    pub is_overdue: bool,
    pub items_count: usize,
    pub received_items_count: usize,
}

impl From<PurchaseOrder> for OrderView {
    fn from(order: PurchaseOrder) -> Self {
        Self {
            grand_total: order.grand_total(),
            is_overdue: order.is_overdue(),
            items_count: order.items_count(),
            received_items_count: order.received_items_count(),
            order,
        }
    }
}

fn views(orders: Vec<PurchaseOrder>) -> Vec<OrderView> {
    orders.into_iter().map(OrderView::from).collect()
}

/// Create a draft purchase order
pub async fn create_order(
    State(state): State<AppState>,
    key: IdempotencyKey,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<OrderView>)> {
    let order = service(&state).create_order(input, key.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> AppResult<Json<Vec<OrderView>>> {
    let orders = service(&state).list(query.status).await?;
    Ok(Json(views(orders)))
}

/// Open orders past their expected delivery date
pub async fn overdue_orders(State(state): State<AppState>) -> AppResult<Json<Vec<OrderView>>> {
    let orders = service(&state).overdue().await?;
    Ok(Json(views(orders)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderView>> {
    let order = service(&state).get(order_id).await?;
    Ok(Json(order.into()))
}

pub async fn add_order_item(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<OrderLineInput>,
) -> AppResult<Json<OrderView>> {
    let order = service(&state).add_item(order_id, input).await?;
    Ok(Json(order.into()))
}

pub async fn submit_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    key: IdempotencyKey,
) -> AppResult<Json<OrderView>> {
    let order = service(&state).submit(order_id, key.as_deref()).await?;
    Ok(Json(order.into()))
}

pub async fn approve_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    key: IdempotencyKey,
    Json(input): Json<ApproveOrderInput>,
) -> AppResult<Json<OrderView>> {
    let order = service(&state).approve(order_id, input, key.as_deref()).await?;
    Ok(Json(order.into()))
}

pub async fn mark_order_ordered(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    key: IdempotencyKey,
) -> AppResult<Json<OrderView>> {
    let order = service(&state).mark_as_ordered(order_id, key.as_deref()).await?;
    Ok(Json(order.into()))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    key: IdempotencyKey,
) -> AppResult<Json<OrderView>> {
    let order = service(&state).cancel(order_id, key.as_deref()).await?;
    Ok(Json(order.into()))
}

/// Receive goods against an order and post them to the ledger
pub async fn receive_goods(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    key: IdempotencyKey,
    Json(input): Json<ReceiveInput>,
) -> AppResult<(StatusCode, Json<GoodsReceivedNote>)> {
    let note = service(&state).receive(order_id, input, key.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<GoodsReceivedNote>>> {
    let notes = service(&state).receipts(order_id).await?;
    Ok(Json(notes))
}
