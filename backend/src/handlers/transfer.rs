//! HTTP handlers for stock transfers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{StockTransfer, TransferStatus};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::IdempotencyKey;
use crate::services::transfer::{ApproveTransferInput, RequestTransferInput, TransferService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub status: Option<TransferStatus>,
}

/// Request a transfer between two locations
pub async fn request_transfer(
    State(state): State<AppState>,
    key: IdempotencyKey,
    Json(input): Json<RequestTransferInput>,
) -> AppResult<(StatusCode, Json<StockTransfer>)> {
    let service = TransferService::new(state.store.clone());
    let transfer = service.request(input, key.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<TransferQuery>,
) -> AppResult<Json<Vec<StockTransfer>>> {
    let service = TransferService::new(state.store.clone());
    let transfers = service.list(query.status).await?;
    Ok(Json(transfers))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<StockTransfer>> {
    let service = TransferService::new(state.store.clone());
    let transfer = service.get(transfer_id).await?;
    Ok(Json(transfer))
}

pub async fn approve_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    key: IdempotencyKey,
    Json(input): Json<ApproveTransferInput>,
) -> AppResult<Json<StockTransfer>> {
    let service = TransferService::new(state.store.clone());
    let transfer = service.approve(transfer_id, input, key.as_deref()).await?;
    Ok(Json(transfer))
}

/// Complete an approved transfer, moving the stock
pub async fn complete_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    key: IdempotencyKey,
) -> AppResult<Json<StockTransfer>> {
    let service = TransferService::new(state.store.clone());
    let transfer = service.complete(transfer_id, key.as_deref()).await?;
    Ok(Json(transfer))
}

pub async fn reject_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    key: IdempotencyKey,
) -> AppResult<Json<StockTransfer>> {
    let service = TransferService::new(state.store.clone());
    let transfer = service.reject(transfer_id, key.as_deref()).await?;
    Ok(Json(transfer))
}
