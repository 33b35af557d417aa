//! HTTP handlers for suppliers and their catalogue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{PriceHistory, Supplier, SupplierIngredient, SupplierPerformance};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::supplier::{
    AddOfferInput, CreateSupplierInput, PriceUpdate, SupplierService, UpdatePriceInput,
    UpdateSupplierInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OfferQuery {
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PreferredQuery {
    pub ingredient: String,
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    let service = SupplierService::new(state.store.clone());
    let supplier = service.create_supplier(input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn list_suppliers(State(state): State<AppState>) -> AppResult<Json<Vec<Supplier>>> {
    let service = SupplierService::new(state.store.clone());
    let suppliers = service.list_suppliers().await?;
    Ok(Json(suppliers))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    let service = SupplierService::new(state.store.clone());
    let supplier = service.get_supplier(supplier_id).await?;
    Ok(Json(supplier))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
    Json(input): Json<UpdateSupplierInput>,
) -> AppResult<Json<Supplier>> {
    let service = SupplierService::new(state.store.clone());
    let supplier = service.update_supplier(supplier_id, input).await?;
    Ok(Json(supplier))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = SupplierService::new(state.store.clone());
    service.delete_supplier(supplier_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delivery statistics over the supplier's orders
pub async fn supplier_performance(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<SupplierPerformance>> {
    let service = SupplierService::new(state.store.clone());
    let performance = service.performance(supplier_id).await?;
    Ok(Json(performance))
}

pub async fn add_offer(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
    Json(input): Json<AddOfferInput>,
) -> AppResult<(StatusCode, Json<SupplierIngredient>)> {
    let service = SupplierService::new(state.store.clone());
    let offer = service.add_offer(supplier_id, input).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<OfferQuery>,
) -> AppResult<Json<Vec<SupplierIngredient>>> {
    let service = SupplierService::new(state.store.clone());
    let offers = service.list_offers(query.supplier_id).await?;
    Ok(Json(offers))
}

pub async fn get_offer(
    State(state): State<AppState>,
    Path(offer_id): Path<Uuid>,
) -> AppResult<Json<SupplierIngredient>> {
    let service = SupplierService::new(state.store.clone());
    let offer = service.get_offer(offer_id).await?;
    Ok(Json(offer))
}

/// Best offer for an ingredient: preferred first, then cheapest
pub async fn preferred_offer(
    State(state): State<AppState>,
    Query(query): Query<PreferredQuery>,
) -> AppResult<Json<SupplierIngredient>> {
    let service = SupplierService::new(state.store.clone());
    let offer = service.preferred_offer(&query.ingredient).await?;
    Ok(Json(offer))
}

pub async fn update_price(
    State(state): State<AppState>,
    Path(offer_id): Path<Uuid>,
    Json(input): Json<UpdatePriceInput>,
) -> AppResult<Json<PriceUpdate>> {
    let service = SupplierService::new(state.store.clone());
    let update = service.update_price(offer_id, input).await?;
    Ok(Json(update))
}

pub async fn price_history(
    State(state): State<AppState>,
    Path(offer_id): Path<Uuid>,
) -> AppResult<Json<Vec<PriceHistory>>> {
    let service = SupplierService::new(state.store.clone());
    let history = service.price_history(offer_id).await?;
    Ok(Json(history))
}
