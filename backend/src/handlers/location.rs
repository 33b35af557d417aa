//! HTTP handlers for locations

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Location;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::location::{CreateLocationInput, LocationService};
use crate::AppState;

pub async fn create_location(
    State(state): State<AppState>,
    Json(input): Json<CreateLocationInput>,
) -> AppResult<(StatusCode, Json<Location>)> {
    let service = LocationService::new(state.store.clone());
    let location = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn list_locations(State(state): State<AppState>) -> AppResult<Json<Vec<Location>>> {
    let service = LocationService::new(state.store.clone());
    let locations = service.list().await?;
    Ok(Json(locations))
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<Location>> {
    let service = LocationService::new(state.store.clone());
    let location = service.get(location_id).await?;
    Ok(Json(location))
}

/// Delete a location; its items become unassigned
pub async fn delete_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = LocationService::new(state.store.clone());
    service.delete(location_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
