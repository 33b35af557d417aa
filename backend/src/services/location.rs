//! Location directory referenced by items, transfers and orders

use std::sync::Arc;

use serde::Deserialize;
use shared::{Location, LocationType};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::Store;

#[derive(Clone)]
pub struct LocationService {
    store: Arc<dyn Store>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLocationInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub location_type: LocationType,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

impl LocationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: CreateLocationInput) -> AppResult<Location> {
        input.validate()?;

        let mut location = Location::new(input.name.trim(), input.location_type);
        location.address = input.address;

        let mut uow = self.store.begin().await?;
        uow.insert_location(&location).await?;
        uow.commit().await?;

        tracing::info!("Created location {} ({})", location.id, location.name);
        Ok(location)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Location> {
        let mut uow = self.store.begin().await?;
        uow.get_location(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Location".to_string()))
    }

    pub async fn list(&self) -> AppResult<Vec<Location>> {
        let mut uow = self.store.begin().await?;
        uow.list_locations().await
    }

    /// Delete a location; items stored there lose their location reference
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_location(id).await? {
            return Err(AppError::NotFound("Location".to_string()));
        }
        uow.commit().await?;

        tracing::info!("Deleted location {}", id);
        Ok(())
    }
}
