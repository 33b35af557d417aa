//! Business logic services for the kitchen ledger
//!
//! Each service owns a handle to the [`Store`](crate::store::Store) and runs
//! every command inside one unit of work.

pub mod analytics;
pub mod costing;
pub mod ledger;
pub mod location;
pub mod procurement;
pub mod supplier;
pub mod transfer;

pub use analytics::AnalyticsService;
pub use costing::CostingService;
pub use ledger::LedgerService;
pub use location::LocationService;
pub use procurement::ProcurementService;
pub use supplier::SupplierService;
pub use transfer::TransferService;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{IdempotencyRecord, UnitOfWork};

/// Map a `shared::validation` result onto a field error
pub(crate) fn check(result: Result<(), &'static str>, field: &str) -> AppResult<()> {
    result.map_err(|message| AppError::validation(field, message))
}

/// Entity produced by an earlier run of `operation` under the same key
pub(crate) async fn replayed(
    uow: &mut dyn UnitOfWork,
    key: Option<&str>,
    operation: &str,
) -> AppResult<Option<Uuid>> {
    match key {
        Some(key) => Ok(uow
            .find_idempotency(key, operation)
            .await?
            .map(|record| record.entity_id)),
        None => Ok(None),
    }
}

/// The key was stored for an `operation` with a different target or payload
pub(crate) fn key_reused(operation: &str) -> AppError {
    AppError::conflict(
        "Idempotency-Key",
        format!("key was already used for a different {} command", operation),
    )
}

/// Like [`replayed`], for commands aimed at one existing entity
pub(crate) async fn replayed_for(
    uow: &mut dyn UnitOfWork,
    key: Option<&str>,
    operation: &str,
    target: Uuid,
) -> AppResult<bool> {
    match replayed(uow, key, operation).await? {
        Some(entity_id) if entity_id == target => Ok(true),
        Some(_) => Err(key_reused(operation)),
        None => Ok(false),
    }
}

/// Record the key in the same unit of work as the effect it guards
pub(crate) async fn remember(
    uow: &mut dyn UnitOfWork,
    key: Option<&str>,
    operation: &str,
    entity_id: Uuid,
) -> AppResult<()> {
    if let Some(key) = key {
        uow.insert_idempotency(&IdempotencyRecord::new(key, operation, entity_id))
            .await?;
    }
    Ok(())
}
