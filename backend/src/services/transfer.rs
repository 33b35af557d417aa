//! Stock transfers between locations
//!
//! `pending -> approved -> completed`, or `pending -> rejected`. Completing a
//! transfer posts the outbound and inbound ledger movements in the same unit of
//! work as the status change.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_positive_quantity, validate_transfer_locations, validate_unit_matches, InventoryItem,
    LedgerEntry, StockTransfer, TransactionType, TransferStatus, TransitionError,
};
use uuid::Uuid;
use validator::Validate;

use super::ledger::post_entry;
use super::{check, key_reused, remember, replayed, replayed_for};
use crate::error::{AppError, AppResult};
use crate::store::{Store, UnitOfWork};

const OP_REQUEST: &str = "transfer.request";
const OP_APPROVE: &str = "transfer.approve";
const OP_COMPLETE: &str = "transfer.complete";
const OP_REJECT: &str = "transfer.reject";

#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn Store>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestTransferInput {
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub ingredient_name: String,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    #[validate(length(max = 100))]
    pub requested_by: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApproveTransferInput {
    #[validate(length(min = 1, max = 100))]
    pub approved_by: String,
}

async fn load_transfer(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<StockTransfer> {
    uow.get_transfer(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))
}

/// Same route, ingredient and amount as the stored request
fn same_request(transfer: &StockTransfer, input: &RequestTransferInput) -> bool {
    transfer.from_location_id == input.from_location_id
        && transfer.to_location_id == input.to_location_id
        && transfer.ingredient_name.eq_ignore_ascii_case(input.ingredient_name.trim())
        && transfer.quantity == input.quantity
        && transfer.unit.eq_ignore_ascii_case(input.unit.trim())
}

fn rejected(id: Uuid, err: TransitionError) -> AppError {
    tracing::warn!("Transfer {}: {}", id, err);
    err.into()
}

impl TransferService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Open a pending transfer between two existing locations
    pub async fn request(
        &self,
        input: RequestTransferInput,
        idempotency_key: Option<&str>,
    ) -> AppResult<StockTransfer> {
        input.validate()?;
        check(validate_positive_quantity(input.quantity), "quantity")?;
        check(
            validate_transfer_locations(input.from_location_id, input.to_location_id),
            "to_location_id",
        )?;

        let mut uow = self.store.begin().await?;
        if let Some(id) = replayed(&mut *uow, idempotency_key, OP_REQUEST).await? {
            let transfer = load_transfer(&mut *uow, id).await?;
            if !same_request(&transfer, &input) {
                return Err(key_reused(OP_REQUEST));
            }
            tracing::warn!("Replayed transfer request for key {:?}", idempotency_key);
            return Ok(transfer);
        }

        for location_id in [input.from_location_id, input.to_location_id] {
            if uow.get_location(location_id).await?.is_none() {
                return Err(AppError::NotFound("Location".to_string()));
            }
        }

        // The source item may not be stocked yet; completion checks again.
        if let Some(source) = uow
            .find_item(input.ingredient_name.trim(), Some(input.from_location_id))
            .await?
        {
            check(validate_unit_matches(&input.unit, &source.unit), "unit")?;
        }

        let mut transfer = StockTransfer::new(
            input.from_location_id,
            input.to_location_id,
            input.ingredient_name.trim(),
            input.quantity,
            input.unit.trim(),
        );
        transfer.requested_by = input.requested_by;
        transfer.notes = input.notes;

        uow.insert_transfer(&transfer).await?;
        remember(&mut *uow, idempotency_key, OP_REQUEST, transfer.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Requested transfer {} of {} {} {}",
            transfer.id,
            transfer.quantity,
            transfer.unit,
            transfer.ingredient_name
        );
        Ok(transfer)
    }

    pub async fn approve(
        &self,
        id: Uuid,
        input: ApproveTransferInput,
        idempotency_key: Option<&str>,
    ) -> AppResult<StockTransfer> {
        input.validate()?;
        let approved_by = input.approved_by;
        self.transition(id, idempotency_key, OP_APPROVE, move |t| t.approve(approved_by))
            .await
    }

    pub async fn reject(&self, id: Uuid, idempotency_key: Option<&str>) -> AppResult<StockTransfer> {
        self.transition(id, idempotency_key, OP_REJECT, StockTransfer::reject)
            .await
    }

    /// Move the stock: debit the source item, credit the destination item.
    ///
    /// The destination item is created on first use with the source's unit
    /// cost. A missing source item is an error.
    pub async fn complete(&self, id: Uuid, idempotency_key: Option<&str>) -> AppResult<StockTransfer> {
        let mut uow = self.store.begin().await?;
        if replayed_for(&mut *uow, idempotency_key, OP_COMPLETE, id).await? {
            tracing::warn!("Replayed completion of transfer {}", id);
            return load_transfer(&mut *uow, id).await;
        }

        let mut transfer = load_transfer(&mut *uow, id).await?;
        transfer.complete().map_err(|e| rejected(id, e))?;

        let mut source = uow
            .find_item(&transfer.ingredient_name, Some(transfer.from_location_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Source inventory item".to_string()))?;
        check(validate_unit_matches(&transfer.unit, &source.unit), "unit")?;

        let mut destination = match uow
            .find_item(&transfer.ingredient_name, Some(transfer.to_location_id))
            .await?
        {
            Some(item) => {
                check(validate_unit_matches(&transfer.unit, &item.unit), "unit")?;
                item
            }
            None => {
                let mut item = InventoryItem::new(&source.ingredient_name, &source.unit);
                item.location_id = Some(transfer.to_location_id);
                item.unit_cost = source.unit_cost;
                item.par_level = source.par_level;
                item.reorder_point = source.reorder_point;
                uow.insert_item(&item).await?;
                tracing::info!(
                    "Created inventory item {} for {} at location {}",
                    item.id,
                    item.ingredient_name,
                    transfer.to_location_id
                );
                item
            }
        };

        let unit_cost = source.unit_cost;
        let notes = format!("Transfer {}", transfer.id);
        post_entry(
            &mut *uow,
            &mut source,
            LedgerEntry::new(TransactionType::Transfer, -transfer.quantity)
                .with_unit_cost(unit_cost)
                .with_reference(transfer.id)
                .with_notes(notes.clone()),
        )
        .await?;
        post_entry(
            &mut *uow,
            &mut destination,
            LedgerEntry::new(TransactionType::Transfer, transfer.quantity)
                .with_unit_cost(unit_cost)
                .with_reference(transfer.id)
                .with_notes(notes),
        )
        .await?;

        uow.update_transfer(&mut transfer).await?;
        remember(&mut *uow, idempotency_key, OP_COMPLETE, transfer.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Completed transfer {}: moved {} {} from item {} to item {}",
            transfer.id,
            transfer.quantity,
            transfer.unit,
            source.id,
            destination.id
        );
        Ok(transfer)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<StockTransfer> {
        let mut uow = self.store.begin().await?;
        load_transfer(&mut *uow, id).await
    }

    /// Transfers, newest first
    pub async fn list(&self, status: Option<TransferStatus>) -> AppResult<Vec<StockTransfer>> {
        let mut uow = self.store.begin().await?;
        uow.list_transfers(status).await
    }

    async fn transition<F>(
        &self,
        id: Uuid,
        idempotency_key: Option<&str>,
        operation: &str,
        action: F,
    ) -> AppResult<StockTransfer>
    where
        F: FnOnce(&mut StockTransfer) -> Result<(), TransitionError> + Send,
    {
        let mut uow = self.store.begin().await?;
        if replayed_for(&mut *uow, idempotency_key, operation, id).await? {
            tracing::warn!("Replayed {} of transfer {}", operation, id);
            return load_transfer(&mut *uow, id).await;
        }

        let mut transfer = load_transfer(&mut *uow, id).await?;
        action(&mut transfer).map_err(|e| rejected(id, e))?;
        uow.update_transfer(&mut transfer).await?;
        remember(&mut *uow, idempotency_key, operation, transfer.id).await?;
        uow.commit().await?;

        tracing::info!("Transfer {} is now {}", transfer.id, transfer.status.as_str());
        Ok(transfer)
    }
}
