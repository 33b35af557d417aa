//! Supplier directory, catalogue prices and delivery performance

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    preferred_offer, supplier_performance, validate_email, validate_positive_quantity,
    validate_price, validate_rating, PriceHistory, Supplier, SupplierIngredient,
    SupplierPerformance,
};
use uuid::Uuid;
use validator::Validate;

use super::check;
use crate::error::{AppError, AppResult};
use crate::store::{Store, UnitOfWork};

#[derive(Clone)]
pub struct SupplierService {
    store: Arc<dyn Store>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub contact_name: Option<String>,
    #[validate(length(max = 200))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub payment_terms: Option<String>,
    #[validate(length(max = 100))]
    pub delivery_schedule: Option<String>,
    pub rating: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub contact_name: Option<String>,
    #[validate(length(max = 200))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub payment_terms: Option<String>,
    #[validate(length(max = 100))]
    pub delivery_schedule: Option<String>,
    pub rating: Option<Decimal>,
    pub is_active: Option<bool>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddOfferInput {
    #[validate(length(min = 1, max = 200))]
    pub ingredient_name: String,
    #[validate(length(max = 100))]
    pub supplier_sku: Option<String>,
    pub unit_price: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    #[validate(range(min = 0, max = 365))]
    pub lead_time_days: Option<i32>,
    pub minimum_order_quantity: Option<Decimal>,
    #[validate(length(max = 100))]
    pub pack_size: Option<String>,
    #[serde(default)]
    pub is_preferred: bool,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePriceInput {
    pub unit_price: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Offer after a price update, with the history row it produced
#[derive(Debug, Clone, Serialize)]
pub struct PriceUpdate {
    pub offer: SupplierIngredient,
    pub history: Option<PriceHistory>,
}

fn check_contact(email: Option<&str>, rating: Option<Decimal>) -> AppResult<()> {
    if let Some(email) = email {
        check(validate_email(email), "email")?;
    }
    if let Some(rating) = rating {
        check(validate_rating(rating), "rating")?;
    }
    Ok(())
}

async fn load_supplier(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<Supplier> {
    uow.get_supplier(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
}

async fn load_offer(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<SupplierIngredient> {
    uow.get_supplier_ingredient(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier ingredient".to_string()))
}

impl SupplierService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_supplier(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;
        check_contact(input.email.as_deref(), input.rating)?;

        let mut supplier = Supplier::new(input.name.trim());
        supplier.contact_name = input.contact_name;
        supplier.email = input.email;
        supplier.phone = input.phone;
        supplier.address = input.address;
        supplier.payment_terms = input.payment_terms;
        supplier.delivery_schedule = input.delivery_schedule;
        supplier.rating = input.rating.unwrap_or(Decimal::ZERO);
        supplier.notes = input.notes;

        let mut uow = self.store.begin().await?;
        uow.insert_supplier(&supplier).await?;
        uow.commit().await?;

        tracing::info!("Created supplier {} ({})", supplier.id, supplier.name);
        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: Uuid) -> AppResult<Supplier> {
        let mut uow = self.store.begin().await?;
        load_supplier(&mut *uow, id).await
    }

    /// Suppliers by name
    pub async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let mut uow = self.store.begin().await?;
        uow.list_suppliers().await
    }

    pub async fn update_supplier(&self, id: Uuid, input: UpdateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;
        check_contact(input.email.as_deref(), input.rating)?;

        let mut uow = self.store.begin().await?;
        let mut supplier = load_supplier(&mut *uow, id).await?;

        if let Some(name) = input.name {
            supplier.name = name.trim().to_string();
        }
        if input.contact_name.is_some() {
            supplier.contact_name = input.contact_name;
        }
        if input.email.is_some() {
            supplier.email = input.email;
        }
        if input.phone.is_some() {
            supplier.phone = input.phone;
        }
        if input.address.is_some() {
            supplier.address = input.address;
        }
        if input.payment_terms.is_some() {
            supplier.payment_terms = input.payment_terms;
        }
        if input.delivery_schedule.is_some() {
            supplier.delivery_schedule = input.delivery_schedule;
        }
        if let Some(rating) = input.rating {
            supplier.rating = rating;
        }
        if let Some(is_active) = input.is_active {
            supplier.is_active = is_active;
        }
        if input.notes.is_some() {
            supplier.notes = input.notes;
        }

        uow.update_supplier(&supplier).await?;
        uow.commit().await?;

        tracing::info!("Updated supplier {}", supplier.id);
        Ok(supplier)
    }

    /// Remove a supplier and its catalogue. Orders keep their lines but lose
    /// the supplier reference.
    pub async fn delete_supplier(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_supplier(id).await? {
            return Err(AppError::NotFound("Supplier".to_string()));
        }
        uow.commit().await?;

        tracing::info!("Deleted supplier {}", id);
        Ok(())
    }

    pub async fn add_offer(&self, supplier_id: Uuid, input: AddOfferInput) -> AppResult<SupplierIngredient> {
        input.validate()?;
        check(validate_price(input.unit_price), "unit_price")?;
        if let Some(minimum) = input.minimum_order_quantity {
            check(validate_positive_quantity(minimum), "minimum_order_quantity")?;
        }

        let mut uow = self.store.begin().await?;
        load_supplier(&mut *uow, supplier_id).await?;

        let mut offer = SupplierIngredient::new(
            supplier_id,
            input.ingredient_name.trim(),
            input.unit_price,
            input.unit.trim(),
        );
        offer.supplier_sku = input.supplier_sku;
        if let Some(days) = input.lead_time_days {
            offer.lead_time_days = days;
        }
        if let Some(minimum) = input.minimum_order_quantity {
            offer.minimum_order_quantity = minimum;
        }
        offer.pack_size = input.pack_size;
        offer.is_preferred = input.is_preferred;
        offer.notes = input.notes;

        uow.insert_supplier_ingredient(&offer).await?;
        uow.commit().await?;

        tracing::info!(
            "Supplier {} now offers {} at {} per {}",
            supplier_id,
            offer.ingredient_name,
            offer.unit_price,
            offer.unit
        );
        Ok(offer)
    }

    pub async fn get_offer(&self, id: Uuid) -> AppResult<SupplierIngredient> {
        let mut uow = self.store.begin().await?;
        load_offer(&mut *uow, id).await
    }

    /// Catalogue entries, optionally for one supplier
    pub async fn list_offers(&self, supplier_id: Option<Uuid>) -> AppResult<Vec<SupplierIngredient>> {
        let mut uow = self.store.begin().await?;
        uow.list_supplier_ingredients(supplier_id).await
    }

    /// Change an offer's price; an unchanged price records no history
    pub async fn update_price(&self, offer_id: Uuid, input: UpdatePriceInput) -> AppResult<PriceUpdate> {
        input.validate()?;
        check(validate_price(input.unit_price), "unit_price")?;

        let mut uow = self.store.begin().await?;
        let mut offer = load_offer(&mut *uow, offer_id).await?;
        let history = offer.update_price(input.unit_price, input.notes);

        match &history {
            Some(change) => {
                uow.update_supplier_ingredient(&offer).await?;
                uow.insert_price_history(change).await?;
                uow.commit().await?;
                tracing::info!(
                    "Price of {} changed from {} to {} ({}%)",
                    offer.ingredient_name,
                    change.old_price,
                    change.new_price,
                    change.change_percentage.round_dp(2)
                );
            }
            None => tracing::debug!("Price of {} unchanged", offer.ingredient_name),
        }

        Ok(PriceUpdate { offer, history })
    }

    /// Price changes for an offer, oldest first
    pub async fn price_history(&self, offer_id: Uuid) -> AppResult<Vec<PriceHistory>> {
        let mut uow = self.store.begin().await?;
        load_offer(&mut *uow, offer_id).await?;
        uow.list_price_history(offer_id).await
    }

    pub async fn performance(&self, supplier_id: Uuid) -> AppResult<SupplierPerformance> {
        let mut uow = self.store.begin().await?;
        load_supplier(&mut *uow, supplier_id).await?;
        let orders = uow.list_purchase_orders(None).await?;
        Ok(supplier_performance(supplier_id, &orders))
    }

    /// The offer to buy an ingredient from: preferred first, then cheapest.
    /// Inactive suppliers are skipped.
    pub async fn preferred_offer(&self, ingredient_name: &str) -> AppResult<SupplierIngredient> {
        let mut uow = self.store.begin().await?;
        let active: Vec<Uuid> = uow
            .list_suppliers()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .map(|s| s.id)
            .collect();
        let offers: Vec<SupplierIngredient> = uow
            .list_supplier_ingredients(None)
            .await?
            .into_iter()
            .filter(|o| active.contains(&o.supplier_id))
            .collect();

        tracing::debug!("Choosing among {} offers for {}", offers.len(), ingredient_name);
        preferred_offer(&offers, ingredient_name.trim())
            .cloned()
            .ok_or_else(|| AppError::NotFound("Supplier ingredient".to_string()))
    }
}
