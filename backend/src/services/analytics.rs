//! Waste logging, usage variance and financial period close
//!
//! Reports are computed from ledger transactions and waste logs. Only
//! [`AnalyticsService::log_waste`] can move stock, and only when the waste is
//! linked to an inventory item.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    theoretical_usage, total_inventory_value, total_waste_cost, validate_date_range,
    validate_non_negative_quantity, validate_positive_quantity, validate_price,
    validate_unit_matches, waste_by_category,
    DateRange, FinancialPeriod, InventoryTransaction, LedgerEntry, PeriodFigures, PeriodType,
    Recipe, TheoreticalUsage, TransactionType, VarianceRecord, WasteCategory, WasteLog,
};
use uuid::Uuid;
use validator::Validate;

use super::ledger::post_entry;
use super::{check, key_reused, remember, replayed};
use crate::config::LedgerPolicy;
use crate::error::{AppError, AppResult};
use crate::store::{Store, TransactionFilter, UnitOfWork};

const OP_LOG_WASTE: &str = "analytics.log_waste";

#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn Store>,
    policy: LedgerPolicy,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogWasteInput {
    #[validate(length(min = 1, max = 200))]
    pub ingredient_name: String,
    /// Also post a `wastage` movement against this item
    pub inventory_item_id: Option<Uuid>,
    /// Wasted amount as a positive magnitude
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    pub waste_category: WasteCategory,
    #[validate(length(max = 500))]
    pub waste_reason: Option<String>,
    /// Defaults to quantity times the linked item's unit cost
    pub cost_impact: Option<Decimal>,
    pub location_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub logged_by: Option<String>,
    pub recipe_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeSale {
    pub recipe_id: Uuid,
    pub portions_sold: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordVarianceInput {
    pub inventory_item_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub theoretical_usage: Decimal,
    /// Measured from the ledger when absent
    pub actual_usage: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub investigation_notes: Option<String>,
    #[validate(length(max = 500))]
    pub root_cause: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClosePeriodInput {
    pub period_type: PeriodType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_revenue: Decimal,
    pub opening_inventory_value: Decimal,
    /// Current inventory value when absent
    pub closing_inventory_value: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Quantity consumed by `usage` and `wastage` movements, as a positive number
fn consumed(transactions: &[InventoryTransaction]) -> Decimal {
    -transactions.iter().map(|t| t.quantity).sum::<Decimal>()
}

fn period(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<DateRange> {
    let range = DateRange::new(start, end);
    check(validate_date_range(&range), "period_end")?;
    Ok(range)
}

async fn load_waste_log(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<WasteLog> {
    uow.get_waste_log(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Waste log".to_string()))
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// Record waste; when linked to an item, the stock leaves the ledger in
    /// the same unit of work
    pub async fn log_waste(
        &self,
        input: LogWasteInput,
        idempotency_key: Option<&str>,
    ) -> AppResult<WasteLog> {
        input.validate()?;
        check(validate_positive_quantity(input.quantity), "quantity")?;
        if let Some(cost) = input.cost_impact {
            check(validate_price(cost), "cost_impact")?;
        }

        let mut uow = self.store.begin().await?;
        if let Some(id) = replayed(&mut *uow, idempotency_key, OP_LOG_WASTE).await? {
            let log = load_waste_log(&mut *uow, id).await?;
            if log.inventory_item_id != input.inventory_item_id
                || !log.ingredient_name.eq_ignore_ascii_case(input.ingredient_name.trim())
                || log.quantity != input.quantity
            {
                return Err(key_reused(OP_LOG_WASTE));
            }
            tracing::warn!("Replayed waste log for key {:?}", idempotency_key);
            return Ok(log);
        }

        let mut log = WasteLog {
            id: Uuid::new_v4(),
            ingredient_name: input.ingredient_name.trim().to_string(),
            inventory_item_id: input.inventory_item_id,
            quantity: input.quantity,
            unit: input.unit.trim().to_string(),
            waste_category: input.waste_category,
            waste_reason: input.waste_reason,
            cost_impact: input.cost_impact.unwrap_or(Decimal::ZERO),
            timestamp: Utc::now(),
            location_id: input.location_id,
            logged_by: input.logged_by,
            recipe_id: input.recipe_id,
            notes: input.notes,
        };

        if let Some(item_id) = input.inventory_item_id {
            let mut item = uow
                .get_item(item_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;
            check(validate_unit_matches(&log.unit, &item.unit), "unit")?;
            if input.cost_impact.is_none() {
                log.cost_impact = log.quantity * item.unit_cost;
            }
            if log.location_id.is_none() {
                log.location_id = item.location_id;
            }

            let mut entry = LedgerEntry::new(TransactionType::Wastage, -log.quantity)
                .with_reference(log.id)
                .with_notes(format!("Waste: {}", log.waste_category.as_str()));
            entry.user_id = log.logged_by.clone();
            post_entry(&mut *uow, &mut item, entry).await?;
        }

        uow.insert_waste_log(&log).await?;
        remember(&mut *uow, idempotency_key, OP_LOG_WASTE, log.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Logged {} {} of {} as {} waste (cost {})",
            log.quantity,
            log.unit,
            log.ingredient_name,
            log.waste_category.as_str(),
            log.cost_impact
        );
        Ok(log)
    }

    pub async fn list_waste_logs(&self, range: Option<DateRange>) -> AppResult<Vec<WasteLog>> {
        if let Some(range) = &range {
            check(validate_date_range(range), "end")?;
        }
        let mut uow = self.store.begin().await?;
        uow.list_waste_logs(range).await
    }

    pub async fn waste_total(&self, range: DateRange) -> AppResult<Decimal> {
        check(validate_date_range(&range), "end")?;
        let mut uow = self.store.begin().await?;
        let logs = uow.list_waste_logs(Some(range)).await?;
        Ok(total_waste_cost(&logs, &range))
    }

    /// Waste cost per category; categories without rows are left out
    pub async fn waste_by_category(&self, range: DateRange) -> AppResult<BTreeMap<WasteCategory, Decimal>> {
        check(validate_date_range(&range), "end")?;
        let mut uow = self.store.begin().await?;
        let logs = uow.list_waste_logs(Some(range)).await?;
        Ok(waste_by_category(&logs, &range))
    }

    /// Expected ingredient consumption for the portions sold
    pub async fn theoretical_usage(&self, sales: Vec<RecipeSale>) -> AppResult<Vec<TheoreticalUsage>> {
        for sale in &sales {
            check(validate_non_negative_quantity(sale.portions_sold), "portions_sold")?;
        }

        let mut uow = self.store.begin().await?;
        let mut recipes: Vec<(Recipe, Decimal)> = Vec::with_capacity(sales.len());
        for sale in sales {
            let recipe = uow
                .get_recipe(sale.recipe_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;
            recipes.push((recipe, sale.portions_sold));
        }

        let pairs: Vec<(&Recipe, Decimal)> = recipes.iter().map(|(r, n)| (r, *n)).collect();
        Ok(theoretical_usage(&pairs))
    }

    /// Stock an item consumed through usage and wastage within the range
    pub async fn actual_usage(&self, item_id: Uuid, range: DateRange) -> AppResult<Decimal> {
        check(validate_date_range(&range), "end")?;
        let mut uow = self.store.begin().await?;
        if uow.get_item(item_id).await?.is_none() {
            return Err(AppError::NotFound("Inventory item".to_string()));
        }
        let transactions = uow
            .list_transactions(
                &TransactionFilter::for_item(item_id)
                    .of_types(&[TransactionType::Usage, TransactionType::Wastage])
                    .within(range),
            )
            .await?;
        Ok(consumed(&transactions))
    }

    /// Compare expected and actual usage of an item and keep the result
    pub async fn record_variance(&self, input: RecordVarianceInput) -> AppResult<VarianceRecord> {
        input.validate()?;
        check(validate_non_negative_quantity(input.theoretical_usage), "theoretical_usage")?;
        if let Some(actual) = input.actual_usage {
            check(validate_non_negative_quantity(actual), "actual_usage")?;
        }
        let range = period(input.period_start, input.period_end)?;

        let mut uow = self.store.begin().await?;
        let item = uow
            .get_item(input.inventory_item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;

        let actual = match input.actual_usage {
            Some(actual) => actual,
            None => {
                let transactions = uow
                    .list_transactions(
                        &TransactionFilter::for_item(item.id)
                            .of_types(&[TransactionType::Usage, TransactionType::Wastage])
                            .within(range),
                    )
                    .await?;
                consumed(&transactions)
            }
        };

        let mut record = VarianceRecord::new(
            &item.ingredient_name,
            range,
            input.theoretical_usage,
            actual,
            &item.unit,
            item.unit_cost,
            self.policy.variance_threshold_percent,
        );
        record.investigation_notes = input.investigation_notes;
        record.root_cause = input.root_cause;

        uow.insert_variance_record(&record).await?;
        uow.commit().await?;

        if record.is_acceptable {
            tracing::info!(
                "Variance for {}: {} {} ({}%)",
                record.ingredient_name,
                record.variance,
                record.unit,
                record.variance_percentage.round_dp(2)
            );
        } else {
            tracing::warn!(
                "Variance for {} outside {}%: {} {} ({}%, {})",
                record.ingredient_name,
                record.acceptable_threshold,
                record.variance,
                record.unit,
                record.variance_percentage.round_dp(2),
                record.variance_type().as_str()
            );
        }
        Ok(record)
    }

    pub async fn list_variance_records(&self) -> AppResult<Vec<VarianceRecord>> {
        let mut uow = self.store.begin().await?;
        uow.list_variance_records().await
    }

    /// Close an accounting period from ledger purchases and waste logs
    pub async fn close_period(&self, input: ClosePeriodInput) -> AppResult<FinancialPeriod> {
        input.validate()?;
        check(validate_price(input.total_revenue), "total_revenue")?;
        check(validate_price(input.opening_inventory_value), "opening_inventory_value")?;
        if let Some(closing) = input.closing_inventory_value {
            check(validate_price(closing), "closing_inventory_value")?;
        }
        let range = period(input.start_date, input.end_date)?;

        let mut uow = self.store.begin().await?;
        let purchases = uow
            .list_transactions(
                &TransactionFilter::default()
                    .of_types(&[TransactionType::Purchase])
                    .within(range),
            )
            .await?;
        let waste = uow.list_waste_logs(Some(range)).await?;
        let closing_inventory_value = match input.closing_inventory_value {
            Some(value) => value,
            None => total_inventory_value(&uow.list_items(None).await?),
        };

        let figures = PeriodFigures {
            total_revenue: input.total_revenue,
            opening_inventory_value: input.opening_inventory_value,
            closing_inventory_value,
            total_purchases: purchases.iter().map(InventoryTransaction::total_cost).sum(),
            total_waste_cost: total_waste_cost(&waste, &range),
        };
        let mut period = FinancialPeriod::new(
            input.period_type,
            range,
            figures,
            self.policy.target_food_cost_percent,
        );
        period.notes = input.notes;

        uow.insert_financial_period(&period).await?;
        uow.commit().await?;

        tracing::info!(
            "Closed {} period {} to {}: COGS {}, food cost {}% (target {}%)",
            period.period_type.as_str(),
            period.start_date,
            period.end_date,
            period.total_cogs,
            period.food_cost_percentage.round_dp(2),
            period.target_food_cost_percentage
        );
        Ok(period)
    }

    pub async fn list_periods(&self) -> AppResult<Vec<FinancialPeriod>> {
        let mut uow = self.store.begin().await?;
        uow.list_financial_periods().await
    }
}
