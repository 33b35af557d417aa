//! HTTP handlers for waste, variance and financial periods

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    DateRange, Displayable, FinancialPeriod, TheoreticalUsage, VarianceRecord, VarianceType,
    WasteCategory, WasteLog,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::IdempotencyKey;
use crate::services::analytics::{
    AnalyticsService, ClosePeriodInput, LogWasteInput, RecipeSale, RecordVarianceInput,
};
use crate::AppState;

fn service(state: &AppState) -> AnalyticsService {
    AnalyticsService::new(state.store.clone(), state.config.ledger_policy())
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl RangeQuery {
    /// Both bounds, or neither
    fn range(&self) -> AppResult<Option<DateRange>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(Some(DateRange::new(start, end))),
            (None, None) => Ok(None),
            _ => Err(AppError::validation("end", "start and end must be given together")),
        }
    }

    fn required(&self) -> AppResult<DateRange> {
        self.range()?
            .ok_or_else(|| AppError::validation("start", "start and end are required"))
    }
}

#[derive(Debug, Serialize)]
pub struct WasteTotal {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_cost: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CategoryWaste {
    pub category: WasteCategory,
    pub label: &'static str,
    pub total_cost: Decimal,
}

#[derive(Debug, Serialize)]
pub struct UsageView {
    pub inventory_item_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub actual_usage: Decimal,
}

/// Variance record with its classification
#[derive(Debug, Serialize)]
pub struct VarianceView {
    #[serde(flatten)]
    pub record: VarianceRecord,
    pub variance_type: VarianceType,
}

impl From<VarianceRecord> for VarianceView {
    fn from(record: VarianceRecord) -> Self {
        Self {
            variance_type: record.variance_type(),
            record,
        }
    }
}

/// Closed period with its derived margins
#[derive(Debug, Serialize)]
pub struct PeriodView {
    #[serde(flatten)]
    pub period: FinancialPeriod,
    pub gross_profit: Decimal,
    pub gross_profit_margin: Decimal,
    pub is_on_target: bool,
    pub variance: Decimal,
}

impl From<FinancialPeriod> for PeriodView {
    fn from(period: FinancialPeriod) -> Self {
        Self {
            gross_profit: period.gross_profit(),
            gross_profit_margin: period.gross_profit_margin(),
            is_on_target: period.is_on_target(),
            variance: period.variance(),
            period,
        }
    }
}

/// Log waste, posting it to the ledger when linked to an item
pub async fn log_waste(
    State(state): State<AppState>,
    key: IdempotencyKey,
    Json(input): Json<LogWasteInput>,
) -> AppResult<(StatusCode, Json<WasteLog>)> {
    let log = service(&state).log_waste(input, key.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn list_waste_logs(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<Vec<WasteLog>>> {
    let logs = service(&state).list_waste_logs(query.range()?).await?;
    Ok(Json(logs))
}

pub async fn waste_total(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<WasteTotal>> {
    let range = query.required()?;
    let total_cost = service(&state).waste_total(range).await?;
    Ok(Json(WasteTotal {
        start: range.start,
        end: range.end,
        total_cost,
    }))
}

pub async fn waste_by_category(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<Vec<CategoryWaste>>> {
    let range = query.required()?;
    let report = service(&state).waste_by_category(range).await?;
    Ok(Json(
        report
            .into_iter()
            .map(|(category, total_cost)| CategoryWaste {
                category,
                label: category.label(),
                total_cost,
            })
            .collect(),
    ))
}

/// Expected ingredient usage for recipes sold
pub async fn theoretical_usage(
    State(state): State<AppState>,
    Json(sales): Json<Vec<RecipeSale>>,
) -> AppResult<Json<Vec<TheoreticalUsage>>> {
    let usage = service(&state).theoretical_usage(sales).await?;
    Ok(Json(usage))
}

pub async fn actual_usage(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<UsageView>> {
    let range = query.required()?;
    let actual_usage = service(&state).actual_usage(item_id, range).await?;
    Ok(Json(UsageView {
        inventory_item_id: item_id,
        start: range.start,
        end: range.end,
        actual_usage,
    }))
}

pub async fn record_variance(
    State(state): State<AppState>,
    Json(input): Json<RecordVarianceInput>,
) -> AppResult<(StatusCode, Json<VarianceView>)> {
    let record = service(&state).record_variance(input).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn list_variance_records(State(state): State<AppState>) -> AppResult<Json<Vec<VarianceView>>> {
    let records = service(&state).list_variance_records().await?;
    Ok(Json(records.into_iter().map(VarianceView::from).collect()))
}

pub async fn close_period(
    State(state): State<AppState>,
    Json(input): Json<ClosePeriodInput>,
) -> AppResult<(StatusCode, Json<PeriodView>)> {
    let period = service(&state).close_period(input).await?;
    Ok((StatusCode::CREATED, Json(period.into())))
}

pub async fn list_periods(State(state): State<AppState>) -> AppResult<Json<Vec<PeriodView>>> {
    let periods = service(&state).list_periods().await?;
    Ok(Json(periods.into_iter().map(PeriodView::from).collect()))
}
