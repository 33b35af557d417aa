//! Waste, variance and period accounting
//!
//! Read-only derivations over ledger data. Records built here are stored as
//! history; none of them change inventory quantities.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{percentage_of, DateRange};

/// Default acceptable variance, in percent
pub const DEFAULT_VARIANCE_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteCategory {
    Spoilage,
    Prep,
    Service,
    Overcooking,
    PortionError,
    ExpiredStock,
    Contamination,
    Other,
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 8] = [
        WasteCategory::Spoilage,
        WasteCategory::Prep,
        WasteCategory::Service,
        WasteCategory::Overcooking,
        WasteCategory::PortionError,
        WasteCategory::ExpiredStock,
        WasteCategory::Contamination,
        WasteCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WasteCategory::Spoilage => "spoilage",
            WasteCategory::Prep => "prep",
            WasteCategory::Service => "service",
            WasteCategory::Overcooking => "overcooking",
            WasteCategory::PortionError => "portion_error",
            WasteCategory::ExpiredStock => "expired_stock",
            WasteCategory::Contamination => "contamination",
            WasteCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Append-only waste record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteLog {
    pub id: Uuid,
    pub ingredient_name: String,
    /// Set when the waste was also posted to the ledger
    pub inventory_item_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit: String,
    pub waste_category: WasteCategory,
    pub waste_reason: Option<String>,
    pub cost_impact: Decimal,
    pub timestamp: DateTime<Utc>,
    pub location_id: Option<Uuid>,
    pub logged_by: Option<String>,
    /// Recipe being produced when the waste occurred
    pub recipe_id: Option<Uuid>,
    pub notes: Option<String>,
}

pub fn total_waste_cost(logs: &[WasteLog], range: &DateRange) -> Decimal {
    logs.iter()
        .filter(|l| range.contains(l.timestamp))
        .map(|l| l.cost_impact)
        .sum()
}

/// Waste cost per category; only categories with rows in range appear
pub fn waste_by_category(logs: &[WasteLog], range: &DateRange) -> BTreeMap<WasteCategory, Decimal> {
    let mut report = BTreeMap::new();
    for log in logs.iter().filter(|l| range.contains(l.timestamp)) {
        *report.entry(log.waste_category).or_insert(Decimal::ZERO) += log.cost_impact;
    }
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarianceType {
    Overuse,
    Underuse,
    None,
}

impl VarianceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarianceType::Overuse => "overuse",
            VarianceType::Underuse => "underuse",
            VarianceType::None => "none",
        }
    }
}

/// Theoretical against actual usage of one ingredient over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceRecord {
    pub id: Uuid,
    pub ingredient_name: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub theoretical_usage: Decimal,
    pub actual_usage: Decimal,
    /// actual - theoretical
    pub variance: Decimal,
    pub variance_percentage: Decimal,
    pub unit: String,
    pub cost_impact: Decimal,
    pub is_acceptable: bool,
    pub acceptable_threshold: Decimal,
    pub investigation_notes: Option<String>,
    pub root_cause: Option<String>,
}

impl VarianceRecord {
    pub fn new(
        ingredient_name: impl Into<String>,
        period: DateRange,
        theoretical_usage: Decimal,
        actual_usage: Decimal,
        unit: impl Into<String>,
        unit_cost: Decimal,
        acceptable_threshold: Decimal,
    ) -> Self {
        let variance = actual_usage - theoretical_usage;
        let variance_percentage = percentage_of(variance, theoretical_usage).abs();

        Self {
            id: Uuid::new_v4(),
            ingredient_name: ingredient_name.into(),
            period_start: period.start,
            period_end: period.end,
            theoretical_usage,
            actual_usage,
            variance,
            variance_percentage,
            unit: unit.into(),
            cost_impact: variance.abs() * unit_cost,
            is_acceptable: variance_percentage <= acceptable_threshold,
            acceptable_threshold,
            investigation_notes: None,
            root_cause: None,
        }
    }

    pub fn variance_type(&self) -> VarianceType {
        if self.variance > Decimal::ZERO {
            VarianceType::Overuse
        } else if self.variance < Decimal::ZERO {
            VarianceType::Underuse
        } else {
            VarianceType::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 5] = [
        PeriodType::Daily,
        PeriodType::Weekly,
        PeriodType::Monthly,
        PeriodType::Quarterly,
        PeriodType::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Quarterly => "quarterly",
            PeriodType::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

/// Monetary inputs to a period close
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodFigures {
    pub total_revenue: Decimal,
    pub opening_inventory_value: Decimal,
    pub closing_inventory_value: Decimal,
    pub total_purchases: Decimal,
    pub total_waste_cost: Decimal,
}

/// Closed accounting period; COGS and food cost are fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub id: Uuid,
    pub period_type: PeriodType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub total_waste_cost: Decimal,
    pub total_purchases: Decimal,
    pub opening_inventory_value: Decimal,
    pub closing_inventory_value: Decimal,
    pub food_cost_percentage: Decimal,
    pub target_food_cost_percentage: Decimal,
    pub notes: Option<String>,
}

impl FinancialPeriod {
    pub fn new(
        period_type: PeriodType,
        range: DateRange,
        figures: PeriodFigures,
        target_food_cost_percentage: Decimal,
    ) -> Self {
        let total_cogs =
            figures.opening_inventory_value + figures.total_purchases - figures.closing_inventory_value;
        let food_cost_percentage = percentage_of(total_cogs, figures.total_revenue);

        Self {
            id: Uuid::new_v4(),
            period_type,
            start_date: range.start,
            end_date: range.end,
            total_revenue: figures.total_revenue,
            total_cogs,
            total_waste_cost: figures.total_waste_cost,
            total_purchases: figures.total_purchases,
            opening_inventory_value: figures.opening_inventory_value,
            closing_inventory_value: figures.closing_inventory_value,
            food_cost_percentage,
            target_food_cost_percentage,
            notes: None,
        }
    }

    pub fn gross_profit(&self) -> Decimal {
        self.total_revenue - self.total_cogs
    }

    pub fn gross_profit_margin(&self) -> Decimal {
        percentage_of(self.gross_profit(), self.total_revenue)
    }

    pub fn is_on_target(&self) -> bool {
        self.food_cost_percentage <= self.target_food_cost_percentage
    }

    /// Food cost percentage points above (positive) or below target
    pub fn variance(&self) -> Decimal {
        self.food_cost_percentage - self.target_food_cost_percentage
    }

    pub fn calculated_cogs(&self) -> Decimal {
        self.opening_inventory_value + self.total_purchases - self.closing_inventory_value
    }
}
