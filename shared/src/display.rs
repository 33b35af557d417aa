//! Display metadata for enums shown to users
//!
//! Each enum has a static table of `(variant, DisplayMeta)` rows. Icons are SF
//! Symbol names and colors are plain color names; clients map them to their
//! own palette.

use serde::Serialize;

use crate::models::{
    AlertSeverity, MenuClass, PurchaseOrderStatus, TransactionType, TransferStatus, VarianceType,
    WasteCategory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayMeta {
    pub label: &'static str,
    pub icon: Option<&'static str>,
    pub color: Option<&'static str>,
}

const fn meta(label: &'static str, icon: Option<&'static str>, color: Option<&'static str>) -> DisplayMeta {
    DisplayMeta { label, icon, color }
}

const UNKNOWN: DisplayMeta = meta("Unknown", None, None);

/// Enums with a display table
pub trait Displayable: Copy + PartialEq + 'static {
    fn table() -> &'static [(Self, DisplayMeta)];

    fn display_meta(&self) -> DisplayMeta {
        Self::table()
            .iter()
            .find(|(variant, _)| variant == self)
            .map(|(_, m)| *m)
            .unwrap_or(UNKNOWN)
    }

    fn label(&self) -> &'static str {
        self.display_meta().label
    }
}

const TRANSACTION_TYPES: &[(TransactionType, DisplayMeta)] = &[
    (TransactionType::Purchase, meta("Purchase", Some("cart.fill.badge.plus"), Some("green"))),
    (TransactionType::Usage, meta("Usage", Some("minus.circle"), Some("orange"))),
    (TransactionType::Transfer, meta("Transfer", Some("arrow.left.arrow.right"), Some("blue"))),
    (TransactionType::Wastage, meta("Wastage", Some("trash"), Some("red"))),
    (TransactionType::Adjustment, meta("Adjustment", Some("slider.horizontal.3"), Some("gray"))),
    (TransactionType::Production, meta("Production", Some("fork.knife"), Some("purple"))),
    (TransactionType::Return, meta("Return", Some("arrow.uturn.backward"), Some("teal"))),
];

const TRANSFER_STATUSES: &[(TransferStatus, DisplayMeta)] = &[
    (TransferStatus::Pending, meta("Pending", None, Some("orange"))),
    (TransferStatus::Approved, meta("Approved", None, Some("blue"))),
    (TransferStatus::Rejected, meta("Rejected", None, Some("red"))),
    (TransferStatus::Completed, meta("Completed", None, Some("green"))),
    (TransferStatus::Cancelled, meta("Cancelled", None, Some("gray"))),
];

const PURCHASE_ORDER_STATUSES: &[(PurchaseOrderStatus, DisplayMeta)] = &[
    (PurchaseOrderStatus::Draft, meta("Draft", None, Some("gray"))),
    (PurchaseOrderStatus::Pending, meta("Pending Approval", None, Some("orange"))),
    (PurchaseOrderStatus::Approved, meta("Approved", None, Some("blue"))),
    (PurchaseOrderStatus::Ordered, meta("Ordered", None, Some("purple"))),
    (PurchaseOrderStatus::PartiallyReceived, meta("Partially Received", None, Some("yellow"))),
    (PurchaseOrderStatus::Delivered, meta("Delivered", None, Some("green"))),
    (PurchaseOrderStatus::Cancelled, meta("Cancelled", None, Some("red"))),
];

const WASTE_CATEGORIES: &[(WasteCategory, DisplayMeta)] = &[
    (WasteCategory::Spoilage, meta("Spoilage", Some("exclamationmark.triangle"), Some("red"))),
    (WasteCategory::Prep, meta("Prep Waste", Some("scissors"), Some("orange"))),
    (WasteCategory::Service, meta("Service Waste", Some("fork.knife"), Some("yellow"))),
    (WasteCategory::Overcooking, meta("Overcooking", Some("flame"), Some("red"))),
    (WasteCategory::PortionError, meta("Portion Error", Some("chart.bar"), Some("purple"))),
    (WasteCategory::ExpiredStock, meta("Expired Stock", Some("calendar.badge.exclamationmark"), Some("red"))),
    (WasteCategory::Contamination, meta("Contamination", Some("xmark.shield"), Some("red"))),
    (WasteCategory::Other, meta("Other", Some("questionmark.circle"), Some("gray"))),
];

const VARIANCE_TYPES: &[(VarianceType, DisplayMeta)] = &[
    (VarianceType::Overuse, meta("Over Usage", None, Some("red"))),
    (VarianceType::Underuse, meta("Under Usage", None, Some("blue"))),
    (VarianceType::None, meta("No Variance", None, Some("green"))),
];

const MENU_CLASSES: &[(MenuClass, DisplayMeta)] = &[
    (MenuClass::Star, meta("Star", None, Some("green"))),
    (MenuClass::Horse, meta("Horse", None, Some("yellow"))),
    (MenuClass::Puzzle, meta("Puzzle", None, Some("blue"))),
    (MenuClass::Dog, meta("Dog", None, Some("red"))),
];

const ALERT_SEVERITIES: &[(AlertSeverity, DisplayMeta)] = &[
    (AlertSeverity::Critical, meta("Out of Stock", None, Some("red"))),
    (AlertSeverity::High, meta("Low Stock", None, Some("orange"))),
    (AlertSeverity::Medium, meta("Below Par", None, Some("yellow"))),
];

impl Displayable for TransactionType {
    fn table() -> &'static [(Self, DisplayMeta)] {
        TRANSACTION_TYPES
    }
}

impl Displayable for TransferStatus {
    fn table() -> &'static [(Self, DisplayMeta)] {
        TRANSFER_STATUSES
    }
}

impl Displayable for PurchaseOrderStatus {
    fn table() -> &'static [(Self, DisplayMeta)] {
        PURCHASE_ORDER_STATUSES
    }
}

impl Displayable for WasteCategory {
    fn table() -> &'static [(Self, DisplayMeta)] {
        WASTE_CATEGORIES
    }
}

impl Displayable for VarianceType {
    fn table() -> &'static [(Self, DisplayMeta)] {
        VARIANCE_TYPES
    }
}

impl Displayable for MenuClass {
    fn table() -> &'static [(Self, DisplayMeta)] {
        MENU_CLASSES
    }
}

impl Displayable for AlertSeverity {
    fn table() -> &'static [(Self, DisplayMeta)] {
        ALERT_SEVERITIES
    }
}
