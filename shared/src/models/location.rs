//! Storage location reference data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical storage location (kitchen, pantry, freezer, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub location_type: LocationType,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn new(name: impl Into<String>, location_type: LocationType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            location_type,
            address: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    Kitchen,
    Storage,
    Restaurant,
    Freezer,
    DryStorage,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Kitchen => "kitchen",
            LocationType::Storage => "storage",
            LocationType::Restaurant => "restaurant",
            LocationType::Freezer => "freezer",
            LocationType::DryStorage => "dry-storage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kitchen" => Some(LocationType::Kitchen),
            "storage" => Some(LocationType::Storage),
            "restaurant" => Some(LocationType::Restaurant),
            "freezer" => Some(LocationType::Freezer),
            "dry-storage" => Some(LocationType::DryStorage),
            _ => None,
        }
    }
}
