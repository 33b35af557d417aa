//! HTTP handlers
//!
//! Handlers stay thin: extract, build the service from [`AppState`](crate::AppState),
//! call it and wrap the result in JSON.

pub mod analytics;
pub mod costing;
pub mod health;
pub mod inventory;
pub mod location;
pub mod meta;
pub mod procurement;
pub mod supplier;
pub mod transfer;

pub use analytics::*;
pub use costing::*;
pub use health::*;
pub use inventory::*;
pub use location::*;
pub use meta::*;
pub use procurement::*;
pub use supplier::*;
pub use transfer::*;
