//! Domain models for the kitchen inventory ledger

mod analytics;
mod costing;
mod inventory;
mod location;
mod procurement;
mod supplier;
mod transfer;

pub use analytics::*;
pub use costing::*;
pub use inventory::*;
pub use location::*;
pub use procurement::*;
pub use supplier::*;
pub use transfer::*;
