//! Shared types and models for the kitchen inventory ledger
//!
//! Domain models, workflow state machines and pure costing/analytics
//! formulas. Nothing in this crate performs I/O.

pub mod category;
pub mod display;
pub mod models;
pub mod types;
pub mod validation;

pub use category::*;
pub use display::*;
pub use models::*;
pub use types::*;
pub use validation::*;
