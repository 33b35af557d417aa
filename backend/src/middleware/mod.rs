//! Request extractors shared by handlers

pub mod idempotency;

pub use idempotency::{IdempotencyKey, IDEMPOTENCY_HEADER};
