//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no SeaORM queries, no Axum).
//! Only read-model types, name rules and domain error types.

pub mod errors;
pub mod inventory;
pub mod validation;

pub use errors::{DomainError, Rejection};
pub use inventory::*;
