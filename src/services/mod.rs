//! Services Layer
//!
//! This module contains pure business logic extracted from HTTP handlers.
//! Services can be called directly or through Axum handlers.

pub mod activity;
pub mod inventory_service;

// Re-export for convenience
pub use activity::{ActivityTracker, OperationKind, OperationReport, OperationStatus};
pub use inventory_service::*;
