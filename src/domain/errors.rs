//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use std::fmt;

/// A precondition the inventory refuses to proceed without.
///
/// Callers get one of these back instead of a partially applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Tool or borrower name is blank after trimming
    EmptyName,
    /// Stock must be zero or more
    NegativeStock(i32),
    /// Borrow and return move at least one unit
    ZeroQuantity,
    /// Borrowing more units than are on the shelf
    ExceedsAvailable { requested: u32, available: u64 },
    /// Returning more units than the borrower holds for that tool
    ExceedsBorrowed { requested: u32, borrowed: u64 },
    /// Another tool already uses this name (compared lowercased)
    DuplicateName(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyName => write!(f, "name must not be empty"),
            Rejection::NegativeStock(stock) => {
                write!(f, "stock must be zero or more, got {}", stock)
            }
            Rejection::ZeroQuantity => write!(f, "quantity must be at least 1"),
            Rejection::ExceedsAvailable {
                requested,
                available,
            } => write!(
                f,
                "cannot borrow {} unit(s), only {} available",
                requested, available
            ),
            Rejection::ExceedsBorrowed {
                requested,
                borrowed,
            } => write!(
                f,
                "cannot return {} unit(s), borrower holds {}",
                requested, borrowed
            ),
            Rejection::DuplicateName(name) => {
                write!(f, "a tool named '{}' already exists", name)
            }
        }
    }
}

#[derive(Debug)]
pub enum DomainError {
    /// Resource not found
    NotFound,
    /// Precondition failed before anything was written
    Rejected(Rejection),
    /// Database/persistence error
    Database(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::NotFound => write!(f, "Resource not found"),
            DomainError::Rejected(rejection) => write!(f, "Rejected: {}", rejection),
            DomainError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<Rejection> for DomainError {
    fn from(rejection: Rejection) -> Self {
        DomainError::Rejected(rejection)
    }
}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Database(e.to_string())
    }
}
