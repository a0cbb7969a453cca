//! Name normalization and the precondition checks shared by every mutation.

use super::errors::Rejection;

/// Stored form of a tool or borrower name: trimmed and lowercased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalize a name, rejecting it if nothing is left.
pub fn require_name(name: &str) -> Result<String, Rejection> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return Err(Rejection::EmptyName);
    }
    Ok(normalized)
}

pub fn require_stock(stock: i32) -> Result<i32, Rejection> {
    if stock < 0 {
        return Err(Rejection::NegativeStock(stock));
    }
    Ok(stock)
}

/// A borrow must fit in what is left on the shelf.
pub fn check_borrow_quantity(requested: u32, available: u64) -> Result<(), Rejection> {
    if requested == 0 {
        return Err(Rejection::ZeroQuantity);
    }
    if u64::from(requested) > available {
        return Err(Rejection::ExceedsAvailable {
            requested,
            available,
        });
    }
    Ok(())
}

/// A return must not exceed what the borrower holds for that tool.
pub fn check_return_quantity(requested: u32, borrowed: u64) -> Result<(), Rejection> {
    if requested == 0 {
        return Err(Rejection::ZeroQuantity);
    }
    if u64::from(requested) > borrowed {
        return Err(Rejection::ExceedsBorrowed {
            requested,
            borrowed,
        });
    }
    Ok(())
}
