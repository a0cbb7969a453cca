//! Store access using SeaORM
//!
//! Every query is generic over `ConnectionTrait` so the services can run
//! the same calls on the pool or inside a transaction.

pub mod borrow_record_repository;
pub mod borrower_repository;
pub mod tool_repository;
