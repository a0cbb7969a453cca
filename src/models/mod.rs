pub mod borrow_record;
pub mod borrower;
pub mod tool;

pub use borrow_record::Entity as BorrowRecord;
pub use borrower::Entity as Borrower;
pub use tool::Entity as Tool;
