//! Transaction correlation
//!
//! Tracks which client connection is waiting on each `trans_id` and expires
//! transactions whose backend never answers.

mod router;
mod sweeper;

pub use router::{Transaction, TransactionRouter};
pub use sweeper::{TransactionSweeper, TIMEOUT_CODE};
