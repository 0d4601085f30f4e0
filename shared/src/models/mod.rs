//! Domain models for the Stockroom inventory ledger

mod branch;
mod item;
mod recipe;
mod transaction;

pub use branch::*;
pub use item::*;
pub use recipe::*;
pub use transaction::*;
