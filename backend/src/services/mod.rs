//! Business logic services for stock management

pub mod cook;
pub mod item;
pub mod ledger;
pub mod locking;
pub mod transfer;

pub use cook::RecipeConsumptionEngine;
pub use item::ItemService;
pub use ledger::{ApplyTransactionInput, StockLedger};
pub use transfer::{TransferCoordinator, TransferInput};
