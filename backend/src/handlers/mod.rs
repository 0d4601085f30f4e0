//! HTTP handlers

pub mod health;
pub mod item;
pub mod recipe;
pub mod transaction;
pub mod transfer;

pub use health::health_check;
pub use item::{create_item, delete_item, get_item, list_items, update_item};
pub use recipe::cook_recipe;
pub use transaction::{apply_transaction, list_item_transactions, list_transactions};
pub use transfer::transfer_item;

use shared::Pagination;

use crate::AppState;

/// Page request built from `page`/`limit` query values and the ledger config
pub(crate) fn pagination(state: &AppState, page: Option<u32>, limit: Option<u32>) -> Pagination {
    Pagination::normalized(
        page,
        limit,
        state.config.ledger.default_page_size,
        state.config.ledger.max_page_size,
    )
}
