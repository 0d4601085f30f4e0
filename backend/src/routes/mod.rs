//! Route definitions for the Stockroom API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Item catalogue and per-item ledger
        .nest("/items", item_routes())
        // Cross-branch transfers
        .route("/transfers", post(handlers::transfer_item))
        // Ledger queries across items
        .route("/transactions", get(handlers::list_transactions))
        // Recipe consumption
        .route("/recipes/:recipe_id/cook", post(handlers::cook_recipe))
}

/// Item routes
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route(
            "/:item_id",
            get(handlers::get_item)
                .patch(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .route(
            "/:item_id/transactions",
            get(handlers::list_item_transactions).post(handlers::apply_transaction),
        )
}
