//! HTTP handlers for cross-branch transfers

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use shared::TransferResult;

use crate::error::AppResult;
use crate::services::{TransferCoordinator, TransferInput};
use crate::AppState;

/// Body for a transfer request
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub item_id: Uuid,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub note: String,
}

/// Move stock of an item between branches
pub async fn transfer_item(
    State(state): State<AppState>,
    Json(input): Json<TransferRequest>,
) -> AppResult<(StatusCode, Json<TransferResult>)> {
    let coordinator = TransferCoordinator::new(state.store);
    let result = coordinator
        .transfer(TransferInput {
            item_id: input.item_id,
            from_branch_id: input.from_branch_id,
            to_branch_id: input.to_branch_id,
            amount: input.amount,
            note: input.note,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}
