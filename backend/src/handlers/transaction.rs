//! HTTP handlers for stock ledger endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use shared::{ItemTransaction, PaginatedResponse, TransactionFilter, TransactionKind};

use crate::error::AppResult;
use crate::services::{ApplyTransactionInput, StockLedger};
use crate::AppState;

/// Body for recording a stock movement on an item
#[derive(Debug, Deserialize)]
pub struct ApplyTransactionRequest {
    pub branch_id: Uuid,
    /// One of the ledger kinds, checked before anything is locked
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    #[serde(default)]
    pub note: String,
    pub transaction_date: Option<DateTime<Utc>>,
}

/// Record a stock movement
pub async fn apply_transaction(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<ApplyTransactionRequest>,
) -> AppResult<(StatusCode, Json<ItemTransaction>)> {
    let kind: TransactionKind = input.kind.parse()?;
    let ledger = StockLedger::new(state.store);
    let transaction = ledger
        .apply(ApplyTransactionInput {
            item_id,
            branch_id: input.branch_id,
            kind,
            amount: input.amount,
            note: input.note,
            transaction_date: input.transaction_date,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Query parameters for listing ledger rows
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    pub item_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn list(
    state: AppState,
    query: ListTransactionsQuery,
) -> AppResult<Json<PaginatedResponse<ItemTransaction>>> {
    let kind = query
        .kind
        .as_deref()
        .map(str::parse::<TransactionKind>)
        .transpose()?;
    let pagination = super::pagination(&state, query.page, query.limit);
    let filter = TransactionFilter {
        item_id: query.item_id,
        branch_id: query.branch_id,
        kind,
        from_date: query.from_date,
        to_date: query.to_date,
    };

    let ledger = StockLedger::new(state.store);
    let (transactions, total) = ledger.list_transactions(filter, pagination).await?;
    Ok(Json(PaginatedResponse::new(transactions, pagination, total)))
}

/// List ledger rows across items, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> AppResult<Json<PaginatedResponse<ItemTransaction>>> {
    list(state, query).await
}

/// List ledger rows of one item, newest first
pub async fn list_item_transactions(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> AppResult<Json<PaginatedResponse<ItemTransaction>>> {
    list(
        state,
        ListTransactionsQuery {
            item_id: Some(item_id),
            ..query
        },
    )
    .await
}
