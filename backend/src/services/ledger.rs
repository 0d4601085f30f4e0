//! Stock ledger: the only path through which item stock changes
//!
//! Each application locks the item row, computes the new stock, persists it
//! and appends one immutable transaction row carrying the resulting stock,
//! all inside a single unit of work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    validate_amount, Item, ItemTransaction, NewItemTransaction, Pagination, StockBound,
    StockShortfall, TransactionFilter, TransactionKind,
};

use super::locking;
use crate::error::{AppError, AppResult};
use crate::store::{StockStore, UnitOfWork};

/// Input for applying one stock movement
#[derive(Debug, Clone)]
pub struct ApplyTransactionInput {
    pub item_id: Uuid,
    pub branch_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub note: String,
    /// Defaults to now
    pub transaction_date: Option<DateTime<Utc>>,
}

/// Stock ledger service
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn StockStore>,
}

impl StockLedger {
    /// Create a new StockLedger instance
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Apply one stock movement in its own unit of work
    pub async fn apply(&self, input: ApplyTransactionInput) -> AppResult<ItemTransaction> {
        validate_amount(input.amount).map_err(|m| AppError::validation("amount", m))?;

        let mut uow = self.store.begin().await?;
        let transaction = Self::apply_in(uow.as_mut(), &input).await?;
        uow.commit().await?;

        tracing::info!(
            "Applied {} of {} to item {} (branch {}), stock now {}",
            transaction.kind,
            transaction.amount,
            transaction.item_id,
            transaction.branch_id,
            transaction.current_stock
        );
        Ok(transaction)
    }

    /// Apply one stock movement inside a unit of work owned by the caller.
    ///
    /// Nothing is written when the movement would take stock below zero.
    pub async fn apply_in(
        uow: &mut dyn UnitOfWork,
        input: &ApplyTransactionInput,
    ) -> AppResult<ItemTransaction> {
        validate_amount(input.amount).map_err(|m| AppError::validation("amount", m))?;

        let item = locking::lock_item(uow, input.item_id, input.branch_id).await?;

        let new_stock = match input.kind.resulting_stock(item.stock, input.amount) {
            Ok(stock) => stock,
            Err(StockBound::BelowZero) => {
                tracing::warn!(
                    "Rejected {} of {} on item {} ({}): only {} in stock",
                    input.kind,
                    input.amount,
                    item.id,
                    item.code,
                    item.stock
                );
                return Err(AppError::InsufficientStock(vec![shortfall(
                    &item,
                    input.amount,
                    item.stock,
                )]));
            }
            Err(StockBound::AboveMaximum) => {
                tracing::warn!(
                    "Rejected {} of {} on item {} ({}): stock {} would exceed the column range",
                    input.kind,
                    input.amount,
                    item.id,
                    item.code,
                    item.stock
                );
                return Err(AppError::validation(
                    "amount",
                    "Resulting stock exceeds the largest storable quantity",
                ));
            }
        };

        uow.save_stock(item.id, new_stock).await?;

        let mut transaction = uow
            .insert_transaction(&NewItemTransaction {
                item_id: item.id,
                branch_id: input.branch_id,
                kind: input.kind,
                amount: input.amount,
                current_stock: new_stock,
                note: input.note.clone(),
                transaction_date: input.transaction_date.unwrap_or_else(Utc::now),
            })
            .await?;

        if transaction.item.is_none() {
            transaction.item = Some(item.summary());
        }
        Ok(transaction)
    }

    /// Page through ledger rows, newest first
    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<ItemTransaction>, u64)> {
        if let (Some(from), Some(to)) = (filter.from_date, filter.to_date) {
            if from > to {
                return Err(AppError::validation(
                    "from_date",
                    "from_date must not be after to_date",
                ));
            }
        }
        self.store.list_transactions(&filter, pagination).await
    }
}

pub(crate) fn shortfall(item: &Item, required: Decimal, available: Decimal) -> StockShortfall {
    StockShortfall {
        item_id: item.id,
        item_code: item.code.clone(),
        item_name: item.name.clone(),
        required,
        available,
    }
}
