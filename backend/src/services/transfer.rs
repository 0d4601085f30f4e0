//! Cross-branch transfers
//!
//! A transfer debits the item in the source branch and credits the item with
//! the same code in the destination branch, creating it when absent. Both
//! legs commit together or not at all.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    validate_amount, validate_transfer_branches, NewItem, TransactionKind, TransferResult,
};

use super::ledger::{shortfall, ApplyTransactionInput, StockLedger};
use super::locking;
use crate::error::{AppError, AppResult};
use crate::store::{StockStore, UnitOfWork};

/// Input for moving stock between branches. The ledger kinds are derived
/// from the direction, callers never pick them.
#[derive(Debug, Clone)]
pub struct TransferInput {
    pub item_id: Uuid,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub amount: Decimal,
    pub note: String,
}

/// Transfer coordinator service
#[derive(Clone)]
pub struct TransferCoordinator {
    store: Arc<dyn StockStore>,
}

impl TransferCoordinator {
    /// Create a new TransferCoordinator instance
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Move `amount` of an item from one branch to another
    pub async fn transfer(&self, input: TransferInput) -> AppResult<TransferResult> {
        validate_transfer_branches(input.from_branch_id, input.to_branch_id)
            .map_err(|m| AppError::validation("to_branch_id", m))?;
        validate_amount(input.amount).map_err(|m| AppError::validation("amount", m))?;

        let mut uow = self.store.begin().await?;
        let result = Self::transfer_within(uow.as_mut(), &input).await?;
        uow.commit().await?;

        tracing::info!(
            "Transferred {} of item {} from branch {} to branch {} (source stock {}, destination stock {})",
            input.amount,
            result.transfer_out.item_id,
            input.from_branch_id,
            input.to_branch_id,
            result.transfer_out.current_stock,
            result.transfer_in.current_stock
        );
        Ok(result)
    }

    async fn transfer_within(
        uow: &mut dyn UnitOfWork,
        input: &TransferInput,
    ) -> AppResult<TransferResult> {
        // Resolve both rows before locking so locks are taken in id order
        let peeked = uow.peek_item(input.item_id, input.from_branch_id).await?;
        let destination_id = uow
            .find_item_id_by_code(&peeked.code, input.to_branch_id)
            .await?;

        let mut keys = vec![(peeked.id, input.from_branch_id)];
        if let Some(id) = destination_id {
            keys.push((id, input.to_branch_id));
        }
        let mut locked = locking::lock_items_in_order(uow, &keys).await?;

        let source = locked
            .remove(&peeked.id)
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;
        if source.code != peeked.code {
            return Err(AppError::ConcurrencyConflict(format!(
                "item {} changed code while the transfer was waiting for its lock",
                source.id
            )));
        }

        // Checked before anything is written, the destination may not exist yet
        if source.stock < input.amount {
            tracing::warn!(
                "Rejected transfer of {} for item {} ({}): only {} in stock",
                input.amount,
                source.id,
                source.code,
                source.stock
            );
            return Err(AppError::InsufficientStock(vec![shortfall(
                &source,
                input.amount,
                source.stock,
            )]));
        }

        let destination = match destination_id {
            Some(id) => {
                let destination = locked
                    .remove(&id)
                    .ok_or_else(|| AppError::NotFound("Item".to_string()))?;
                if destination.code != source.code {
                    return Err(AppError::ConcurrencyConflict(format!(
                        "item {} changed code while the transfer was waiting for its lock",
                        destination.id
                    )));
                }
                destination
            }
            None => {
                let created = uow
                    .insert_item(&NewItem {
                        branch_id: input.to_branch_id,
                        code: source.code.clone(),
                        name: source.name.clone(),
                        item_type: source.item_type.clone(),
                        unit: source.unit.clone(),
                        lead_time: source.lead_time,
                        opening_stock: Decimal::ZERO,
                    })
                    .await?;
                tracing::info!(
                    "Created item {} ({}) in branch {} for incoming transfer",
                    created.id,
                    created.code,
                    created.branch_id
                );
                created
            }
        };

        let transaction_date = Some(Utc::now());
        let transfer_out = StockLedger::apply_in(
            uow,
            &ApplyTransactionInput {
                item_id: source.id,
                branch_id: input.from_branch_id,
                kind: TransactionKind::TransferOut,
                amount: input.amount,
                note: input.note.clone(),
                transaction_date,
            },
        )
        .await?;
        let transfer_in = StockLedger::apply_in(
            uow,
            &ApplyTransactionInput {
                item_id: destination.id,
                branch_id: input.to_branch_id,
                kind: TransactionKind::TransferIn,
                amount: input.amount,
                note: input.note.clone(),
                transaction_date,
            },
        )
        .await?;

        Ok(TransferResult {
            transfer_out,
            transfer_in,
        })
    }
}
