//! Item catalogue service
//!
//! Item metadata can be edited freely, stock cannot: opening stock is booked
//! through the ledger and every later change goes through a transaction.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    validate_item_patch, validate_new_item, Item, ItemFilter, ItemPatch, NewItem, Pagination,
    TransactionKind,
};

use super::ledger::{ApplyTransactionInput, StockLedger};
use super::locking;
use crate::error::{AppError, AppResult};
use crate::store::StockStore;

/// Item service
#[derive(Clone)]
pub struct ItemService {
    store: Arc<dyn StockStore>,
}

impl ItemService {
    /// Create a new ItemService instance
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Create an item, booking any opening stock as an `in` transaction
    pub async fn create_item(&self, input: NewItem) -> AppResult<Item> {
        validate_new_item(&input).map_err(|(field, m)| AppError::validation(field, m))?;

        let mut uow = self.store.begin().await?;
        let mut item = uow.insert_item(&input).await?;

        if input.opening_stock > Decimal::ZERO {
            let transaction = StockLedger::apply_in(
                uow.as_mut(),
                &ApplyTransactionInput {
                    item_id: item.id,
                    branch_id: item.branch_id,
                    kind: TransactionKind::In,
                    amount: input.opening_stock,
                    note: "Opening stock".to_string(),
                    transaction_date: None,
                },
            )
            .await?;
            item.stock = transaction.current_stock;
        }

        uow.commit().await?;

        tracing::info!(
            "Created item {} ({}) in branch {} with stock {}",
            item.id,
            item.code,
            item.branch_id,
            item.stock
        );
        Ok(item)
    }

    /// Get an item by ID
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        self.store.get_item(item_id).await
    }

    /// List items with pagination
    pub async fn list_items(
        &self,
        filter: ItemFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<Item>, u64)> {
        self.store.list_items(&filter, pagination).await
    }

    /// Update item metadata. Stock is not part of the patch.
    pub async fn update_item(
        &self,
        item_id: Uuid,
        branch_id: Uuid,
        patch: ItemPatch,
    ) -> AppResult<Item> {
        validate_item_patch(&patch).map_err(|(field, m)| AppError::validation(field, m))?;

        let mut uow = self.store.begin().await?;
        locking::lock_item(uow.as_mut(), item_id, branch_id).await?;
        let item = uow.update_item(item_id, &patch).await?;
        uow.commit().await?;

        tracing::info!("Updated item {} ({})", item.id, item.code);
        Ok(item)
    }

    /// Soft-delete an item. Its ledger rows are kept.
    pub async fn delete_item(&self, item_id: Uuid, branch_id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let item = locking::lock_item(uow.as_mut(), item_id, branch_id).await?;
        uow.soft_delete_item(item.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Deleted item {} ({}) in branch {} with stock {}",
            item.id,
            item.code,
            item.branch_id,
            item.stock
        );
        Ok(())
    }
}
