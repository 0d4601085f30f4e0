//! Persistence capabilities used by the stock services
//!
//! The services never talk to a concrete database. They open a
//! [`UnitOfWork`] from a [`StockStore`], lock the rows they are about to
//! mutate, stage writes and commit. Dropping a unit of work without calling
//! [`UnitOfWork::commit`] rolls everything back.

use axum::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    Item, ItemFilter, ItemPatch, ItemTransaction, NewItem, NewItemTransaction, Pagination, Recipe,
    TransactionFilter,
};

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStockStore;
pub use postgres::PgStockStore;

/// Entry point to the transactional store
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Committed state of one item
    async fn get_item(&self, item_id: Uuid) -> AppResult<Item>;

    /// Page of items and the total number of matches
    async fn list_items(
        &self,
        filter: &ItemFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<Item>, u64)>;

    /// Page of ledger rows, newest first, and the total number of matches.
    /// Rows carry their item relation.
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<ItemTransaction>, u64)>;

    /// Liveness check for the health endpoint
    async fn ping(&self) -> AppResult<()>;
}

/// One atomic, all-or-nothing sequence of reads and writes.
///
/// Row locks taken through [`UnitOfWork::lock_item`] are held until the unit
/// of work commits or is dropped.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Load an item for update, blocking while another unit of work holds
    /// its row lock. Fails with `NotFound` when no live row matches
    /// `(item_id, branch_id)` and with `ConcurrencyConflict` when the lock
    /// wait times out. Locking a row this unit of work already holds returns
    /// its current (possibly staged) state.
    async fn lock_item(&mut self, item_id: Uuid, branch_id: Uuid) -> AppResult<Item>;

    /// Read an item without locking it
    async fn peek_item(&mut self, item_id: Uuid, branch_id: Uuid) -> AppResult<Item>;

    /// Id of the live item with `code` in `branch_id`, if any
    async fn find_item_id_by_code(&mut self, code: &str, branch_id: Uuid)
        -> AppResult<Option<Uuid>>;

    /// Insert a new item with zero stock. The new row is locked by this
    /// unit of work. Opening stock is booked separately through the ledger.
    async fn insert_item(&mut self, item: &NewItem) -> AppResult<Item>;

    /// Apply a metadata patch to an item locked by this unit of work
    async fn update_item(&mut self, item_id: Uuid, patch: &ItemPatch) -> AppResult<Item>;

    /// Soft-delete an item locked by this unit of work. Its ledger rows stay;
    /// the item itself stops resolving for reads, locks and code lookups.
    async fn soft_delete_item(&mut self, item_id: Uuid) -> AppResult<()>;

    /// Persist a new stock value on an item locked by this unit of work
    async fn save_stock(&mut self, item_id: Uuid, stock: Decimal) -> AppResult<()>;

    /// Append a ledger row
    async fn insert_transaction(
        &mut self,
        transaction: &NewItemTransaction,
    ) -> AppResult<ItemTransaction>;

    /// Load a recipe with its ingredients and each ingredient's item
    async fn load_recipe(&mut self, recipe_id: Uuid) -> AppResult<Recipe>;

    /// Make every staged write visible and release all row locks
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
