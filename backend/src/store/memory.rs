//! In-memory stock store.
//!
//! Intended for tests and local development. Mirrors the row-lock semantics
//! of the Postgres store: each item row has its own async mutex, lock waits
//! are bounded by the configured timeout, and writes are staged inside the
//! unit of work and only applied to the shared state on commit.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use uuid::Uuid;

use shared::{
    Branch, Item, ItemFilter, ItemPatch, ItemTransaction, NewItem, NewItemTransaction, Pagination,
    Recipe, RecipeIngredient, TransactionFilter,
};

use super::{StockStore, UnitOfWork};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct MemoryState {
    branches: HashMap<Uuid, Branch>,
    items: HashMap<Uuid, Item>,
    /// Soft-deleted items, kept so their ledger rows still resolve
    deleted_items: HashMap<Uuid, Item>,
    transactions: Vec<ItemTransaction>,
    recipes: HashMap<Uuid, Recipe>,
}

/// Shared, cloneable in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryStockStore {
    state: Arc<Mutex<MemoryState>>,
    row_locks: Arc<Mutex<HashMap<Uuid, Arc<RowMutex<()>>>>>,
    lock_timeout: Duration,
}

impl InMemoryStockStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            row_locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout,
        }
    }

    fn state(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }

    fn row_lock(&self, item_id: Uuid) -> AppResult<Arc<RowMutex<()>>> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| AppError::Internal("in-memory row lock table poisoned".to_string()))?;
        Ok(locks.entry(item_id).or_default().clone())
    }

    /// Register a branch
    pub fn seed_branch(&self, name: &str) -> AppResult<Branch> {
        let now = Utc::now();
        let branch = Branch {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: name.trim().to_lowercase().replace(' ', "-"),
            created_at: now,
            updated_at: now,
        };
        self.state()?.branches.insert(branch.id, branch.clone());
        Ok(branch)
    }

    /// Insert an item with an initial stock level, bypassing the ledger.
    /// Fixture loading only.
    pub fn seed_item(
        &self,
        branch_id: Uuid,
        code: &str,
        name: &str,
        unit: &str,
        stock: Decimal,
    ) -> AppResult<Item> {
        let mut state = self.state()?;
        if !state.branches.contains_key(&branch_id) {
            return Err(AppError::NotFound("Branch".to_string()));
        }
        if state
            .items
            .values()
            .any(|i| i.branch_id == branch_id && i.code == code)
        {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            branch_id,
            code: code.to_string(),
            name: name.to_string(),
            item_type: "raw".to_string(),
            unit: unit.to_string(),
            stock,
            lead_time: 0,
            created_at: now,
            updated_at: now,
        };
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    /// Insert a recipe. Each ingredient is `(item_id, quantity per serving)`.
    pub fn seed_recipe(
        &self,
        branch_id: Uuid,
        code: &str,
        name: &str,
        ingredients: &[(Uuid, Decimal)],
    ) -> AppResult<Recipe> {
        let mut state = self.state()?;
        let now = Utc::now();
        let recipe_id = Uuid::new_v4();
        let ingredients = ingredients
            .iter()
            .map(|(item_id, quantity)| {
                let item = state
                    .items
                    .get(item_id)
                    .ok_or_else(|| AppError::NotFound("Item".to_string()))?;
                Ok(RecipeIngredient {
                    id: Uuid::new_v4(),
                    recipe_id,
                    item_id: *item_id,
                    branch_id,
                    quantity: *quantity,
                    unit: item.unit.clone(),
                    item: None,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        let recipe = Recipe {
            id: recipe_id,
            branch_id,
            code: code.to_string(),
            name: name.to_string(),
            recipe_type: "finished".to_string(),
            description: String::new(),
            instructions: String::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
            ingredients,
        };
        state.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            guards: HashMap::new(),
            staged_items: HashMap::new(),
            staged_deletes: HashSet::new(),
            staged_transactions: Vec::new(),
        }))
    }

    async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        self.state()?
            .items
            .get(&item_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<Item>, u64)> {
        let mut items: Vec<Item> = self
            .state()?
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(items, pagination))
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<ItemTransaction>, u64)> {
        let state = self.state()?;
        let mut rows: Vec<ItemTransaction> = state
            .transactions
            .iter()
            .filter(|txn| filter.matches(txn))
            .map(|txn| {
                let mut txn = txn.clone();
                txn.item = state
                    .items
                    .get(&txn.item_id)
                    .or_else(|| state.deleted_items.get(&txn.item_id))
                    .map(Item::summary);
                txn
            })
            .collect();
        drop(state);

        rows.sort_by(|a, b| {
            b.transaction_date
                .cmp(&a.transaction_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(paginate(rows, pagination))
    }

    async fn ping(&self) -> AppResult<()> {
        self.state().map(|_| ())
    }
}

fn paginate<T>(rows: Vec<T>, pagination: Pagination) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(pagination.limit()).unwrap_or(usize::MAX);
    (rows.into_iter().skip(offset).take(limit).collect(), total)
}

/// Unit of work over [`InMemoryStockStore`]
pub struct MemoryUnitOfWork {
    store: InMemoryStockStore,
    guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    staged_items: HashMap<Uuid, Item>,
    staged_deletes: HashSet<Uuid>,
    staged_transactions: Vec<ItemTransaction>,
}

impl MemoryUnitOfWork {
    /// Own writes first, then committed state
    fn current_item(&self, item_id: Uuid) -> AppResult<Option<Item>> {
        if self.staged_deletes.contains(&item_id) {
            return Ok(None);
        }
        if let Some(item) = self.staged_items.get(&item_id) {
            return Ok(Some(item.clone()));
        }
        Ok(self.store.state()?.items.get(&item_id).cloned())
    }

    fn current_in_branch(&self, item_id: Uuid, branch_id: Uuid) -> AppResult<Item> {
        self.current_item(item_id)?
            .filter(|item| item.branch_id == branch_id)
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    fn find_code(&self, code: &str, branch_id: Uuid, except: Option<Uuid>) -> AppResult<Option<Uuid>> {
        let wanted = |item: &Item| {
            item.branch_id == branch_id && item.code == code && Some(item.id) != except
        };
        if let Some(item) = self.staged_items.values().find(|i| wanted(*i)) {
            return Ok(Some(item.id));
        }
        let state = self.store.state()?;
        Ok(state
            .items
            .values()
            .filter(|item| {
                !self.staged_items.contains_key(&item.id) && !self.staged_deletes.contains(&item.id)
            })
            .find(|item| wanted(*item))
            .map(|item| item.id))
    }

    fn locked(&self, item_id: Uuid) -> AppResult<Item> {
        if !self.guards.contains_key(&item_id) {
            return Err(AppError::Internal(format!(
                "item {} written without holding its row lock",
                item_id
            )));
        }
        self.current_item(item_id)?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_item(&mut self, item_id: Uuid, branch_id: Uuid) -> AppResult<Item> {
        if !self.guards.contains_key(&item_id) {
            self.current_in_branch(item_id, branch_id)?;

            let row = self.store.row_lock(item_id)?;
            let guard = tokio::time::timeout(self.store.lock_timeout, row.lock_owned())
                .await
                .map_err(|_| {
                    AppError::ConcurrencyConflict(format!(
                        "timed out waiting for row lock on item {}",
                        item_id
                    ))
                })?;
            self.guards.insert(item_id, guard);
        }

        // Committed state may have moved on while this unit of work waited
        self.current_in_branch(item_id, branch_id)
    }

    async fn peek_item(&mut self, item_id: Uuid, branch_id: Uuid) -> AppResult<Item> {
        self.current_in_branch(item_id, branch_id)
    }

    async fn find_item_id_by_code(
        &mut self,
        code: &str,
        branch_id: Uuid,
    ) -> AppResult<Option<Uuid>> {
        self.find_code(code, branch_id, None)
    }

    async fn insert_item(&mut self, new_item: &NewItem) -> AppResult<Item> {
        if !self.store.state()?.branches.contains_key(&new_item.branch_id) {
            return Err(AppError::NotFound("Branch".to_string()));
        }
        if self.find_code(&new_item.code, new_item.branch_id, None)?.is_some() {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }

        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            branch_id: new_item.branch_id,
            code: new_item.code.clone(),
            name: new_item.name.clone(),
            item_type: new_item.item_type.clone(),
            unit: new_item.unit.clone(),
            stock: Decimal::ZERO,
            lead_time: new_item.lead_time,
            created_at: now,
            updated_at: now,
        };
        let guard = self.store.row_lock(item.id)?.try_lock_owned().map_err(|_| {
            AppError::Internal(format!("fresh item {} already locked", item.id))
        })?;
        self.guards.insert(item.id, guard);
        self.staged_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item(&mut self, item_id: Uuid, patch: &ItemPatch) -> AppResult<Item> {
        let mut item = self.locked(item_id)?;
        if let Some(code) = &patch.code {
            if self.find_code(code, item.branch_id, Some(item_id))?.is_some() {
                return Err(AppError::DuplicateEntry("code".to_string()));
            }
        }
        patch.apply_to(&mut item);
        item.updated_at = Utc::now();
        self.staged_items.insert(item_id, item.clone());
        Ok(item)
    }

    async fn soft_delete_item(&mut self, item_id: Uuid) -> AppResult<()> {
        self.locked(item_id)?;
        self.staged_items.remove(&item_id);
        self.staged_deletes.insert(item_id);
        Ok(())
    }

    async fn save_stock(&mut self, item_id: Uuid, stock: Decimal) -> AppResult<()> {
        if stock < Decimal::ZERO {
            return Err(AppError::Internal(format!(
                "refusing to store negative stock for item {}",
                item_id
            )));
        }
        let mut item = self.locked(item_id)?;
        item.stock = stock;
        item.updated_at = Utc::now();
        self.staged_items.insert(item_id, item);
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        transaction: &NewItemTransaction,
    ) -> AppResult<ItemTransaction> {
        let item = self.current_item(transaction.item_id)?;
        let row = ItemTransaction {
            id: Uuid::new_v4(),
            item_id: transaction.item_id,
            branch_id: transaction.branch_id,
            kind: transaction.kind,
            amount: transaction.amount,
            current_stock: transaction.current_stock,
            note: transaction.note.clone(),
            transaction_date: transaction.transaction_date,
            created_at: Utc::now(),
            item: item.as_ref().map(Item::summary),
        };
        self.staged_transactions.push(row.clone());
        Ok(row)
    }

    async fn load_recipe(&mut self, recipe_id: Uuid) -> AppResult<Recipe> {
        let mut recipe = self
            .store
            .state()?
            .recipes
            .get(&recipe_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;
        for ingredient in &mut recipe.ingredients {
            ingredient.item = self.current_item(ingredient.item_id)?;
        }
        Ok(recipe)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        let mut state = this.store.state()?;

        for staged in this.staged_items.values() {
            let clash = state
                .items
                .values()
                .filter(|other| other.id != staged.id && !this.staged_deletes.contains(&other.id))
                .map(|other| this.staged_items.get(&other.id).unwrap_or(other))
                .any(|other| other.branch_id == staged.branch_id && other.code == staged.code);
            if clash {
                return Err(AppError::DuplicateEntry("code".to_string()));
            }
        }

        for item_id in &this.staged_deletes {
            if let Some(mut item) = state.items.remove(item_id) {
                item.updated_at = Utc::now();
                state.deleted_items.insert(item.id, item);
            }
        }
        state.items.extend(this.staged_items);
        state.transactions.extend(this.staged_transactions);
        Ok(())
    }
}
