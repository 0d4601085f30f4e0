//! PostgreSQL stock store built on sqlx transactions.
//!
//! Row locks map to `SELECT ... FOR UPDATE`; the lock wait is bounded per
//! unit of work with `SET LOCAL lock_timeout`.

use std::collections::HashSet;
use std::time::Duration;

use axum::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    Item, ItemFilter, ItemPatch, ItemRef, ItemTransaction, NewItem, NewItemTransaction, Pagination,
    Recipe, RecipeIngredient, TransactionFilter, TransactionKind,
};

use super::{StockStore, UnitOfWork};
use crate::error::{AppError, AppResult};

const ITEM_COLUMNS: &str =
    "id, branch_id, code, name, type AS item_type, unit, stock, lead_time, created_at, updated_at";

/// Stock store backed by a Postgres connection pool
#[derive(Clone)]
pub struct PgStockStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStockStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    branch_id: Uuid,
    code: String,
    name: String,
    item_type: String,
    unit: String,
    stock: Decimal,
    lead_time: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            branch_id: row.branch_id,
            code: row.code,
            name: row.name,
            item_type: row.item_type,
            unit: row.unit,
            stock: row.stock,
            lead_time: row.lead_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Ledger row joined with its item
#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    item_id: Uuid,
    branch_id: Uuid,
    kind: String,
    amount: Decimal,
    current_stock: Decimal,
    note: Option<String>,
    transaction_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    item_code: Option<String>,
    item_name: Option<String>,
    item_unit: Option<String>,
}

impl TryFrom<TransactionRow> for ItemTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse::<TransactionKind>().map_err(|e| {
            AppError::Internal(format!("item_transactions row {} has {}", row.id, e))
        })?;
        let item = match (row.item_code, row.item_name, row.item_unit) {
            (Some(code), Some(name), Some(unit)) => Some(ItemRef {
                id: row.item_id,
                code,
                name,
                unit,
            }),
            _ => None,
        };
        Ok(ItemTransaction {
            id: row.id,
            item_id: row.item_id,
            branch_id: row.branch_id,
            kind,
            amount: row.amount,
            current_stock: row.current_stock,
            note: row.note.unwrap_or_default(),
            transaction_date: row.transaction_date,
            created_at: row.created_at,
            item,
        })
    }
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    branch_id: Uuid,
    code: String,
    name: String,
    recipe_type: String,
    description: String,
    instructions: String,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Ingredient joined with its (possibly deleted) item
#[derive(Debug, FromRow)]
struct IngredientRow {
    id: Uuid,
    recipe_id: Uuid,
    item_id: Uuid,
    branch_id: Uuid,
    quantity: Decimal,
    unit: String,
    item_branch_id: Option<Uuid>,
    item_code: Option<String>,
    item_name: Option<String>,
    item_type: Option<String>,
    item_unit: Option<String>,
    item_stock: Option<Decimal>,
    item_lead_time: Option<i32>,
    item_created_at: Option<DateTime<Utc>>,
    item_updated_at: Option<DateTime<Utc>>,
}

impl From<IngredientRow> for RecipeIngredient {
    fn from(row: IngredientRow) -> Self {
        let item = match (
            row.item_branch_id,
            row.item_code,
            row.item_name,
            row.item_type,
            row.item_unit,
            row.item_stock,
            row.item_lead_time,
            row.item_created_at,
            row.item_updated_at,
        ) {
            (
                Some(branch_id),
                Some(code),
                Some(name),
                Some(item_type),
                Some(unit),
                Some(stock),
                Some(lead_time),
                Some(created_at),
                Some(updated_at),
            ) => Some(Item {
                id: row.item_id,
                branch_id,
                code,
                name,
                item_type,
                unit,
                stock,
                lead_time,
                created_at,
                updated_at,
            }),
            _ => None,
        };
        RecipeIngredient {
            id: row.id,
            recipe_id: row.recipe_id,
            item_id: row.item_id,
            branch_id: row.branch_id,
            quantity: row.quantity,
            unit: row.unit,
            item,
        }
    }
}

/// Translate driver errors into the application taxonomy
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code().map(|c| c.into_owned());
        let constraint = db_err.constraint().unwrap_or_default().to_string();
        match code.as_deref() {
            // lock_not_available, deadlock_detected, serialization_failure
            Some("55P03") | Some("40P01") | Some("40001") => {
                return AppError::ConcurrencyConflict(format!(
                    "{} failed: {}",
                    operation,
                    db_err.message()
                ));
            }
            Some("23505") => {
                let field = if constraint.contains("code") { "code" } else { "record" };
                return AppError::DuplicateEntry(field.to_string());
            }
            Some("23514") => {
                let constraint = if constraint.is_empty() { "check" } else { constraint.as_str() };
                return AppError::InvalidState(format!(
                    "{} rejected by constraint {}",
                    operation, constraint
                ));
            }
            Some("23503") => {
                let resource = if constraint.contains("branch") {
                    "Branch"
                } else {
                    "Referenced record"
                };
                return AppError::NotFound(resource.to_string());
            }
            _ => {}
        }
    }

    tracing::error!("Database error in {}: {}", operation, err);
    AppError::DatabaseError(err)
}

#[async_trait]
impl StockStore for PgStockStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        // SET does not take bind parameters; the value is a plain integer
        let statement = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        Ok(Box::new(PgUnitOfWork {
            tx,
            locked: HashSet::new(),
        }))
    }

    async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        let sql = format!(
            "SELECT {} FROM items WHERE id = $1 AND deleted_at IS NULL",
            ITEM_COLUMNS
        );
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?
            .map(Item::from)
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<Item>, u64)> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM items
            WHERE deleted_at IS NULL
                AND ($1::uuid IS NULL OR branch_id = $1)
                AND ($2::text IS NULL OR code ILIKE $2 OR name ILIKE $2)
            "#,
        )
        .bind(filter.branch_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_items", e))?;

        let sql = format!(
            r#"
            SELECT {}
            FROM items
            WHERE deleted_at IS NULL
                AND ($1::uuid IS NULL OR branch_id = $1)
                AND ($2::text IS NULL OR code ILIKE $2 OR name ILIKE $2)
            ORDER BY created_at ASC, id ASC
            LIMIT $3 OFFSET $4
            "#,
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(filter.branch_id)
            .bind(&pattern)
            .bind(pagination.limit() as i64)
            .bind(pagination.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;

        Ok((rows.into_iter().map(Item::from).collect(), total as u64))
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> AppResult<(Vec<ItemTransaction>, u64)> {
        let kind = filter.kind.map(|k| k.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM item_transactions
            WHERE deleted_at IS NULL
                AND ($1::uuid IS NULL OR item_id = $1)
                AND ($2::uuid IS NULL OR branch_id = $2)
                AND ($3::text IS NULL OR type = $3)
                AND ($4::timestamptz IS NULL OR transaction_date >= $4)
                AND ($5::timestamptz IS NULL OR transaction_date <= $5)
            "#,
        )
        .bind(filter.item_id)
        .bind(filter.branch_id)
        .bind(kind)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_transactions", e))?;

        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT t.id, t.item_id, t.branch_id, t.type AS kind, t.amount, t.current_stock,
                   t.note, t.transaction_date, t.created_at,
                   i.code AS item_code, i.name AS item_name, i.unit AS item_unit
            FROM item_transactions t
            LEFT JOIN items i ON i.id = t.item_id
            WHERE t.deleted_at IS NULL
                AND ($1::uuid IS NULL OR t.item_id = $1)
                AND ($2::uuid IS NULL OR t.branch_id = $2)
                AND ($3::text IS NULL OR t.type = $3)
                AND ($4::timestamptz IS NULL OR t.transaction_date >= $4)
                AND ($5::timestamptz IS NULL OR t.transaction_date <= $5)
            ORDER BY t.transaction_date DESC, t.created_at DESC, t.id DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(filter.item_id)
        .bind(filter.branch_id)
        .bind(kind)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        let rows = rows
            .into_iter()
            .map(ItemTransaction::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((rows, total as u64))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}

/// Unit of work wrapping one Postgres transaction. Dropping it rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<Uuid>,
}

impl PgUnitOfWork {
    fn ensure_locked(&self, item_id: Uuid) -> AppResult<()> {
        if !self.locked.contains(&item_id) {
            return Err(AppError::Internal(format!(
                "item {} written without holding its row lock",
                item_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_item(&mut self, item_id: Uuid, branch_id: Uuid) -> AppResult<Item> {
        let sql = format!(
            "SELECT {} FROM items WHERE id = $1 AND branch_id = $2 AND deleted_at IS NULL FOR UPDATE",
            ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item_id)
            .bind(branch_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?
            .map(Item::from)
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        self.locked.insert(item.id);
        Ok(item)
    }

    async fn peek_item(&mut self, item_id: Uuid, branch_id: Uuid) -> AppResult<Item> {
        let sql = format!(
            "SELECT {} FROM items WHERE id = $1 AND branch_id = $2 AND deleted_at IS NULL",
            ITEM_COLUMNS
        );
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item_id)
            .bind(branch_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("peek_item", e))?
            .map(Item::from)
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    async fn find_item_id_by_code(
        &mut self,
        code: &str,
        branch_id: Uuid,
    ) -> AppResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM items WHERE code = $1 AND branch_id = $2 AND deleted_at IS NULL",
        )
        .bind(code)
        .bind(branch_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_item_by_code", e))
    }

    async fn insert_item(&mut self, new_item: &NewItem) -> AppResult<Item> {
        let sql = format!(
            r#"
            INSERT INTO items (branch_id, code, name, type, unit, stock, lead_time)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        let item: Item = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(new_item.branch_id)
            .bind(&new_item.code)
            .bind(&new_item.name)
            .bind(&new_item.item_type)
            .bind(&new_item.unit)
            .bind(new_item.lead_time)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?
            .into();

        // An uncommitted insert is invisible to everyone else
        self.locked.insert(item.id);
        Ok(item)
    }

    async fn update_item(&mut self, item_id: Uuid, patch: &ItemPatch) -> AppResult<Item> {
        self.ensure_locked(item_id)?;
        let sql = format!(
            r#"
            UPDATE items
            SET code = COALESCE($1, code), name = COALESCE($2, name),
                type = COALESCE($3, type), unit = COALESCE($4, unit),
                lead_time = COALESCE($5, lead_time), updated_at = NOW()
            WHERE id = $6
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(&patch.code)
            .bind(&patch.name)
            .bind(&patch.item_type)
            .bind(&patch.unit)
            .bind(patch.lead_time)
            .bind(item_id)
            .fetch_one(&mut *self.tx)
            .await
            .map(Item::from)
            .map_err(|e| map_sqlx_error("update_item", e))
    }

    async fn soft_delete_item(&mut self, item_id: Uuid) -> AppResult<()> {
        self.ensure_locked(item_id)?;
        let result = sqlx::query(
            "UPDATE items SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(item_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("soft_delete_item", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Item".to_string()));
        }
        self.locked.remove(&item_id);
        Ok(())
    }

    async fn save_stock(&mut self, item_id: Uuid, stock: Decimal) -> AppResult<()> {
        self.ensure_locked(item_id)?;
        sqlx::query("UPDATE items SET stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(stock)
            .bind(item_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("save_stock", e))?;
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        transaction: &NewItemTransaction,
    ) -> AppResult<ItemTransaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            WITH inserted AS (
                INSERT INTO item_transactions (
                    item_id, branch_id, type, amount, current_stock, note, transaction_date
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, item_id, branch_id, type, amount, current_stock, note,
                          transaction_date, created_at
            )
            SELECT t.id, t.item_id, t.branch_id, t.type AS kind, t.amount, t.current_stock,
                   t.note, t.transaction_date, t.created_at,
                   i.code AS item_code, i.name AS item_name, i.unit AS item_unit
            FROM inserted t
            LEFT JOIN items i ON i.id = t.item_id
            "#,
        )
        .bind(transaction.item_id)
        .bind(transaction.branch_id)
        .bind(transaction.kind.as_str())
        .bind(transaction.amount)
        .bind(transaction.current_stock)
        .bind(&transaction.note)
        .bind(transaction.transaction_date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        ItemTransaction::try_from(row)
    }

    async fn load_recipe(&mut self, recipe_id: Uuid) -> AppResult<Recipe> {
        let recipe = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, branch_id, code, name, type AS recipe_type,
                   COALESCE(description, '') AS description,
                   COALESCE(instructions, '') AS instructions,
                   created_by, created_at, updated_at
            FROM recipes
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(recipe_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_recipe", e))?
        .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        let ingredients = sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT ri.id, ri.recipe_id, ri.item_id, ri.branch_id, ri.quantity, ri.unit,
                   i.branch_id AS item_branch_id, i.code AS item_code, i.name AS item_name,
                   i.type AS item_type, i.unit AS item_unit, i.stock AS item_stock,
                   i.lead_time AS item_lead_time, i.created_at AS item_created_at,
                   i.updated_at AS item_updated_at
            FROM recipe_ingredients ri
            LEFT JOIN items i ON i.id = ri.item_id AND i.deleted_at IS NULL
            WHERE ri.recipe_id = $1 AND ri.deleted_at IS NULL
            ORDER BY ri.created_at ASC, ri.id ASC
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_recipe_ingredients", e))?;

        Ok(Recipe {
            id: recipe.id,
            branch_id: recipe.branch_id,
            code: recipe.code,
            name: recipe.name,
            recipe_type: recipe.recipe_type,
            description: recipe.description,
            instructions: recipe.instructions,
            created_by: recipe.created_by,
            created_at: recipe.created_at,
            updated_at: recipe.updated_at,
            ingredients: ingredients.into_iter().map(RecipeIngredient::from).collect(),
        })
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}
