//! Recipe-driven batch consumption
//!
//! Cooking scales every ingredient by the serving count and debits all of
//! them in one unit of work. Every shortfall is reported together and, if
//! there is any, nothing is written.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    validate_serving_count, CookResult, Item, RecipeIngredient, StockChange, StockShortfall,
    TransactionKind,
};

use super::ledger::{shortfall, ApplyTransactionInput, StockLedger};
use super::locking;
use crate::error::{AppError, AppResult};
use crate::store::StockStore;

/// One planned debit
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionStep {
    pub item_id: Uuid,
    pub branch_id: Uuid,
    pub required: Decimal,
}

/// Check every ingredient against the locked stock.
///
/// Ingredients that share an item draw from a running balance. Returns the
/// debits to apply, or every shortfall found.
pub fn plan_consumption(
    ingredients: &[RecipeIngredient],
    locked: &HashMap<Uuid, Item>,
    serving_count: u32,
) -> AppResult<Vec<ConsumptionStep>> {
    let mut available: HashMap<Uuid, Decimal> = locked
        .iter()
        .map(|(id, item)| (*id, item.stock))
        .collect();
    let mut steps = Vec::with_capacity(ingredients.len());
    let mut shortfalls: Vec<StockShortfall> = Vec::new();

    for ingredient in ingredients {
        let item = locked
            .get(&ingredient.item_id)
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;
        let required = ingredient.required_for(serving_count).ok_or_else(|| {
            AppError::InvalidState(format!(
                "ingredient {} ({}) needs more than the largest storable quantity for {} servings",
                item.name, item.code, serving_count
            ))
        })?;
        if required <= Decimal::ZERO {
            return Err(AppError::InvalidState(format!(
                "ingredient {} ({}) has a non-positive quantity",
                item.name, item.code
            )));
        }

        let balance = available.entry(item.id).or_insert(item.stock);
        if *balance < required {
            shortfalls.push(shortfall(item, required, *balance));
            continue;
        }
        *balance -= required;
        steps.push(ConsumptionStep {
            item_id: item.id,
            branch_id: ingredient.branch_id,
            required,
        });
    }

    if !shortfalls.is_empty() {
        return Err(AppError::InsufficientStock(shortfalls));
    }
    Ok(steps)
}

/// Recipe consumption service
#[derive(Clone)]
pub struct RecipeConsumptionEngine {
    store: Arc<dyn StockStore>,
}

impl RecipeConsumptionEngine {
    /// Create a new RecipeConsumptionEngine instance
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Consume the ingredients of `serving_count` servings of a recipe
    pub async fn cook(&self, recipe_id: Uuid, serving_count: u32) -> AppResult<CookResult> {
        validate_serving_count(serving_count)
            .map_err(|m| AppError::validation("serving_count", m))?;

        let mut uow = self.store.begin().await?;
        let recipe = uow.load_recipe(recipe_id).await?;
        if recipe.ingredients.is_empty() {
            return Err(AppError::InvalidState(format!(
                "recipe {} has no ingredients",
                recipe.name
            )));
        }

        let keys: Vec<(Uuid, Uuid)> = recipe
            .ingredients
            .iter()
            .map(|ingredient| (ingredient.item_id, ingredient.branch_id))
            .collect();
        let locked = locking::lock_items_in_order(uow.as_mut(), &keys).await?;

        let steps = match plan_consumption(&recipe.ingredients, &locked, serving_count) {
            Ok(steps) => steps,
            Err(err) => {
                // Dropping the unit of work releases the locks untouched
                tracing::warn!("Cook of recipe {} x{} rejected: {}", recipe.name, serving_count, err);
                return Err(err);
            }
        };

        let note = format!("Cook {} ({}) x{}", recipe.name, recipe.code, serving_count);
        let transaction_date = Some(Utc::now());
        let mut stock_changes = Vec::with_capacity(steps.len());
        for step in steps {
            let transaction = StockLedger::apply_in(
                uow.as_mut(),
                &ApplyTransactionInput {
                    item_id: step.item_id,
                    branch_id: step.branch_id,
                    kind: TransactionKind::CookOut,
                    amount: step.required,
                    note: note.clone(),
                    transaction_date,
                },
            )
            .await?;

            let item = locked
                .get(&step.item_id)
                .ok_or_else(|| AppError::NotFound("Item".to_string()))?;
            stock_changes.push(StockChange {
                item_id: item.id,
                item_code: item.code.clone(),
                item_name: item.name.clone(),
                unit: item.unit.clone(),
                old_stock: transaction.current_stock + step.required,
                new_stock: transaction.current_stock,
                consumed: step.required,
                transaction_id: transaction.id,
            });
        }

        uow.commit().await?;

        tracing::info!(
            "Cooked recipe {} x{}, {} ingredients debited",
            recipe.name,
            serving_count,
            stock_changes.len()
        );

        Ok(CookResult {
            recipe_id: recipe.id,
            recipe_name: recipe.name,
            serving_count,
            stock_changes,
            success: true,
        })
    }
}
