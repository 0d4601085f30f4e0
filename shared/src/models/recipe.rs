//! Recipe and cooking models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Item;
use crate::validation::max_quantity;

/// A recipe with its ingredient list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub code: String,
    pub name: String,
    /// half_finished, finished
    #[serde(rename = "type")]
    pub recipe_type: String,
    pub description: String,
    pub instructions: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ingredients: Vec<RecipeIngredient>,
}

/// Quantity of one item consumed per serving of a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub item_id: Uuid,
    pub branch_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

impl RecipeIngredient {
    /// Quantity needed for `serving_count` servings, `None` when it does
    /// not fit a stock column
    pub fn required_for(&self, serving_count: u32) -> Option<Decimal> {
        self.quantity
            .checked_mul(Decimal::from(serving_count))
            .filter(|required| *required <= max_quantity())
    }
}

/// Stock movement caused by one ingredient of a cook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockChange {
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub unit: String,
    pub old_stock: Decimal,
    pub new_stock: Decimal,
    pub consumed: Decimal,
    pub transaction_id: Uuid,
}

/// Outcome of cooking a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookResult {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub serving_count: u32,
    pub stock_changes: Vec<StockChange>,
    pub success: bool,
}
