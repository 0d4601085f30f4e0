//! Inventory item models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stocked item in one branch.
///
/// `stock` is never written directly by callers; every change goes through
/// the stock ledger so that it is paired with a transaction row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub branch_id: Uuid,
    /// Unique per branch, shared across branches for the same logical item
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub unit: String,
    pub stock: Decimal,
    /// Days to restock. Informational only.
    pub lead_time: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Compact reference used by read models
    pub fn summary(&self) -> ItemRef {
        ItemRef {
            id: self.id,
            code: self.code.clone(),
            name: self.name.clone(),
            unit: self.unit.clone(),
        }
    }
}

/// Item relation carried by transaction rows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
}

/// Input for creating an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub branch_id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub unit: String,
    #[serde(default)]
    pub lead_time: i32,
    /// Booked as an `in` ledger entry after the item row is created
    #[serde(default)]
    pub opening_stock: Decimal,
}

/// Partial update of item metadata. Each field is applied only when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub unit: Option<String>,
    pub lead_time: Option<i32>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.name.is_none()
            && self.item_type.is_none()
            && self.unit.is_none()
            && self.lead_time.is_none()
    }

    /// Apply the present fields onto `item`
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(code) = &self.code {
            item.code = code.clone();
        }
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(item_type) = &self.item_type {
            item.item_type = item_type.clone();
        }
        if let Some(unit) = &self.unit {
            item.unit = unit.clone();
        }
        if let Some(lead_time) = self.lead_time {
            item.lead_time = lead_time;
        }
    }
}

/// Filter for listing items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub branch_id: Option<Uuid>,
    /// Case-insensitive match on code or name
    pub search: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(branch_id) = self.branch_id {
            if item.branch_id != branch_id {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                item.code.to_lowercase().contains(&term) || item.name.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

/// One blocking shortfall reported by an outbound stock change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockShortfall {
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub required: Decimal,
    pub available: Decimal,
}

impl std::fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) needs {}, has {}",
            self.item_name,
            self.item_code,
            self.required.normalize(),
            self.available.normalize()
        )
    }
}
