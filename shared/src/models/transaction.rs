//! Item transaction (stock ledger) models

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ItemRef;
use crate::validation::max_quantity;

/// Kind of stock movement recorded by a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    In,
    Out,
    TransferIn,
    TransferOut,
    CookOut,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::In,
        TransactionKind::Out,
        TransactionKind::TransferIn,
        TransactionKind::TransferOut,
        TransactionKind::CookOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::In => "in",
            TransactionKind::Out => "out",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::CookOut => "cook_out",
        }
    }

    /// Inbound kinds add to stock, all others subtract
    pub fn is_inbound(&self) -> bool {
        matches!(self, TransactionKind::In | TransactionKind::TransferIn)
    }

    /// Stock after applying `amount` in this direction.
    ///
    /// Fails when an outbound change would take stock below zero or an
    /// inbound one beyond the largest storable quantity.
    pub fn resulting_stock(&self, stock: Decimal, amount: Decimal) -> Result<Decimal, StockBound> {
        if self.is_inbound() {
            stock
                .checked_add(amount)
                .filter(|new_stock| *new_stock <= max_quantity())
                .ok_or(StockBound::AboveMaximum)
        } else {
            stock
                .checked_sub(amount)
                .filter(|new_stock| *new_stock >= Decimal::ZERO)
                .ok_or(StockBound::BelowZero)
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stock change could not be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StockBound {
    #[error("stock would drop below zero")]
    BelowZero,
    #[error("stock would exceed the largest storable quantity")]
    AboveMaximum,
}

/// Error returned when parsing an unknown transaction kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transaction kind: {0}")]
pub struct UnknownTransactionKind(pub String);

impl FromStr for TransactionKind {
    type Err = UnknownTransactionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownTransactionKind(s.to_string()))
    }
}

/// Immutable ledger row explaining one stock change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemTransaction {
    pub id: Uuid,
    pub item_id: Uuid,
    pub branch_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    /// Stock of the item right after this row was applied
    pub current_stock: Decimal,
    pub note: String,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemRef>,
}

/// Ledger row about to be inserted
#[derive(Debug, Clone)]
pub struct NewItemTransaction {
    pub item_id: Uuid,
    pub branch_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub current_stock: Decimal,
    pub note: String,
    pub transaction_date: DateTime<Utc>,
}

/// Filter for listing ledger rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub item_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn matches(&self, txn: &ItemTransaction) -> bool {
        self.item_id.map_or(true, |id| txn.item_id == id)
            && self.branch_id.map_or(true, |id| txn.branch_id == id)
            && self.kind.map_or(true, |kind| txn.kind == kind)
            && self.from_date.map_or(true, |from| txn.transaction_date >= from)
            && self.to_date.map_or(true, |to| txn.transaction_date <= to)
    }
}

/// Both legs of a completed transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer_out: ItemTransaction,
    pub transfer_in: ItemTransaction,
}
