//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{Item, ItemFilter, ItemTransaction, Pagination, TransactionFilter};
use stockroom::store::{InMemoryStockStore, StockStore};

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn store() -> InMemoryStockStore {
    store_with_timeout(Duration::from_secs(5))
}

pub fn store_with_timeout(lock_timeout: Duration) -> InMemoryStockStore {
    InMemoryStockStore::new(lock_timeout)
}

pub fn shared_store(store: &InMemoryStockStore) -> Arc<dyn StockStore> {
    Arc::new(store.clone())
}

pub async fn stock_of(store: &InMemoryStockStore, item_id: Uuid) -> Decimal {
    store.get_item(item_id).await.unwrap().stock
}

/// Every ledger row of an item, newest first
pub async fn rows_of(store: &InMemoryStockStore, item_id: Uuid) -> Vec<ItemTransaction> {
    let filter = TransactionFilter {
        item_id: Some(item_id),
        ..Default::default()
    };
    let (rows, _) = store
        .list_transactions(&filter, Pagination { page: 1, per_page: 1000 })
        .await
        .unwrap();
    rows
}

pub async fn all_rows(store: &InMemoryStockStore) -> Vec<ItemTransaction> {
    let (rows, _) = store
        .list_transactions(&TransactionFilter::default(), Pagination { page: 1, per_page: 1000 })
        .await
        .unwrap();
    rows
}

pub async fn items_in(store: &InMemoryStockStore, branch_id: Uuid) -> Vec<Item> {
    let filter = ItemFilter {
        branch_id: Some(branch_id),
        search: None,
    };
    let (items, _) = store
        .list_items(&filter, Pagination { page: 1, per_page: 1000 })
        .await
        .unwrap();
    items
}
