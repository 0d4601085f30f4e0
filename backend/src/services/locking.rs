//! Pessimistic row locking for stock mutations
//!
//! Every mutation of an item goes through [`lock_item`] first. When a unit
//! of work needs several rows it takes them through [`lock_items_in_order`]
//! so concurrent units of work always acquire locks in the same order.

use std::collections::HashMap;

use uuid::Uuid;

use shared::Item;

use crate::error::AppResult;
use crate::store::UnitOfWork;

/// Lock one item row for the rest of the unit of work.
///
/// Blocks while another unit of work holds the row. Fails with `NotFound`
/// when `(item_id, branch_id)` does not match a live item and with
/// `ConcurrencyConflict` when the lock wait times out.
pub async fn lock_item(uow: &mut dyn UnitOfWork, item_id: Uuid, branch_id: Uuid) -> AppResult<Item> {
    tracing::debug!("Acquiring row lock on item {} (branch {})", item_id, branch_id);
    let item = uow.lock_item(item_id, branch_id).await?;
    tracing::debug!("Row lock held on item {}, stock {}", item.id, item.stock);
    Ok(item)
}

/// Ascending item id, each row once
pub fn lock_order(keys: &[(Uuid, Uuid)]) -> Vec<(Uuid, Uuid)> {
    let mut ordered = keys.to_vec();
    ordered.sort_by_key(|(item_id, _)| *item_id);
    ordered.dedup_by_key(|(item_id, _)| *item_id);
    ordered
}

/// Lock several `(item_id, branch_id)` rows in a deterministic order
pub async fn lock_items_in_order(
    uow: &mut dyn UnitOfWork,
    keys: &[(Uuid, Uuid)],
) -> AppResult<HashMap<Uuid, Item>> {
    let ordered = lock_order(keys);
    let mut locked = HashMap::with_capacity(ordered.len());
    for (item_id, branch_id) in ordered {
        let item = lock_item(uow, item_id, branch_id).await?;
        locked.insert(item_id, item);
    }
    Ok(locked)
}
