//! Cross-branch transfer tests

mod common;

use uuid::Uuid;

use common::{all_rows, dec, items_in, rows_of, shared_store, stock_of, store};
use shared::TransactionKind;
use stockroom::services::{TransferCoordinator, TransferInput};
use stockroom::AppError;

fn transfer(item_id: Uuid, from: Uuid, to: Uuid, amount: &str) -> TransferInput {
    TransferInput {
        item_id,
        from_branch_id: from,
        to_branch_id: to,
        amount: dec(amount),
        note: "restock".to_string(),
    }
}

#[tokio::test]
async fn test_transfer_creates_missing_destination_item() {
    let store = store();
    let central = store.seed_branch("Central").unwrap();
    let north = store.seed_branch("North").unwrap();
    let salt = store
        .seed_item(central.id, "SALT", "Salt", "kg", dec("150"))
        .unwrap();
    let coordinator = TransferCoordinator::new(shared_store(&store));

    let result = coordinator
        .transfer(transfer(salt.id, central.id, north.id, "50"))
        .await
        .unwrap();

    assert_eq!(stock_of(&store, salt.id).await, dec("100"));
    assert_eq!(result.transfer_out.kind, TransactionKind::TransferOut);
    assert_eq!(result.transfer_out.item_id, salt.id);
    assert_eq!(result.transfer_out.current_stock, dec("100"));

    let north_items = items_in(&store, north.id).await;
    assert_eq!(north_items.len(), 1);
    let created = &north_items[0];
    assert_eq!(created.code, "SALT");
    assert_eq!(created.name, "Salt");
    assert_eq!(created.unit, "kg");
    assert_eq!(created.stock, dec("50"));

    assert_eq!(result.transfer_in.kind, TransactionKind::TransferIn);
    assert_eq!(result.transfer_in.item_id, created.id);
    assert_eq!(result.transfer_in.branch_id, north.id);
    assert_eq!(result.transfer_in.current_stock, dec("50"));
    assert_eq!(
        result.transfer_in.transaction_date,
        result.transfer_out.transaction_date
    );
    assert_eq!(result.transfer_in.note, "restock");
}

#[tokio::test]
async fn test_transfer_credits_existing_destination_item() {
    let store = store();
    let central = store.seed_branch("Central").unwrap();
    let north = store.seed_branch("North").unwrap();
    let source = store
        .seed_item(central.id, "SUGAR", "Sugar", "kg", dec("30"))
        .unwrap();
    let destination = store
        .seed_item(north.id, "SUGAR", "Sugar", "kg", dec("5"))
        .unwrap();
    let coordinator = TransferCoordinator::new(shared_store(&store));

    let result = coordinator
        .transfer(transfer(source.id, central.id, north.id, "12.5"))
        .await
        .unwrap();

    assert_eq!(result.transfer_in.item_id, destination.id);
    assert_eq!(stock_of(&store, source.id).await, dec("17.5"));
    assert_eq!(stock_of(&store, destination.id).await, dec("17.5"));
    assert_eq!(items_in(&store, north.id).await.len(), 1);
    assert_eq!(rows_of(&store, source.id).await.len(), 1);
    assert_eq!(rows_of(&store, destination.id).await.len(), 1);
}

#[tokio::test]
async fn test_transfer_conserves_total_stock() {
    let store = store();
    let central = store.seed_branch("Central").unwrap();
    let north = store.seed_branch("North").unwrap();
    let source = store
        .seed_item(central.id, "FLOUR", "Flour", "kg", dec("80"))
        .unwrap();
    let coordinator = TransferCoordinator::new(shared_store(&store));

    for amount in ["10", "7.25", "30"] {
        coordinator
            .transfer(transfer(source.id, central.id, north.id, amount))
            .await
            .unwrap();
    }

    let destination = &items_in(&store, north.id).await[0];
    let total = stock_of(&store, source.id).await + stock_of(&store, destination.id).await;
    assert_eq!(total, dec("80"));
    assert_eq!(destination.stock, dec("47.25"));
}

#[tokio::test]
async fn test_transfer_shortfall_writes_nothing() {
    let store = store();
    let central = store.seed_branch("Central").unwrap();
    let north = store.seed_branch("North").unwrap();
    let source = store
        .seed_item(central.id, "SALT", "Salt", "kg", dec("20"))
        .unwrap();
    let coordinator = TransferCoordinator::new(shared_store(&store));

    let err = coordinator
        .transfer(transfer(source.id, central.id, north.id, "25"))
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock(shortfalls) => {
            assert_eq!(shortfalls[0].required, dec("25"));
            assert_eq!(shortfalls[0].available, dec("20"));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(stock_of(&store, source.id).await, dec("20"));
    assert!(items_in(&store, north.id).await.is_empty());
    assert!(all_rows(&store).await.is_empty());
}

#[tokio::test]
async fn test_transfer_within_one_branch_is_rejected() {
    let store = store();
    let central = store.seed_branch("Central").unwrap();
    let source = store
        .seed_item(central.id, "SALT", "Salt", "kg", dec("20"))
        .unwrap();
    let coordinator = TransferCoordinator::new(shared_store(&store));

    let err = coordinator
        .transfer(transfer(source.id, central.id, central.id, "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "to_branch_id"));

    let err = coordinator
        .transfer(transfer(source.id, central.id, Uuid::new_v4(), "0"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "amount"));
    assert!(all_rows(&store).await.is_empty());
}

#[tokio::test]
async fn test_transfer_of_unknown_item_or_branch() {
    let store = store();
    let central = store.seed_branch("Central").unwrap();
    let north = store.seed_branch("North").unwrap();
    let source = store
        .seed_item(central.id, "SALT", "Salt", "kg", dec("20"))
        .unwrap();
    let coordinator = TransferCoordinator::new(shared_store(&store));

    let err = coordinator
        .transfer(transfer(Uuid::new_v4(), central.id, north.id, "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Item exists, but not in the claimed source branch
    let err = coordinator
        .transfer(transfer(source.id, north.id, central.id, "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Destination branch does not exist, so the item cannot be created there
    let err = coordinator
        .transfer(transfer(source.id, central.id, Uuid::new_v4(), "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(stock_of(&store, source.id).await, dec("20"));
    assert_eq!(all_rows(&store).await.len(), 0);
    assert_eq!(items_in(&store, north.id).await.len(), 0);
}
