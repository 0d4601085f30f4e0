//! Recipe consumption tests

mod common;

use rust_decimal::Decimal;
use uuid::Uuid;

use common::{all_rows, dec, rows_of, shared_store, stock_of, store};
use shared::TransactionKind;
use stockroom::services::RecipeConsumptionEngine;
use stockroom::store::InMemoryStockStore;
use stockroom::AppError;

struct Kitchen {
    store: InMemoryStockStore,
    flour: Uuid,
    sugar: Uuid,
    recipe: Uuid,
}

/// Pancake recipe: 2 kg flour and 1 kg sugar per serving
fn kitchen(flour_stock: &str, sugar_stock: &str) -> Kitchen {
    let store = store();
    let branch = store.seed_branch("Central").unwrap();
    let flour = store
        .seed_item(branch.id, "FLOUR", "Flour", "kg", dec(flour_stock))
        .unwrap();
    let sugar = store
        .seed_item(branch.id, "SUGAR", "Sugar", "kg", dec(sugar_stock))
        .unwrap();
    let recipe = store
        .seed_recipe(
            branch.id,
            "PANCAKE",
            "Pancake",
            &[(flour.id, dec("2")), (sugar.id, dec("1"))],
        )
        .unwrap();
    Kitchen {
        store,
        flour: flour.id,
        sugar: sugar.id,
        recipe: recipe.id,
    }
}

#[tokio::test]
async fn test_cook_debits_every_ingredient() {
    let k = kitchen("25", "100");
    let engine = RecipeConsumptionEngine::new(shared_store(&k.store));

    let result = engine.cook(k.recipe, 10).await.unwrap();

    assert!(result.success);
    assert_eq!(result.recipe_id, k.recipe);
    assert_eq!(result.recipe_name, "Pancake");
    assert_eq!(result.serving_count, 10);
    assert_eq!(result.stock_changes.len(), 2);

    let flour = &result.stock_changes[0];
    assert_eq!(flour.item_id, k.flour);
    assert_eq!(flour.old_stock, dec("25"));
    assert_eq!(flour.consumed, dec("20"));
    assert_eq!(flour.new_stock, dec("5"));

    let sugar = &result.stock_changes[1];
    assert_eq!(sugar.item_id, k.sugar);
    assert_eq!(sugar.old_stock, dec("100"));
    assert_eq!(sugar.new_stock, dec("90"));

    assert_eq!(stock_of(&k.store, k.flour).await, dec("5"));
    assert_eq!(stock_of(&k.store, k.sugar).await, dec("90"));

    let rows = all_rows(&k.store).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.kind == TransactionKind::CookOut));
    assert!(rows.iter().all(|r| r.note == "Cook Pancake (PANCAKE) x10"));
    let flour_rows = rows_of(&k.store, k.flour).await;
    assert_eq!(flour_rows[0].id, flour.transaction_id);
}

#[tokio::test]
async fn test_cook_shortfall_leaves_everything_untouched() {
    let k = kitchen("15", "100");
    let engine = RecipeConsumptionEngine::new(shared_store(&k.store));

    let err = engine.cook(k.recipe, 10).await.unwrap_err();

    match &err {
        AppError::InsufficientStock(shortfalls) => {
            assert_eq!(shortfalls.len(), 1);
            assert_eq!(shortfalls[0].item_id, k.flour);
            assert_eq!(shortfalls[0].required, dec("20"));
            assert_eq!(shortfalls[0].available, dec("15"));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert!(err.to_string().contains("Flour (FLOUR) needs 20, has 15"));
    assert_eq!(stock_of(&k.store, k.flour).await, dec("15"));
    assert_eq!(stock_of(&k.store, k.sugar).await, dec("100"));
    assert!(all_rows(&k.store).await.is_empty());
}

#[tokio::test]
async fn test_cook_reports_all_shortfalls() {
    let k = kitchen("15", "4");
    let engine = RecipeConsumptionEngine::new(shared_store(&k.store));

    let err = engine.cook(k.recipe, 10).await.unwrap_err();

    match err {
        AppError::InsufficientStock(shortfalls) => {
            let ids: Vec<_> = shortfalls.iter().map(|s| s.item_id).collect();
            assert_eq!(ids, vec![k.flour, k.sugar]);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert!(all_rows(&k.store).await.is_empty());
}

#[tokio::test]
async fn test_cook_with_fractional_quantities() {
    let store = store();
    let branch = store.seed_branch("Central").unwrap();
    let butter = store
        .seed_item(branch.id, "BUTTER", "Butter", "kg", dec("1"))
        .unwrap();
    let recipe = store
        .seed_recipe(branch.id, "TOAST", "Toast", &[(butter.id, dec("0.015"))])
        .unwrap();
    let engine = RecipeConsumptionEngine::new(shared_store(&store));

    let result = engine.cook(recipe.id, 4).await.unwrap();

    assert_eq!(result.stock_changes[0].consumed, dec("0.06"));
    assert_eq!(stock_of(&store, butter.id).await, dec("0.94"));
}

#[tokio::test]
async fn test_cook_rejects_bad_requests() {
    let k = kitchen("25", "100");
    let engine = RecipeConsumptionEngine::new(shared_store(&k.store));

    let err = engine.cook(k.recipe, 0).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "serving_count"));

    let err = engine.cook(Uuid::new_v4(), 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(all_rows(&k.store).await.is_empty());
}

#[tokio::test]
async fn test_cook_recipe_without_ingredients_is_invalid() {
    let store = store();
    let branch = store.seed_branch("Central").unwrap();
    let recipe = store
        .seed_recipe(branch.id, "WATER", "Glass of water", &[])
        .unwrap();
    let engine = RecipeConsumptionEngine::new(shared_store(&store));

    let err = engine.cook(recipe.id, 1).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_cook_requirement_beyond_storable_quantity_is_invalid() {
    let store = store();
    let branch = store.seed_branch("Central").unwrap();
    let salt = store
        .seed_item(branch.id, "SALT", "Salt", "kg", dec("10"))
        .unwrap();
    let bulk = store
        .seed_recipe(branch.id, "BRINE", "Brine", &[(salt.id, Decimal::MAX)])
        .unwrap();
    let heavy = store
        .seed_recipe(branch.id, "CURE", "Cure", &[(salt.id, dec("1000000"))])
        .unwrap();
    let engine = RecipeConsumptionEngine::new(shared_store(&store));

    let err = engine.cook(bulk.id, 4_000_000_000).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)), "unexpected error {err:?}");

    let err = engine.cook(heavy.id, 4_000_000_000).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)), "unexpected error {err:?}");

    assert_eq!(stock_of(&store, salt.id).await, dec("10"));
    assert!(all_rows(&store).await.is_empty());
}
