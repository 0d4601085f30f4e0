//! Cross-branch property tests
//!
//! Random mixes of movements, transfers and cooks over two branches keep
//! every stock non-negative and conserve stock across transfers. Rejected
//! operations leave no ledger rows behind.

mod common;

use std::collections::HashMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use common::{all_rows, items_in, shared_store, store};
use shared::{Item, ItemTransaction, TransactionKind};
use stockroom::services::{
    ApplyTransactionInput, RecipeConsumptionEngine, StockLedger, TransferCoordinator,
    TransferInput,
};
use stockroom::store::InMemoryStockStore;
use stockroom::AppError;

const CODES: [&str; 2] = ["FLOUR", "SUGAR"];

#[derive(Debug, Clone)]
enum Op {
    Apply {
        branch: usize,
        code: usize,
        inbound: bool,
        tenths: u32,
    },
    Transfer {
        code: usize,
        from: usize,
        tenths: u32,
    },
    Cook {
        branch: usize,
        servings: u32,
    },
}

/// What the model expects an operation to do
#[derive(Debug)]
enum Outcome {
    Accepted { rows: usize },
    Insufficient,
    Missing,
}

type Stocks = HashMap<(usize, String), Decimal>;

struct Bakery {
    store: InMemoryStockStore,
    branches: [Uuid; 2],
    recipes: [Uuid; 2],
    /// Per-serving ingredients of each branch's recipe, in recipe order
    ingredients: [Vec<(&'static str, Decimal)>; 2],
    opening: Stocks,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2usize, 0..2usize, any::<bool>(), 1u32..400).prop_map(
            |(branch, code, inbound, tenths)| Op::Apply {
                branch,
                code,
                inbound,
                tenths
            }
        ),
        (0..2usize, 0..2usize, 1u32..400)
            .prop_map(|(code, from, tenths)| Op::Transfer { code, from, tenths }),
        (0..2usize, 1u32..6).prop_map(|(branch, servings)| Op::Cook { branch, servings }),
    ]
}

fn tenths(n: u32) -> Decimal {
    Decimal::new(i64::from(n), 1)
}

/// Central stocks flour and sugar, North only flour. Sugar reaches North
/// through transfers, which create the item there.
fn bakery() -> Bakery {
    let store = store();
    let central = store.seed_branch("Central").unwrap();
    let north = store.seed_branch("North").unwrap();
    let flour = store
        .seed_item(central.id, "FLOUR", "Flour", "kg", Decimal::from(60))
        .unwrap();
    let sugar = store
        .seed_item(central.id, "SUGAR", "Sugar", "kg", Decimal::from(25))
        .unwrap();
    let north_flour = store
        .seed_item(north.id, "FLOUR", "Flour", "kg", Decimal::from(10))
        .unwrap();

    let pancake_ingredients = vec![
        ("FLOUR", Decimal::from(2)),
        ("SUGAR", Decimal::from(1)),
        ("FLOUR", Decimal::new(5, 1)),
    ];
    let pancake = store
        .seed_recipe(
            central.id,
            "PANCAKE",
            "Pancake",
            &[
                (flour.id, Decimal::from(2)),
                (sugar.id, Decimal::from(1)),
                (flour.id, Decimal::new(5, 1)),
            ],
        )
        .unwrap();
    let bread = store
        .seed_recipe(north.id, "BREAD", "Bread", &[(north_flour.id, Decimal::from(3))])
        .unwrap();

    let opening = Stocks::from([
        ((0, "FLOUR".to_string()), Decimal::from(60)),
        ((0, "SUGAR".to_string()), Decimal::from(25)),
        ((1, "FLOUR".to_string()), Decimal::from(10)),
    ]);

    Bakery {
        store,
        branches: [central.id, north.id],
        recipes: [pancake.id, bread.id],
        ingredients: [pancake_ingredients, vec![("FLOUR", Decimal::from(3))]],
        opening,
    }
}

/// Advance the model by one operation and report what should happen
fn predict(model: &mut Stocks, ingredients: &[Vec<(&'static str, Decimal)>; 2], op: &Op) -> Outcome {
    match op {
        Op::Apply {
            branch,
            code,
            inbound,
            tenths: n,
        } => {
            let amount = tenths(*n);
            match model.get_mut(&(*branch, CODES[*code].to_string())) {
                None => Outcome::Missing,
                Some(stock) if !*inbound && *stock < amount => Outcome::Insufficient,
                Some(stock) => {
                    if *inbound {
                        *stock += amount;
                    } else {
                        *stock -= amount;
                    }
                    Outcome::Accepted { rows: 1 }
                }
            }
        }
        Op::Transfer {
            code,
            from,
            tenths: n,
        } => {
            let amount = tenths(*n);
            let source = (*from, CODES[*code].to_string());
            match model.get(&source).copied() {
                None => Outcome::Missing,
                Some(stock) if stock < amount => Outcome::Insufficient,
                Some(stock) => {
                    model.insert(source, stock - amount);
                    *model
                        .entry((1 - *from, CODES[*code].to_string()))
                        .or_insert(Decimal::ZERO) += amount;
                    Outcome::Accepted { rows: 2 }
                }
            }
        }
        Op::Cook { branch, servings } => {
            let mut balance = model.clone();
            let mut short = false;
            for (code, per_serving) in &ingredients[*branch] {
                let required = *per_serving * Decimal::from(*servings);
                let stock = balance
                    .entry((*branch, code.to_string()))
                    .or_insert(Decimal::ZERO);
                if *stock < required {
                    short = true;
                } else {
                    *stock -= required;
                }
            }
            if short {
                Outcome::Insufficient
            } else {
                *model = balance;
                Outcome::Accepted {
                    rows: ingredients[*branch].len(),
                }
            }
        }
    }
}

async fn live_items(bakery: &Bakery) -> HashMap<(usize, String), Item> {
    let mut items = HashMap::new();
    for (index, branch_id) in bakery.branches.iter().enumerate() {
        for item in items_in(&bakery.store, *branch_id).await {
            items.insert((index, item.code.clone()), item);
        }
    }
    items
}

async fn perform(
    bakery: &Bakery,
    items: &HashMap<(usize, String), Item>,
    op: &Op,
) -> Result<(), AppError> {
    // Unknown rows get a fresh id so the service reports them missing
    let id_of = |branch: usize, code: usize| {
        items
            .get(&(branch, CODES[code].to_string()))
            .map(|item| item.id)
            .unwrap_or_else(Uuid::new_v4)
    };
    let store = shared_store(&bakery.store);
    match op {
        Op::Apply {
            branch,
            code,
            inbound,
            tenths: n,
        } => StockLedger::new(store)
            .apply(ApplyTransactionInput {
                item_id: id_of(*branch, *code),
                branch_id: bakery.branches[*branch],
                kind: if *inbound {
                    TransactionKind::In
                } else {
                    TransactionKind::Out
                },
                amount: tenths(*n),
                note: String::new(),
                transaction_date: None,
            })
            .await
            .map(|_| ()),
        Op::Transfer {
            code,
            from,
            tenths: n,
        } => TransferCoordinator::new(store)
            .transfer(TransferInput {
                item_id: id_of(*from, *code),
                from_branch_id: bakery.branches[*from],
                to_branch_id: bakery.branches[1 - *from],
                amount: tenths(*n),
                note: String::new(),
            })
            .await
            .map(|_| ()),
        Op::Cook { branch, servings } => RecipeConsumptionEngine::new(store)
            .cook(bakery.recipes[*branch], *servings)
            .await
            .map(|_| ()),
    }
}

fn check_invariants(
    bakery: &Bakery,
    model: &Stocks,
    items: &HashMap<(usize, String), Item>,
    rows: &[ItemTransaction],
) -> Result<(), TestCaseError> {
    prop_assert_eq!(items.len(), model.len());
    for (key, item) in items {
        prop_assert!(item.stock >= Decimal::ZERO);
        prop_assert_eq!(Some(&item.stock), model.get(key));
    }
    prop_assert!(rows.iter().all(|r| r.current_stock >= Decimal::ZERO));

    let code_of: HashMap<Uuid, &str> = items
        .values()
        .map(|item| (item.id, item.code.as_str()))
        .collect();
    for code in CODES {
        let opening: Decimal = bakery
            .opening
            .iter()
            .filter(|((_, c), _)| c == code)
            .map(|(_, stock)| *stock)
            .sum();
        let on_hand: Decimal = items
            .values()
            .filter(|item| item.code == code)
            .map(|item| item.stock)
            .sum();
        let of_code: Vec<&ItemTransaction> = rows
            .iter()
            .filter(|r| code_of.get(&r.item_id) == Some(&code))
            .collect();
        let sum_of = |kind: TransactionKind| -> Decimal {
            of_code.iter().filter(|r| r.kind == kind).map(|r| r.amount).sum()
        };
        let outside: Decimal = of_code
            .iter()
            .filter(|r| !matches!(r.kind, TransactionKind::TransferIn | TransactionKind::TransferOut))
            .map(|r| if r.kind.is_inbound() { r.amount } else { -r.amount })
            .sum();

        prop_assert_eq!(sum_of(TransactionKind::TransferIn), sum_of(TransactionKind::TransferOut));
        prop_assert_eq!(on_hand, opening + outside);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every operation either books exactly its ledger rows or changes
    /// nothing, and stock totals only move through non-transfer rows
    #[test]
    fn prop_mixed_operations_keep_stock_consistent(
        ops in prop::collection::vec(op_strategy(), 1..30),
    ) {
        tokio_test::block_on(async {
            let bakery = bakery();
            let mut model = bakery.opening.clone();

            for op in &ops {
                let items = live_items(&bakery).await;
                let before = all_rows(&bakery.store).await.len();
                let expected = predict(&mut model, &bakery.ingredients, op);
                let actual = perform(&bakery, &items, op).await;
                let rows = all_rows(&bakery.store).await;

                match (&expected, &actual) {
                    (Outcome::Accepted { rows: added }, Ok(())) => {
                        prop_assert_eq!(rows.len(), before + added);
                    }
                    (Outcome::Insufficient, Err(AppError::InsufficientStock(_)))
                    | (Outcome::Missing, Err(AppError::NotFound(_))) => {
                        prop_assert_eq!(rows.len(), before);
                    }
                    _ => {
                        return Err(TestCaseError::fail(format!(
                            "{op:?}: expected {expected:?}, got {actual:?}"
                        )));
                    }
                }

                let items = live_items(&bakery).await;
                check_invariants(&bakery, &model, &items, &rows)?;
            }
            Ok(())
        })?;
    }
}
