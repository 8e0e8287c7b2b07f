use uuid::Uuid;

use engine::{
    Category, Currency, EngineError, NewCategory, NewTransaction, TransactionKind,
    default_categories,
};

mod common;

use common::{engine_with_db, manual_card, user};

async fn category(
    engine: &engine::Engine,
    user_id: Uuid,
    name: &str,
    kind: TransactionKind,
    parent_id: Option<Uuid>,
) -> Category {
    engine
        .create_category(
            user_id,
            NewCategory {
                name: name.to_string(),
                kind,
                parent_id,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn parent_must_exist_belong_to_user_and_share_kind() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, "alice@example.com").await;
    let bob = user(&engine, "bob@example.com").await;

    let food = category(&engine, alice, "Food", TransactionKind::Expense, None).await;
    let groceries =
        category(&engine, alice, "Groceries", TransactionKind::Expense, Some(food.id)).await;
    assert_eq!(groceries.parent_id, Some(food.id));

    let mismatch = engine
        .create_category(
            alice,
            NewCategory {
                name: "Bonus".to_string(),
                kind: TransactionKind::Income,
                parent_id: Some(food.id),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(mismatch, EngineError::InvalidCategory(_)));

    let foreign = engine
        .create_category(
            bob,
            NewCategory {
                name: "Snacks".to_string(),
                kind: TransactionKind::Expense,
                parent_id: Some(food.id),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(foreign, EngineError::Unauthorized(_)));

    let missing = engine
        .create_category(
            alice,
            NewCategory {
                name: "Snacks".to_string(),
                kind: TransactionKind::Expense,
                parent_id: Some(Uuid::new_v4()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(missing, EngineError::CategoryNotFound(_)));
}

#[tokio::test]
async fn names_are_unique_per_kind_after_normalization() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, "alice@example.com").await;

    category(&engine, alice, "Food & Dining", TransactionKind::Expense, None).await;
    let err = engine
        .create_category(
            alice,
            NewCategory {
                name: "  food  &dining ".to_string(),
                kind: TransactionKind::Expense,
                parent_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    // same name under another kind is a different category
    category(&engine, alice, "Food & Dining", TransactionKind::Income, None).await;

    let blank = engine
        .create_category(
            alice,
            NewCategory {
                name: " ".to_string(),
                kind: TransactionKind::Expense,
                parent_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(blank, EngineError::InvalidCategory(_)));
}

#[tokio::test]
async fn moves_that_close_a_cycle_are_rejected() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, "alice@example.com").await;

    let a = category(&engine, alice, "A", TransactionKind::Expense, None).await;
    let b = category(&engine, alice, "B", TransactionKind::Expense, Some(a.id)).await;
    let c = category(&engine, alice, "C", TransactionKind::Expense, Some(b.id)).await;
    let d = category(&engine, alice, "D", TransactionKind::Expense, None).await;

    let err = engine
        .move_category(alice, a.id, Some(c.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CircularReference(_)));

    let err = engine
        .move_category(alice, a.id, Some(a.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CircularReference(_)));

    assert_eq!(engine.category(alice, a.id).await.unwrap().parent_id, None);

    let moved = engine.move_category(alice, a.id, Some(d.id)).await.unwrap();
    assert_eq!(moved.parent_id, Some(d.id));

    let moved = engine.move_category(alice, c.id, None).await.unwrap();
    assert_eq!(moved.parent_id, None);
}

#[tokio::test]
async fn move_checks_kind_and_owner() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, "alice@example.com").await;
    let bob = user(&engine, "bob@example.com").await;

    let food = category(&engine, alice, "Food", TransactionKind::Expense, None).await;
    let salary = category(&engine, alice, "Salary", TransactionKind::Income, None).await;
    let bobs = category(&engine, bob, "Food", TransactionKind::Expense, None).await;

    let err = engine
        .move_category(alice, food.id, Some(salary.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCategory(_)));

    let err = engine
        .move_category(alice, food.id, Some(bobs.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = engine
        .move_category(bob, food.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

#[tokio::test]
async fn tree_orders_siblings_by_name() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, "alice@example.com").await;

    let transport = category(&engine, alice, "Transport", TransactionKind::Expense, None).await;
    let food = category(&engine, alice, "Food", TransactionKind::Expense, None).await;
    category(&engine, alice, "Taxi", TransactionKind::Expense, Some(transport.id)).await;
    category(&engine, alice, "Metro", TransactionKind::Expense, Some(transport.id)).await;

    let tree = engine.category_tree(alice).await.unwrap();
    let roots: Vec<&str> = tree.iter().map(|node| node.category.name.as_str()).collect();
    assert_eq!(roots, ["Food", "Transport"]);
    assert_eq!(tree[0].category.id, food.id);
    assert!(tree[0].children.is_empty());
    let children: Vec<&str> = tree[1]
        .children
        .iter()
        .map(|node| node.category.name.as_str())
        .collect();
    assert_eq!(children, ["Metro", "Taxi"]);

    let direct = engine.category_children(alice, transport.id).await.unwrap();
    assert_eq!(direct.len(), 2);
}

#[tokio::test]
async fn delete_reparents_children_and_uncategorizes_transactions() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, "alice@example.com").await;
    let card = manual_card(&engine, alice, 1000, 0).await;

    let food = category(&engine, alice, "Food", TransactionKind::Expense, None).await;
    let groceries =
        category(&engine, alice, "Groceries", TransactionKind::Expense, Some(food.id)).await;

    let tx = engine
        .create_transaction(
            alice,
            NewTransaction {
                card_id: card.id,
                category_id: Some(food.id),
                amount: 100,
                kind: TransactionKind::Expense,
                currency: Currency::UAH,
                description: "lunch".to_string(),
                comment: None,
                transaction_date: None,
            },
        )
        .await
        .unwrap();

    engine.delete_category(alice, food.id).await.unwrap();

    let err = engine.category(alice, food.id).await.unwrap_err();
    assert!(matches!(err, EngineError::CategoryNotFound(_)));
    assert_eq!(
        engine.category(alice, groceries.id).await.unwrap().parent_id,
        None
    );
    let tx = engine.transaction(alice, tx.id).await.unwrap();
    assert_eq!(tx.category_id, None);
    assert_eq!(engine.card(alice, card.id).await.unwrap().balance, 900);
}

#[tokio::test]
async fn rename_keeps_uniqueness() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, "alice@example.com").await;

    let food = category(&engine, alice, "Food", TransactionKind::Expense, None).await;
    category(&engine, alice, "Cafe", TransactionKind::Expense, None).await;

    let renamed = engine
        .rename_category(alice, food.id, "Groceries")
        .await
        .unwrap();
    assert_eq!(renamed.name, "Groceries");

    let err = engine
        .rename_category(alice, food.id, "CAFÉ")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    // a case-only change of its own name is allowed
    let renamed = engine
        .rename_category(alice, food.id, "groceries")
        .await
        .unwrap();
    assert_eq!(renamed.name, "groceries");
}

#[tokio::test]
async fn default_categories_are_created_once() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, "alice@example.com").await;

    let created = engine.create_default_categories(alice).await.unwrap();
    assert_eq!(created.len(), default_categories().len());
    assert_eq!(created.len(), 18);
    assert!(created.iter().all(|category| category.parent_id.is_none()));

    let again = engine.create_default_categories(alice).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(engine.categories(alice).await.unwrap().len(), 18);

    let err = engine
        .create_default_categories(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UserNotFound(_)));
}
