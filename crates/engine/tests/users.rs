use uuid::Uuid;

use engine::EngineError;

mod common;

use common::engine_with_db;

#[tokio::test]
async fn users_are_unique_by_email() {
    let (engine, _db) = engine_with_db().await;

    let alice = engine
        .create_user("  Alice@Example.com ", "Alice")
        .await
        .unwrap();
    assert_eq!(alice.email, "alice@example.com");
    assert_eq!(alice.name, "Alice");

    let err = engine
        .create_user("ALICE@example.com", "Other Alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let loaded = engine.user(alice.id).await.unwrap();
    assert_eq!(loaded.id, alice.id);
    assert_eq!(loaded.email, alice.email);
}

#[tokio::test]
async fn blank_fields_and_unknown_ids_are_rejected() {
    let (engine, _db) = engine_with_db().await;

    let err = engine.create_user("   ", "Bob").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidUser(_)));
    let err = engine.create_user("bob@example.com", "").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidUser(_)));

    let err = engine.user(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::UserNotFound(_)));
}
