#![allow(dead_code)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use uuid::Uuid;

use engine::{Card, Currency, Engine, NewCard, ProviderConfig};
use migration::MigratorTrait;

pub async fn database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = database().await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// Engine talking to a fake provider at `base_url`.
pub async fn engine_with_provider(base_url: String) -> (Engine, DatabaseConnection) {
    let db = database().await;
    let engine = Engine::builder()
        .database(db.clone())
        .provider(ProviderConfig {
            base_url,
            request_timeout: Duration::from_secs(5),
        })
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn user(engine: &Engine, email: &str) -> Uuid {
    engine.create_user(email, "Test User").await.unwrap().id
}

pub async fn manual_card(engine: &Engine, user_id: Uuid, balance: i64, credit_limit: i64) -> Card {
    engine
        .create_manual_card(
            user_id,
            NewCard {
                name: "Cash".to_string(),
                masked_pan: None,
                balance,
                credit_limit,
                currency: Currency::UAH,
            },
        )
        .await
        .unwrap()
}

pub fn account(id: &str, account_type: &str, pan: &str, balance: i64, credit_limit: i64) -> Value {
    json!({
        "id": id,
        "sendId": format!("send-{id}"),
        "balance": balance,
        "creditLimit": credit_limit,
        "type": account_type,
        "currencyCode": 980,
        "cashbackType": "UAH",
        "maskedPan": [pan],
        "iban": "UA213223130000026007233566001"
    })
}

pub fn client_info(client_id: &str, accounts: Vec<Value>) -> Value {
    json!({
        "clientId": client_id,
        "name": "Jane Doe",
        "webHookUrl": "",
        "permissions": "psfj",
        "accounts": accounts
    })
}

pub fn statement_item(id: &str, time: DateTime<Utc>, amount: i64, balance: i64) -> Value {
    json!({
        "id": id,
        "time": time.timestamp(),
        "description": format!("item {id}"),
        "mcc": 5411,
        "originalMcc": 5411,
        "hold": false,
        "amount": amount,
        "operationAmount": amount,
        "currencyCode": 980,
        "commissionRate": 0,
        "cashbackAmount": 0,
        "balance": balance,
        "comment": null
    })
}

pub fn webhook(account: &str, item: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "StatementItem",
        "data": {
            "account": account,
            "statementItem": item
        }
    }))
    .unwrap()
}
