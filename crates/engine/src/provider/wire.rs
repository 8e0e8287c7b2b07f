//! JSON shapes of the provider personal API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, TransactionKind};

/// `GET /personal/client-info`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub client_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "webHookUrl")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub balance: i64,
    #[serde(default)]
    pub credit_limit: i64,
    #[serde(rename = "type", default)]
    pub account_type: String,
    pub currency_code: i32,
    #[serde(default)]
    pub masked_pan: Vec<String>,
}

impl Account {
    /// First masked PAN, empty when the provider sends none.
    pub fn primary_pan(&self) -> &str {
        self.masked_pan.first().map(String::as_str).unwrap_or_default()
    }

    /// Display name used when the card is first created, e.g. `black (4441****1111)`.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.account_type, self.primary_pan())
    }
}

/// One line of `GET /personal/statement/{account}/{from}/{to}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementItem {
    pub id: String,
    /// Unix seconds.
    pub time: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mcc: i32,
    #[serde(default)]
    pub hold: bool,
    /// Signed, in the account currency: negative is money out.
    pub amount: i64,
    #[serde(default)]
    pub operation_amount: i64,
    pub currency_code: i32,
    #[serde(default)]
    pub commission_rate: i64,
    #[serde(default)]
    pub cashback_amount: i64,
    /// Account balance after the operation.
    pub balance: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

impl StatementItem {
    /// Provider records are never classified as transfers.
    pub fn kind(&self) -> TransactionKind {
        if self.amount < 0 {
            TransactionKind::Expense
        } else {
            TransactionKind::Income
        }
    }

    pub fn occurred_at(&self) -> ResultEngine<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0).ok_or_else(|| {
            EngineError::ProviderApi(format!(
                "statement item {} has invalid time {}",
                self.id, self.time
            ))
        })
    }
}

/// Push notification body.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementItemEvent {
    pub account: String,
    pub statement_item: StatementItem,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_client_info() {
        let info: ClientInfo = serde_json::from_str(
            r#"{
                "clientId": "3MSaMMtczs",
                "name": "Jane Doe",
                "webHookUrl": "https://example.com/hook",
                "permissions": "psfj",
                "accounts": [{
                    "id": "kKGVoZuHWzqVoZuH",
                    "sendId": "uHWzqVoZuH",
                    "balance": 10000000,
                    "creditLimit": 10000000,
                    "type": "black",
                    "currencyCode": 980,
                    "cashbackType": "UAH",
                    "maskedPan": ["537541******1234"],
                    "iban": "UA733220010000026201234567890"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(info.client_id, "3MSaMMtczs");
        assert_eq!(info.webhook_url.as_deref(), Some("https://example.com/hook"));
        let account = &info.accounts[0];
        assert_eq!(account.display_name(), "black (537541******1234)");
        assert_eq!(account.credit_limit, 10_000_000);
    }

    #[test]
    fn statement_item_sign_decides_kind() {
        let item: StatementItem = serde_json::from_str(
            r#"{
                "id": "ZuHWzqkKGVo=",
                "time": 1554466347,
                "description": "Coffee",
                "mcc": 5814,
                "originalMcc": 5814,
                "hold": false,
                "amount": -9500,
                "operationAmount": -9500,
                "currencyCode": 980,
                "commissionRate": 0,
                "cashbackAmount": 19,
                "balance": 1000000,
                "comment": "for two"
            }"#,
        )
        .unwrap();

        assert_eq!(item.kind(), TransactionKind::Expense);
        assert_eq!(item.occurred_at().unwrap().timestamp(), 1_554_466_347);

        let refund = StatementItem { amount: 9500, ..item };
        assert_eq!(refund.kind(), TransactionKind::Income);
    }

    #[test]
    fn account_without_pan_has_empty_suffix() {
        let account = Account {
            id: "acc".to_string(),
            balance: 0,
            credit_limit: 0,
            account_type: "fop".to_string(),
            currency_code: 980,
            masked_pan: Vec::new(),
        };
        assert_eq!(account.display_name(), "fop ()");
    }
}
