//! HTTP client for the provider personal API.
//!
//! The client is stateless apart from its connection pool: the token travels
//! with every call in the `X-Token` header, so one client serves every user.

use std::{collections::HashSet, time::Duration};

use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{EngineError, ResultEngine};

mod wire;

pub use wire::{Account, ClientInfo, StatementItem, StatementItemEvent, WebhookEnvelope};

const TOKEN_HEADER: &str = "X-Token";

/// Longest statement window the provider accepts: 31 days and one hour.
pub(crate) const STATEMENT_MAX_WINDOW_SECS: i64 = 2_682_000;
/// Items returned by one statement call at most.
pub(crate) const STATEMENT_PAGE_LIMIT: usize = 500;

/// Where and how the provider API is reached.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Upper bound for one request, connect and body included.
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.monobank.ua".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_description: String,
}

#[derive(Clone, Debug)]
pub(crate) struct ProviderClient {
    client: Client,
    base_url: String,
}

impl ProviderClient {
    pub(crate) fn new(config: &ProviderConfig) -> ResultEngine<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("cashone-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &str, path: &str) -> ResultEngine<T> {
        let resp = self
            .client
            .get(self.url(path))
            .header(TOKEN_HEADER, token)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(EngineError::TokenInvalid);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(EngineError::RateLimited { retry_after });
        }

        let body = resp.bytes().await?;
        if !status.is_success() {
            let message = match serde_json::from_slice::<ErrorBody>(&body) {
                Ok(err) => err.error_description,
                Err(_) => String::from_utf8_lossy(&body).trim().to_string(),
            };
            return Err(EngineError::ProviderApi(format!("{status}: {message}")));
        }

        serde_json::from_slice(&body)
            .map_err(|err| EngineError::ProviderApi(format!("undecodable response: {err}")))
    }

    pub(crate) async fn client_info(&self, token: &str) -> ResultEngine<ClientInfo> {
        self.get_json(token, "/personal/client-info").await
    }

    /// Statement items of `account` with `from <= time <= to` (unix seconds),
    /// oldest first and without repeated ids.
    ///
    /// The provider answers at most [`STATEMENT_PAGE_LIMIT`] items per call,
    /// newest first. A full page is followed by another request that ends at
    /// the oldest time seen, until a page comes back short. The window must
    /// not exceed [`STATEMENT_MAX_WINDOW_SECS`].
    pub(crate) async fn statement(
        &self,
        token: &str,
        account: &str,
        from: i64,
        to: i64,
    ) -> ResultEngine<Vec<StatementItem>> {
        let mut items: Vec<StatementItem> = Vec::new();
        let mut upper = to;
        loop {
            let page: Vec<StatementItem> = self
                .get_json(token, &format!("/personal/statement/{account}/{from}/{upper}"))
                .await?;
            let full = page.len() >= STATEMENT_PAGE_LIMIT;
            let oldest = page.iter().map(|item| item.time).min();
            items.extend(page);
            match oldest {
                Some(oldest) if full && oldest > from && oldest < upper => upper = oldest,
                _ => break,
            }
        }

        items.retain(|item| item.time >= from && item.time <= to);
        items.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.id.clone()));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client(server: &MockServer) -> ProviderClient {
        ProviderClient::new(&ProviderConfig {
            base_url: server.base_url(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sends_token_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/personal/client-info")
                    .header("x-token", "secret");
                then.status(200).json_body(json!({
                    "clientId": "c1",
                    "permissions": "psfj",
                    "accounts": []
                }));
            })
            .await;

        let info = client(&server).client_info("secret").await.unwrap();

        mock.assert_async().await;
        assert_eq!(info.client_id, "c1");
        assert!(info.accounts.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_token_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/personal/client-info");
                then.status(401)
                    .json_body(json!({ "errorDescription": "Unknown 'X-Token'" }));
            })
            .await;

        let err = client(&server).client_info("revoked").await.unwrap_err();
        assert_eq!(err, EngineError::TokenInvalid);
    }

    #[tokio::test]
    async fn too_many_requests_carries_retry_after() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/personal/statement/acc/1700000000/1700003600");
                then.status(429).header("Retry-After", "60");
            })
            .await;

        let err = client(&server)
            .statement("tok", "acc", 1_700_000_000, 1_700_003_600)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::RateLimited { retry_after: Some(60) });
    }

    #[tokio::test]
    async fn other_failures_keep_provider_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/personal/client-info");
                then.status(500)
                    .json_body(json!({ "errorDescription": "maintenance" }));
            })
            .await;

        let err = client(&server).client_info("tok").await.unwrap_err();
        match err {
            EngineError::ProviderApi(message) => {
                assert!(message.contains("500"), "message: {message}");
                assert!(message.contains("maintenance"), "message: {message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_a_provider_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/personal/client-info");
                then.status(200).body("<html>oops</html>");
            })
            .await;

        let err = client(&server).client_info("tok").await.unwrap_err();
        assert!(matches!(err, EngineError::ProviderApi(_)));
    }

    fn item(time: i64) -> serde_json::Value {
        json!({
            "id": format!("it-{time}"),
            "time": time,
            "amount": -100,
            "currencyCode": 980,
            "balance": 0
        })
    }

    #[tokio::test]
    async fn full_page_requests_the_older_remainder() {
        let server = MockServer::start_async().await;
        let newest: Vec<_> = (4_500..5_000).rev().map(item).collect();
        let first = server
            .mock_async(|when, then| {
                when.method(GET).path("/personal/statement/acc/1000/5000");
                then.status(200).json_body(json!(newest));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET).path("/personal/statement/acc/1000/4500");
                then.status(200)
                    .json_body(json!([item(4_500), item(2_000), item(1_500)]));
            })
            .await;

        let items = client(&server)
            .statement("tok", "acc", 1_000, 5_000)
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(items.len(), 502);
        assert_eq!(items[0].time, 1_500);
        assert_eq!(items[1].time, 2_000);
        assert_eq!(items[2].time, 4_500);
        assert_eq!(items.last().map(|i| i.time), Some(4_999));
    }

    #[tokio::test]
    async fn short_page_is_the_last_one() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/personal/statement/acc/1000/5000");
                then.status(200).json_body(json!([item(4_000), item(900), item(3_000)]));
            })
            .await;

        let items = client(&server)
            .statement("tok", "acc", 1_000, 5_000)
            .await
            .unwrap();

        mock.assert_calls_async(1).await;
        let times: Vec<i64> = items.iter().map(|i| i.time).collect();
        assert_eq!(times, vec![3_000, 4_000]);
    }
}
