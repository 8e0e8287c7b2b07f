//! Application settings, read from `settings.toml` in the working directory
//! and overridden by `CASHONE__*` environment variables, e.g.
//! `CASHONE__APP__LEVEL=debug` or `CASHONE__SYNC__INTERVAL_SECS=300`.
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [database]
//! sqlite = "cashone.db"
//!
//! [provider]
//! base_url = "https://api.monobank.ua"
//! request_timeout_secs = 30
//!
//! [sync]
//! interval_secs = 300
//! ```
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
    /// Any connection string understood by sea-orm.
    Url(String),
}

#[derive(Debug, Deserialize)]
pub struct Provider {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Provider {
    pub fn config(&self) -> engine::ProviderConfig {
        let mut config = engine::ProviderConfig::default();
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct Polling {
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
    pub provider: Option<Provider>,
    /// Periodic polling of every connected user. Disabled when absent.
    pub sync: Option<Polling>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("CASHONE").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
