use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "cashone={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let provider = settings
        .provider
        .as_ref()
        .map(settings::Provider::config)
        .unwrap_or_default();
    tracing::info!(provider = %provider.base_url, "starting engine");

    let engine = engine::Engine::builder()
        .database(db)
        .provider(provider)
        .build()
        .await?;

    let Some(sync) = settings.sync else {
        tracing::info!("no sync settings, nothing to poll");
        return Ok(());
    };
    if sync.interval_secs == 0 {
        return Err("sync.interval_secs must be > 0".into());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(sync.interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::info!(interval_secs = sync.interval_secs, "polling provider");

    loop {
        tokio::select! {
            _ = ticker.tick() => poll_all(&engine).await,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// One polling round. Failures are logged and never stop the loop.
async fn poll_all(engine: &engine::Engine) {
    let users = match engine.connected_users().await {
        Ok(users) => users,
        Err(err) => {
            tracing::error!("failed to list connected users: {err}");
            return;
        }
    };

    for user_id in users {
        match engine.sync_user_data(user_id).await {
            Ok(report) if report.is_clean() => {
                tracing::debug!(user_id = %user_id, imported = report.imported, "user synced");
            }
            Ok(report) => {
                tracing::warn!(
                    user_id = %user_id,
                    imported = report.imported,
                    failures = report.failures.len(),
                    "user synced with failures"
                );
            }
            Err(err) => tracing::error!(user_id = %user_id, "sync failed: {err}"),
        }
    }
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
        Database::Url(url) => url.clone(),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
