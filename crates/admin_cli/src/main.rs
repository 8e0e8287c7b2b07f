use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Engine, ProviderConfig, WebhookOutcome};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "cashone_admin")]
#[command(about = "Admin utilities for Cashone (bootstrap users, provider sync)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./cashone.db?mode=rwc"
    )]
    database_url: String,

    /// Provider API base URL (also read from `PROVIDER_URL`).
    #[arg(long, env = "PROVIDER_URL")]
    provider_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Categories(Categories),
    Provider(Provider),
    Webhook(Webhook),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct Categories {
    #[command(subcommand)]
    command: CategoriesCommand,
}

#[derive(Subcommand, Debug)]
enum CategoriesCommand {
    /// Create the default category set for a user.
    Defaults(UserArg),
}

#[derive(Args, Debug)]
struct UserArg {
    #[arg(long)]
    user: Uuid,
}

#[derive(Args, Debug)]
struct Provider {
    #[command(subcommand)]
    command: ProviderCommand,
}

#[derive(Subcommand, Debug)]
enum ProviderCommand {
    Connect(ConnectArgs),
    Sync(UserArg),
    Status(UserArg),
    Disconnect(UserArg),
}

#[derive(Args, Debug)]
struct ConnectArgs {
    #[arg(long)]
    user: Uuid,
    /// Personal API token (also read from `PROVIDER_TOKEN`).
    #[arg(long, env = "PROVIDER_TOKEN", hide_env_values = true)]
    token: String,
}

#[derive(Args, Debug)]
struct Webhook {
    #[command(subcommand)]
    command: WebhookCommand,
}

#[derive(Subcommand, Debug)]
enum WebhookCommand {
    /// Feed a saved webhook payload through the ingestion path.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    #[arg(long)]
    file: std::path::PathBuf,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("engine=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let db = connect_db(&cli.database_url).await?;
    tracing::debug!(url = %cli.database_url, "database ready");

    let mut provider = ProviderConfig::default();
    if let Some(url) = cli.provider_url {
        provider.base_url = url;
    }
    let engine = Engine::builder()
        .database(db)
        .provider(provider)
        .build()
        .await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let user = engine.create_user(&args.email, &args.name).await?;
            println!("created user: {} ({})", user.email, user.id);
        }
        Command::Categories(Categories {
            command: CategoriesCommand::Defaults(args),
        }) => {
            let created = engine.create_default_categories(args.user).await?;
            println!("created {} categories", created.len());
        }
        Command::Provider(Provider { command }) => match command {
            ProviderCommand::Connect(args) => {
                let cards = engine.connect(args.user, &args.token).await?;
                for card in cards {
                    println!("{}  {}  {} {}", card.id, card.name, card.balance, card.currency);
                }
            }
            ProviderCommand::Sync(args) => {
                let report = engine.sync_user_data(args.user).await?;
                println!(
                    "synced {} cards: {} imported, {} duplicates",
                    report.cards_synced, report.imported, report.duplicates
                );
                for failure in &report.failures {
                    eprintln!("{}: {}", failure.account_id, failure.message);
                }
                if !report.is_clean() {
                    std::process::exit(1);
                }
            }
            ProviderCommand::Status(args) => {
                let user = engine.user(args.user).await?;
                let status = engine.status(args.user).await?;
                println!("user: {} <{}>", user.name, user.email);
                println!("client: {}", status.client_id);
                println!("cards: {}", status.card_count);
                match status.last_sync_at {
                    Some(at) => println!("last sync: {at}"),
                    None => println!("last sync: never"),
                }
                if let Some(error) = status.sync_error {
                    println!("sync error: {error}");
                }
            }
            ProviderCommand::Disconnect(args) => {
                engine.disconnect(args.user).await?;
                println!("disconnected");
            }
        },
        Command::Webhook(Webhook {
            command: WebhookCommand::Replay(args),
        }) => {
            let payload = tokio::fs::read(&args.file).await?;
            match engine.handle_webhook(&payload).await? {
                WebhookOutcome::Ingested(tx) => {
                    println!("ingested transaction {} on card {}", tx.id, tx.card_id);
                }
                WebhookOutcome::Duplicate => println!("already stored"),
                WebhookOutcome::Ignored => println!("ignored"),
            }
        }
    }

    Ok(())
}
