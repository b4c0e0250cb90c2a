mod api;
mod checkout;
mod entity;
mod error;
mod identifier;
mod lookup;
mod prepare;
mod pricing;
mod repository;
mod run;
mod serve;
mod timeline;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repository::OrderRepository;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Storefront order checkout and tracking service
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: SubCommandArgs,
    #[clap(short = 'u', long, env = "DATABASE_URL")]
    db_url: String,
    /// Upper bound for every database call, in milliseconds
    #[clap(long, env = "DB_TIMEOUT_MS", default_value = "5000")]
    db_timeout_ms: u64,
    #[clap(short = 'c', long, default_value = "4")]
    concurrent: u32,
}

#[derive(Subcommand, Debug)]
enum SubCommandArgs {
    /// Create the order tables, optionally seeding fake orders
    Prepare {
        #[clap(long)]
        reset: bool,
        #[clap(long, default_value = "0")]
        seed_orders: u32,
    },
    /// Serve the checkout and tracking HTTP API
    Serve {
        #[clap(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Drive rate-limited checkouts against the database
    Run {
        #[clap(long)]
        rate_limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_orders=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let timeout = Duration::from_millis(args.db_timeout_ms);
    let db = entity::connect(&args.db_url, timeout)
        .await
        .context("Failed to connect to database")?;
    let repository = OrderRepository::new(db, timeout);
    match args.command {
        SubCommandArgs::Prepare { .. } => {
            prepare::execute(&repository, &args)
                .await
                .context("Failed to prepare data")?;
        }
        SubCommandArgs::Serve { .. } => {
            serve::execute(&repository, &args)
                .await
                .context("Failed to serve")?;
        }
        SubCommandArgs::Run { .. } => {
            run::execute(&repository, &args).await.context("Failed to run")?;
        }
    }
    Ok(())
}
