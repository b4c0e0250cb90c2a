use crate::checkout::{CheckoutRequest, CheckoutService};
use crate::entity::schema_setup;
use crate::repository::OrderRepository;
use anyhow::{Context, Result};
use futures::future::join_all;

pub struct Config {
    reset: bool,
    seed_orders: u32,
    concurrent: u32,
}

impl From<&super::Args> for Config {
    fn from(args: &super::Args) -> Self {
        let (reset, seed_orders) = match args.command {
            super::SubCommandArgs::Prepare { reset, seed_orders } => (reset, seed_orders),
            _ => unreachable!(),
        };
        Self {
            reset,
            seed_orders,
            concurrent: args.concurrent.max(1),
        }
    }
}

pub async fn execute<T: Into<Config>>(repository: &OrderRepository, config: T) -> Result<()> {
    let config = config.into();
    // create tables
    schema_setup(repository.connection(), config.reset)
        .await
        .context("Failed to setup schema")?;
    // seed orders
    if config.seed_orders > 0 {
        seed_orders(repository, &config)
            .await
            .context("Failed to seed orders")?;
    }
    Ok(())
}

/// Place `seed_orders` fake checkouts spread over `concurrent` tasks.
async fn seed_orders(repository: &OrderRepository, config: &Config) -> Result<()> {
    let count = config.seed_orders;
    let concurrent = config.concurrent;
    let mut join_handle_vec = Vec::new();
    for i in 0..concurrent {
        let checkout = CheckoutService::new(repository.clone());
        let mut unit_count = count / concurrent;
        if i == concurrent - 1 {
            unit_count += count - (unit_count * concurrent);
        }
        let handle = tokio::spawn(async move {
            for _ in 0..unit_count {
                checkout
                    .place_order(CheckoutRequest::rand_fake_new())
                    .await?;
            }
            Ok::<_, crate::error::OrderError>(unit_count)
        });
        join_handle_vec.push(handle);
    }
    let mut placed = 0;
    for handle in join_all(join_handle_vec).await {
        placed += handle??;
    }
    tracing::info!(placed, "seed orders placed");
    Ok(())
}
