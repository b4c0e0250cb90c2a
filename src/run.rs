//! Load driver: rate-limited concurrent checkouts, each followed by a
//! tracking lookup, with per-second latency percentiles.

use crate::checkout::{CheckoutRequest, CheckoutService};
use crate::error::OrderResult;
use crate::lookup::OrderLookup;
use crate::repository::OrderRepository;
use anyhow::{Context, Result};
use flume::{Receiver, Sender};
use futures::future::join_all;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    concurrent: u32,
    rate_limit: u32,
}

impl From<&super::Args> for Config {
    fn from(args: &super::Args) -> Self {
        let rate_limit = match args.command {
            super::SubCommandArgs::Run { rate_limit } => rate_limit,
            _ => unreachable!(),
        };
        Self {
            concurrent: args.concurrent.max(1),
            rate_limit,
        }
    }
}

const TOKEN_NUMBER_PRE_SECOND: u32 = 50;

/// Outcome of one checkout + track round trip.
#[derive(Debug, Clone, Copy)]
struct Sample {
    ok: bool,
    elapsed_ms: u32,
}

pub async fn execute<T: Into<Config>>(repository: &OrderRepository, config: T) -> Result<()> {
    let config = config.into();
    let (token_tx, token_rx) = flume::bounded(10);
    let (metrics_tx, metrics_rx) = flume::unbounded();
    token_generator(token_tx, config.rate_limit)?;
    tracing::info!(
        rate_limit = config.rate_limit,
        concurrent = config.concurrent,
        "driving checkouts, press Ctrl-C to stop"
    );
    let (result, ()) = tokio::join!(
        checkout_service(repository, token_rx, metrics_tx, config.concurrent),
        metrics_service(metrics_rx)
    );
    result
}

fn token_generator(token_tx: Sender<u32>, rate_limit: u32) -> Result<()> {
    let (exit_tx, exit_rx) = flume::bounded(1);
    ctrlc::set_handler(move || {
        let _ = exit_tx.try_send(());
    })
    .context("Error setting Ctrl-C handler")?;
    let rate_unit = (rate_limit / TOKEN_NUMBER_PRE_SECOND).max(1);
    tokio::spawn(async move {
        loop {
            if exit_rx.try_recv().is_ok() {
                tracing::info!("receive the exit signal, exit...");
                return;
            }
            let _ = token_tx.send_timeout(rate_unit, Duration::from_millis(50));
            sleep(Duration::from_millis(1000 / TOKEN_NUMBER_PRE_SECOND as u64)).await;
        }
    });
    Ok(())
}

async fn round_trip(checkout: &CheckoutService, lookup: &OrderLookup) -> OrderResult<()> {
    let request = CheckoutRequest::rand_fake_new();
    let email = request.user.email.clone();
    let receipt = checkout.place_order(request).await?;
    lookup.track(&receipt.order_code, Some(&email)).await?;
    Ok(())
}

async fn checkout_service(
    repository: &OrderRepository,
    token_rx: Receiver<u32>,
    metrics_tx: Sender<Sample>,
    concurrent: u32,
) -> Result<()> {
    let mut join_handle_vec = Vec::new();
    for _ in 0..concurrent {
        let checkout = CheckoutService::new(repository.clone());
        let lookup = OrderLookup::new(repository.clone());
        let token_rx = token_rx.clone();
        let metrics_tx = metrics_tx.clone();
        let handle = tokio::spawn(async move {
            while let Ok(token) = token_rx.recv_async().await {
                for _ in 0..token {
                    let now = Instant::now();
                    let result = round_trip(&checkout, &lookup).await;
                    if let Err(err) = &result {
                        tracing::warn!(error = %err, "checkout round trip failed");
                    }
                    let _ = metrics_tx.send(Sample {
                        ok: result.is_ok(),
                        elapsed_ms: now.elapsed().as_millis() as u32,
                    });
                }
            }
        });
        join_handle_vec.push(handle);
    }
    drop(metrics_tx);
    for handle in join_all(join_handle_vec).await {
        handle.context("checkout worker panicked")?;
    }
    Ok(())
}

/// Value at quantile `q` of an ascending slice.
fn percentile(sorted: &[u32], q: f32) -> u32 {
    if sorted.is_empty() {
        return 0;
    }
    let index = ((sorted.len() as f32 * q) as usize).min(sorted.len() - 1);
    sorted[index]
}

async fn metrics_service(metrics_rx: Receiver<Sample>) {
    let mut now = Instant::now();
    let mut execute_time_vec = vec![];
    let mut failed = 0u32;
    while let Ok(sample) = metrics_rx.recv_async().await {
        execute_time_vec.push(sample.elapsed_ms);
        if !sample.ok {
            failed += 1;
        }
        if now.elapsed() > Duration::from_secs(1) {
            execute_time_vec.sort_unstable();
            tracing::info!(
                p50 = percentile(&execute_time_vec, 0.5),
                p80 = percentile(&execute_time_vec, 0.8),
                p95 = percentile(&execute_time_vec, 0.95),
                p99 = percentile(&execute_time_vec, 0.99),
                p999 = percentile(&execute_time_vec, 0.999),
                max = execute_time_vec.last().copied().unwrap_or(0),
                orders = execute_time_vec.len(),
                failed,
                "checkout latency (ms)"
            );
            now = Instant::now();
            failed = 0;
            execute_time_vec.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_picks_from_sorted_samples() {
        let samples: Vec<u32> = (1..=100).collect();
        assert_eq!(percentile(&samples, 0.5), 51);
        assert_eq!(percentile(&samples, 0.99), 100);
        assert_eq!(percentile(&samples, 0.999), 100);
        assert_eq!(percentile(&[7], 0.95), 7);
        assert_eq!(percentile(&[], 0.5), 0);
    }
}
