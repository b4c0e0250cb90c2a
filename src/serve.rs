use crate::api::{router, AppState};
use crate::repository::OrderRepository;
use anyhow::{Context, Result};

pub struct Config {
    bind: String,
}

impl From<&super::Args> for Config {
    fn from(args: &super::Args) -> Self {
        match &args.command {
            super::SubCommandArgs::Serve { bind } => Self { bind: bind.clone() },
            _ => unreachable!(),
        }
    }
}

pub async fn execute<T: Into<Config>>(repository: &OrderRepository, config: T) -> Result<()> {
    let config = config.into();
    let app = router(AppState::new(repository.clone()));
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("order service listening on {}", config.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    tracing::info!("order service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
