use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diagnostic_ledger::api;
use diagnostic_ledger::config::AppConfig;
use diagnostic_ledger::LedgerService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diagnostic_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Diagnostic Ledger");

    let config = AppConfig::load()?;
    info!("Configuration loaded");

    let service = Arc::new(LedgerService::from_config(&config).await?);
    info!("{}", service.health_check().await);

    let app = api::router(service.clone());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    service.database().close().await;
    Ok(())
}
