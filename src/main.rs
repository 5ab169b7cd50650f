use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::info;
use translation_orchestrator::api;
use translation_orchestrator::app::AppServices;
use translation_orchestrator::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_orchestrator=info".parse()?),
        )
        .init();

    info!("Starting translation orchestrator");

    let config = Config::from_env()?;
    let port = config.port;

    let app = AppServices::start(config).await?;
    let router = api::router(app.api_state());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("✓ Listening on http://{}", addr);

    let shutdown = app.shutdown_token();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await
        .context("Server error")?;

    app.shutdown().await
}
