use crate::bootstrap::{build_provider, build_state};
use crate::config::AppConfig;
use crate::server::router;
use anyhow::{Context, Result};
use tracing::info;

pub async fn run(config: AppConfig) -> Result<()> {
    let provider = build_provider(&config);
    let state = build_state(&config, provider)?;
    let app = router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        "Serving {} variant on http://{}",
        config.variant,
        listener.local_addr().context("Failed to read bound address")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
}
