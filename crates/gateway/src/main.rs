mod config;
mod error;
mod manager;
mod routes;
mod stream;

use anyhow::Context;
use common::{Environment, setup_logging};
use config::GatewayConfig;
use manager::PipelineManager;
use pipeline::HttpPoseEstimator;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;
    let environment = Environment::from_env();
    setup_logging(environment);

    tracing::info!(
        environment = environment.as_str(),
        "gateway starting with config: {:?}",
        config
    );

    std::fs::create_dir_all(&config.uploads_dir)
        .with_context(|| format!("failed to create uploads dir {}", config.uploads_dir))?;

    // Built before the runtime: the estimator's blocking client only
    // ever runs on the manager's worker threads.
    let estimator = Arc::new(
        HttpPoseEstimator::new(
            config.estimator_url.clone(),
            config.min_confidence,
            config.estimator_timeout(),
        )
        .context("failed to build pose estimator client")?,
    );
    let manager = Arc::new(PipelineManager::new(config.clone(), estimator));

    let runtime = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
    runtime.block_on(serve(Arc::clone(&manager), &config.listen_addr))?;

    manager.shutdown();
    Ok(())
}

async fn serve(manager: Arc<PipelineManager>, listen_addr: &str) -> anyhow::Result<()> {
    let app = routes::router(manager);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
