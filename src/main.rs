use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use s3_upload_proxy::api::{build_router, AppState};
use s3_upload_proxy::core::config::AppConfig;
use s3_upload_proxy::core::shutdown::ShutdownCoordinator;
use s3_upload_proxy::observability::{logging, metrics as obs_metrics};
use s3_upload_proxy::storage::Backend;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration (defaults → CONFIG_FILE → env vars)
    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_tracing(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("upload proxy failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        driver = %config.storage.driver,
        bucket = %config.storage.bucket,
        rules = config.cache_control.rules().len(),
        "upload proxy starting"
    );

    if let Some(port) = config.server.metrics_port {
        match obs_metrics::install_prometheus_exporter(port) {
            Ok(addr) => info!(%addr, "metrics exporter listening"),
            Err(e) => warn!(error = %e, "failed to install metrics exporter, continuing without metrics"),
        }
    }

    let backend = Backend::from_config(&config.storage)
        .await
        .context("failed to initialize object store")?;
    info!(driver = %backend.driver(), "object store selected");

    let shutdown = ShutdownCoordinator::new();
    let state = AppState::new(
        Arc::new(backend),
        config.cache_control.clone(),
        config.storage.bucket.as_str(),
        shutdown.token(),
    );
    let app = build_router(state, &config.server.healthcheck_path);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        healthcheck_path = %config.server.healthcheck_path,
        "HTTP server listening"
    );

    let server_cancel = shutdown.token();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
    });

    // In-flight requests observe the cancelled root token and abort their
    // backend calls; the server then drains.
    let served = tokio::select! {
        _ = shutdown.wait_for_signal_and_shutdown() => server.await,
        res = &mut server => {
            shutdown.trigger_shutdown();
            res
        }
    };

    served
        .context("HTTP server task panicked")?
        .context("HTTP server error")?;
    info!("upload proxy stopped");
    Ok(())
}
