//! Leakscope Server - HTTP service and pass scheduling.
//!
//! Serves the extraction and relay endpoints and, in the same process, runs
//! periodic passes over the input directory. A shared
//! [`CancellationToken`] stops both: the HTTP server drains in-flight
//! requests and the pass loop finishes the input it is working on.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::build_app;
pub use state::AppState;

use anyhow::Context;
use leakscope_core::AppConfig;
use leakscope_scanner::Pipeline;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Initialize the tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,leakscope=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Cancel `cancel` on Ctrl-C.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!("failed to listen for shutdown signal: {}", e),
        }
        cancel.cancel();
    });
}

/// Fail on a missing input directory; create the processed directory.
pub fn prepare_input_dir(config: &AppConfig) -> anyhow::Result<()> {
    config
        .input
        .ensure_input_dir()
        .context("Input directory is required")?;

    let processed = config.input.processed_path();
    if let Err(e) = std::fs::create_dir_all(&processed) {
        warn!("Failed to create {:?}: {}", processed, e);
    }
    Ok(())
}

/// Run passes every `interval` until cancelled.
pub async fn run_pass_loop(mut pipeline: Pipeline, interval: Duration, cancel: CancellationToken) {
    loop {
        match pipeline.run_pass().await {
            Ok(report) if report.fresh_creds() > 0 => info!(
                run_id = %report.run_id,
                fresh_creds = report.fresh_creds(),
                "pass forwarded new credentials"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "pass failed"),
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    info!("pass loop stopped");
}

/// Serve HTTP and, when an interval is configured, the pass loop.
pub async fn serve(config: AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    prepare_input_dir(&config)?;

    let state = AppState::from_config(&config).context("Failed to set up alert sink")?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;
    info!("Listening on {}", config.server.bind);

    let pass_loop = if config.input.scan_interval_secs > 0 {
        let pipeline = Pipeline::from_config(&config)
            .context("Failed to set up pipeline")?
            .with_cancellation(cancel.clone());
        let interval = Duration::from_secs(config.input.scan_interval_secs);
        info!("Scanning {:?} every {:?}", config.input.input_dir, interval);
        Some(tokio::spawn(run_pass_loop(pipeline, interval, cancel.clone())))
    } else {
        None
    };

    let shutdown = cancel.clone();
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;

    if let Some(handle) = pass_loop {
        handle.await.context("Pass loop panicked")?;
    }
    Ok(())
}
