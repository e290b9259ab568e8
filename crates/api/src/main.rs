use std::sync::Arc;
use std::time::Duration;

use lswb_api::background::archive::ArchiveJob;
use lswb_api::config::ServerConfig;
use lswb_api::router::build_app_router;
use lswb_api::state::AppState;
use lswb_core::config::PipelineConfig;
use lswb_pipeline::{PipelineContext, PipelineService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lswb_api=debug,lswb_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        base_remote_dir = %pipeline_config.base_remote_dir,
        dataset = %pipeline_config.dataset_path.display(),
        layout = ?pipeline_config.dataset_layout,
        "Loaded pipeline configuration"
    );

    // --- Pipeline ---
    let archive = Arc::new(ArchiveJob::new(&pipeline_config));
    let context = PipelineContext::from_config(pipeline_config)
        .await
        .expect("Failed to initialise pipeline");
    tracing::info!("Pipeline ready");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline: Arc::new(PipelineService::new(context)),
        archive,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = config.bind_addr().expect("Invalid HOST address");
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let shutdown_timeout = config.shutdown_timeout();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix). In-flight requests
/// get `drain` to finish before the process exits regardless.
async fn shutdown_signal(drain: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }

    tokio::spawn(async move {
        tokio::time::sleep(drain).await;
        tracing::warn!(drain_secs = drain.as_secs(), "Requests still running after drain timeout, exiting");
        std::process::exit(0);
    });
}
