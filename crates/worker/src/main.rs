use std::sync::Arc;

use anyhow::Context;
use lswb_core::config::PipelineConfig;
use lswb_pipeline::{PipelineContext, PipelineService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lswb_worker=debug,lswb_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PipelineConfig::from_env();
    let interval = config.cycle_interval;
    let base_remote_dir = config.base_remote_dir.clone();

    let context = PipelineContext::from_config(config)
        .await
        .context("failed to initialise pipeline")?;
    let service = Arc::new(PipelineService::new(context));
    let max_frames = service.runtime_settings().await.max_frames;
    tracing::info!(
        interval_secs = interval.as_secs(),
        max_frames,
        %base_remote_dir,
        "Worker starting"
    );

    let cancel = CancellationToken::new();
    let cycles = tokio::spawn(lswb_worker::cycle::run(
        Arc::clone(&service),
        max_frames,
        interval,
        cancel.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl-C handler")?;
    tracing::info!("Received Ctrl-C, stopping after the current cycle");
    cancel.cancel();

    let completed = cycles.await.context("harvest loop panicked")?;
    tracing::info!(completed, "Worker stopped");
    Ok(())
}
