//! Sync engine binary for the Mevo map sync.
//!
//! Wires the feed client, icon fetcher, render queue, and orchestrator
//! together and runs sync cycles against the bundled in-memory surface.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `mevo-config.yaml`
//! 3. Spawn the render queue over the in-memory surface
//! 4. Build the feed client, icon fetcher, and reconciler
//! 5. Signal style-ready and run cycles until done or Ctrl-C
//! 6. Log the final registry

mod error;

use std::path::Path;
use std::sync::Arc;

use mevo_core::{FeedOutcome, SyncConfig, SyncOrchestrator};
use mevo_events::EventBus;
use mevo_feed::{FeedClient, IconFetcher};
use mevo_render::{InMemorySurface, Reconciler, spawn_render_queue};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const CONFIG_PATH: &str = "mevo-config.yaml";

/// Application entry point for the sync engine.
///
/// # Errors
///
/// Returns an error if configuration, client setup, or the sync run fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("mevo-engine starting");

    let config = load_config()?;
    info!(
        base_url = %config.feed.base_url,
        area = %config.feed.area,
        feeds = ?config.feed.feeds,
        refresh_interval_secs = config.sync.refresh_interval_secs,
        "Configuration loaded"
    );

    run(&config).await?;
    info!("mevo-engine stopped");
    Ok(())
}

/// Install the global subscriber. `MEVO_LOG_FORMAT=json` switches to JSON
/// lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("MEVO_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn load_config() -> Result<SyncConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(SyncConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(SyncConfig::from_env())
    }
}

async fn run(config: &SyncConfig) -> Result<(), EngineError> {
    let events = EventBus::new();
    tokio::spawn(log_events(events.subscribe()));

    let (render, actor) = spawn_render_queue(InMemorySurface::new(), config.render.queue_capacity);
    let client = FeedClient::new(&config.feed.base_url, config.feed.request_timeout())?;
    let icons = Arc::new(IconFetcher::new(
        config.icons.request_timeout(),
        config.icons.max_bytes,
    )?);
    let reconciler = Reconciler::new(
        render.clone(),
        icons,
        events.clone(),
        config.reconciler_settings(),
    );
    let mut orchestrator = SyncOrchestrator::new(
        client,
        reconciler,
        events,
        config.feed.area.clone(),
        config.feed.feeds.clone(),
    );

    // The in-memory surface has no style to load.
    let (ready_tx, ready_rx) = oneshot::channel();
    ready_tx.send(()).ok();

    let summary = orchestrator
        .run(ready_rx, config.sync.refresh_interval(), shutdown_signal())
        .await?;
    orchestrator.settle_icons().await;

    if let Some(last) = &summary.last {
        for result in &last.feeds {
            match &result.outcome {
                FeedOutcome::Populated { report } => info!(
                    feed = %result.feed,
                    sources = report.sources.len(),
                    rejected = report.rejected.len(),
                    "feed synced"
                ),
                FeedOutcome::Empty { removed } => {
                    info!(feed = %result.feed, removed, "feed empty");
                }
                FeedOutcome::Absent => info!(feed = %result.feed, "feed absent"),
                FeedOutcome::FetchFailed { error } => {
                    warn!(feed = %result.feed, error = %error, "feed fetch failed");
                }
                FeedOutcome::ParseFailed { error } => {
                    warn!(feed = %result.feed, error = %error, "feed parse failed");
                }
            }
        }
    }

    let registry = render.snapshot().await?;
    info!(
        cycles = summary.cycles,
        sources = registry.sources().len(),
        images = registry.images().len(),
        layers = registry.layers().len(),
        "Final render registry"
    );

    drop(orchestrator);
    drop(render);
    match actor.await {
        Ok(surface) => debug!(ops = surface.ops().len(), "render surface released"),
        Err(e) => warn!(error = %e, "render queue task failed"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

async fn log_events(mut rx: broadcast::Receiver<mevo_events::EventEnvelope>) {
    loop {
        match rx.recv().await {
            Ok(envelope) => match serde_json::to_string(&envelope) {
                Ok(line) => debug!(event = %line, "sync event"),
                Err(e) => warn!(error = %e, "failed to serialize sync event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
