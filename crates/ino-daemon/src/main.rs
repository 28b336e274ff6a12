// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use ino_daemon::{AppState, build_app, build_context, build_scheduler};
use ino_graph::OrchestrationService;
use ino_review::ReviewService;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Finalized runs are evicted from the checkpoint store after this many
/// days. Runs paused in manual review are never evicted.
const CHECKPOINT_RETENTION_DAYS: i64 = 30;

#[derive(Parser, Debug)]
#[command(name = "ino-daemon", version, about = "Mail-to-order orchestration daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address override.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ino_config::load_config(args.config.as_deref()).context("load config")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    ino_telemetry::init_tracing(&config.log_level);

    let warnings = ino_config::validate_config(&config).context("validate config")?;
    for warning in warnings {
        warn!(target: "ino.daemon", %warning, "config warning");
    }

    let config = Arc::new(config);
    let (ctx, messages) = build_context(config.clone()).await?;

    let orchestration = OrchestrationService::new(ctx.clone());
    let review = ReviewService::new(orchestration.clone());

    // Daily checkpoint retention sweep; manual-review runs are exempt.
    let prune_store = ctx.checkpoint.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(CHECKPOINT_RETENTION_DAYS);
            match prune_store.prune(cutoff).await {
                Ok(pruned) if pruned > 0 => {
                    info!(target: "ino.daemon", pruned, "checkpoint retention sweep")
                }
                Ok(_) => {}
                Err(e) => warn!(target: "ino.daemon", error = %e, "checkpoint prune failed"),
            }
        }
    });
    let (scheduler, webhook) = build_scheduler(&config, orchestration.clone(), messages);
    let listener_handles = scheduler.start();

    let state = Arc::new(AppState {
        orchestration,
        review,
        scheduler: scheduler.clone(),
        webhook,
    });
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    info!(
        target: "ino.daemon",
        bind = %config.bind,
        app_env = %config.app_env,
        listeners = listener_handles.len(),
        "ino-daemon listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!(target: "ino.daemon", "shutdown signal received");
            scheduler.shutdown();
        })
        .await
        .context("serve")
}
