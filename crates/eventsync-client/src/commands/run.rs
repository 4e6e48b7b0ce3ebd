//! Run command: pull on a schedule until interrupted.
//!
//! Starts the pull scheduler and logs every phase change of the
//! synchronizer. Stops on Ctrl-C, letting a cycle in progress finish.

use std::sync::Arc;
use std::time::Duration;

use eventsync_server::{PullScheduler, SchedulerConfig, SyncPhase, Synchronizer};
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Runs pull cycles in the foreground.
pub async fn run(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let sync_config = config.to_sync_config().map_err(ClientError::Config)?;
    let store = super::open_store(cli, config).await?;
    let synchronizer = Arc::new(Synchronizer::new(
        super::calendar(config)?,
        super::as_event_store(&store),
        Arc::new(sync_config.transformer()?),
    ));

    let mut phases = synchronizer.subscribe();
    let phase_task = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase: SyncPhase = *phases.borrow_and_update();
            debug!(?phase, "sync phase");
        }
    });

    let scheduler = PullScheduler::new(SchedulerConfig::new(sync_config.pull_interval));
    let handle = scheduler.handle();
    let scheduler_task = tokio::spawn(scheduler.run(synchronizer));

    info!(
        calendar_id = %sync_config.calendar_id,
        store = %store.path().display(),
        "eventsync running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    if let Err(e) = handle.stop().await {
        warn!(error = %e, "failed to send stop command to scheduler");
    }
    let _ = tokio::time::timeout(Duration::from_secs(30), scheduler_task).await;
    phase_task.abort();

    let state = handle.state().await;
    if let Some(report) = state.last_report {
        info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "last pull"
        );
    }
    Ok(())
}
