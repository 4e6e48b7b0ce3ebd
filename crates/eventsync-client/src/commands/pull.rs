//! Pull command: one pull cycle.

use std::sync::Arc;

use eventsync_server::Synchronizer;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Pulls the remote calendar once and prints the counts.
pub async fn run(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let sync_config = config.to_sync_config().map_err(ClientError::Config)?;
    let store = super::open_store(cli, config).await?;
    let synchronizer = Synchronizer::new(
        super::calendar(config)?,
        super::as_event_store(&store),
        Arc::new(sync_config.transformer()?),
    );

    let report = synchronizer.pull().await?;
    println!(
        "fetched {}, created {}, updated {}, skipped {}, failed {}",
        report.fetched, report.created, report.updated, report.skipped, report.failed
    );
    Ok(())
}
