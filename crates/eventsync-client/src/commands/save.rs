//! Save command: apply a draft as a local edit.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use eventsync_core::EventDraft;
use eventsync_providers::{CalendarService, ProviderError, UnavailableCalendar};
use eventsync_server::{EventEditor, PushDispatcher, PushWorker};
use tracing::warn;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Saves the draft in `path` and delivers the push it triggers, if any.
pub async fn run(cli: &Cli, config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let draft = read_draft(path)?;
    let sync_config = config.to_sync_config().map_err(ClientError::Config)?;
    let store = super::as_event_store(&super::open_store(cli, config).await?);
    let transformer = Arc::new(sync_config.transformer()?);

    // A missing token should not block local edits; the push is reported instead.
    let calendar: Arc<dyn CalendarService> = match super::calendar(config) {
        Ok(calendar) => calendar,
        Err(e) => {
            warn!(error = %e, "calendar unavailable, publishing will not reach it");
            Arc::new(UnavailableCalendar::new(
                "google",
                ProviderError::configuration(e.to_string()),
            ))
        }
    };

    let (dispatcher, jobs) = PushDispatcher::new(store.clone(), transformer);
    let worker = PushWorker::new(calendar, store.clone(), sync_config.retry.clone(), jobs);
    let editor = EventEditor::new(store, super::geocoder(config)?, dispatcher);

    let record = editor.save(&draft).await?;
    println!(
        "saved event {} ({})",
        record.id,
        record.remote_id().unwrap_or("not published")
    );

    // Dropping the editor closes the queue, so the worker stops once drained.
    drop(editor);
    worker.run().await;
    Ok(())
}

/// Reads a draft from a JSON file, or stdin when `path` is `-`.
fn read_draft(path: &Path) -> ClientResult<EventDraft> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    parse_draft(&content)
}

fn parse_draft(content: &str) -> ClientResult<EventDraft> {
    serde_json::from_str(content).map_err(|e| ClientError::Input(format!("invalid draft: {}", e)))
}
