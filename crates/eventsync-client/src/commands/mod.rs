//! Command implementations and the service wiring they share.

pub mod config;
pub mod list;
pub mod pull;
pub mod run;
pub mod save;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eventsync_providers::{CalendarService, GoogleCalendarClient, GoogleGeocoder};
use eventsync_server::{EventStore, JsonFileStore};
use tracing::debug;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Opens the JSON store named on the command line or in the configuration.
pub(crate) async fn open_store(cli: &Cli, config: &ClientConfig) -> ClientResult<Arc<JsonFileStore>> {
    let path: PathBuf = cli.store.clone().unwrap_or_else(|| config.store_path());
    debug!(path = %path.display(), "opening event store");
    Ok(Arc::new(JsonFileStore::open(path).await?))
}

/// Builds the Google Calendar client.
pub(crate) fn calendar(config: &ClientConfig) -> ClientResult<Arc<dyn CalendarService>> {
    let token = config.access_token().map_err(ClientError::Config)?;
    let client = GoogleCalendarClient::new(
        token,
        Duration::from_secs(config.calendar.timeout_secs),
    )?;
    Ok(Arc::new(client))
}

/// Builds the geocoder for the configured domain.
pub(crate) fn geocoder(config: &ClientConfig) -> ClientResult<Arc<GoogleGeocoder>> {
    let mut geocoder = GoogleGeocoder::new(
        config.geocoding.domain.clone(),
        Duration::from_secs(config.geocoding.timeout_secs),
    )
    .map_err(|e| ClientError::Provider(format!("failed to create geocoder: {}", e)))?;

    if let Some(key) = config.geocoding_api_key().map_err(ClientError::Config)? {
        geocoder = geocoder.with_api_key(key);
    }
    Ok(Arc::new(geocoder))
}

/// Store handle as the trait object the engine takes.
pub(crate) fn as_event_store(store: &Arc<JsonFileStore>) -> Arc<dyn EventStore> {
    store.clone()
}
