//! Server error types.

use std::io;

use eventsync_core::{RecordId, ValidationError};
use eventsync_providers::{GeocodeError, ProviderError};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by an [`EventStore`](crate::EventStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id.
    #[error("event record {0} not found")]
    NotFound(RecordId),

    /// Another record already carries this remote id.
    #[error("remote id {remote_id} already belongs to record {existing}")]
    DuplicateRemoteId {
        remote_id: String,
        existing: RecordId,
    },

    /// IO error reading or writing the backing file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backing file is not valid store JSON.
    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Why a pull cycle was abandoned.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing remote events failed; nothing was committed.
    #[error("failed to fetch remote events: {0}")]
    Fetch(#[from] ProviderError),
}

/// Why a save was refused.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The draft is invalid or its address could not be found.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The geocoding service failed.
    #[error("{0}")]
    Geocoding(GeocodeError),

    /// The record could not be read or written.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<GeocodeError> for SaveError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::NotFound { service, address } => {
                Self::Validation(ValidationError::location_not_found(service, address))
            }
            other => Self::Geocoding(other),
        }
    }
}

/// Errors on the push path.
#[derive(Debug, Error)]
pub enum PushError {
    /// Committing the record before enqueueing failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The push worker has shut down.
    #[error("push queue is closed")]
    QueueClosed,

    /// The calendar refused the event, or every attempt failed.
    #[error("failed to push record {record_id} after {attempts} attempt(s): {source}")]
    Delivery {
        record_id: RecordId,
        attempts: u32,
        #[source]
        source: ProviderError,
    },
}

/// Invalid sync configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid site URL for {domain}: {source}")]
    InvalidSiteUrl {
        domain: String,
        #[source]
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geocoding_not_found_becomes_validation_error() {
        let err: SaveError = GeocodeError::not_found("Google Maps", "Nowhere Lane").into();
        assert!(matches!(
            err,
            SaveError::Validation(ValidationError::LocationNotFound { .. })
        ));
        assert!(err.to_string().contains("Google Maps"));
        assert!(err.to_string().contains("\"Nowhere Lane\""));
    }

    #[test]
    fn geocoding_service_failure_stays_service_error() {
        let err: SaveError = GeocodeError::service("Google Maps", "Paris", "timeout").into();
        insta::assert_snapshot!(
            err.to_string(),
            @r#"Google Maps could not resolve "Paris": timeout"#
        );
    }
}
