//! Client error types.

use std::fmt;

use eventsync_providers::ProviderError;
use eventsync_server::{ConfigError, SaveError, StoreError, SyncError};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Calendar or geocoding service setup failed.
    Provider(String),
    /// IO error.
    Io(std::io::Error),
    /// Malformed input file.
    Input(String),
    /// Event store error.
    Store(StoreError),
    /// Pull cycle failed.
    Sync(SyncError),
    /// Save refused.
    Save(SaveError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Provider(msg) => write!(f, "provider error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Input(msg) => write!(f, "invalid input: {}", msg),
            Self::Store(err) => write!(f, "store error: {}", err),
            Self::Sync(err) => write!(f, "{}", err),
            Self::Save(err) => write!(f, "save failed: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Sync(err) => Some(err),
            Self::Save(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<SyncError> for ClientError {
    fn from(err: SyncError) -> Self {
        Self::Sync(err)
    }
}

impl From<SaveError> for ClientError {
    fn from(err: SaveError) -> Self {
        Self::Save(err)
    }
}
