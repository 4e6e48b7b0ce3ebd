//! Address resolution.
//!
//! A [`GeoResolver`] turns a free-text address into a canonical address and
//! coordinates. It distinguishes "no such place" from "the service failed" so
//! the save path can report the first as a validation problem. There is no
//! caching and no retry here.

use eventsync_core::Coordinates;
use thiserror::Error;

use crate::calendar::BoxFuture;

/// A resolved address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    /// The service's canonical form of the address.
    pub address: String,
    pub coordinates: Coordinates,
}

/// Why an address could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    /// The service reported zero matches.
    #[error("{service} found no match for \"{address}\"")]
    NotFound { service: String, address: String },

    /// Transport failure, error status, or a response that does not name
    /// exactly one place.
    #[error("{service} could not resolve \"{address}\": {message}")]
    Service {
        service: String,
        address: String,
        message: String,
    },
}

impl GeocodeError {
    pub fn not_found(service: impl Into<String>, address: impl Into<String>) -> Self {
        Self::NotFound {
            service: service.into(),
            address: address.into(),
        }
    }

    pub fn service(
        service: impl Into<String>,
        address: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            service: service.into(),
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type GeocodeResult<T> = Result<T, GeocodeError>;

/// A geocoding service.
pub trait GeoResolver: Send + Sync {
    /// Human-readable service name, used in user-facing messages.
    fn service_name(&self) -> &str;

    /// Resolves an address.
    fn resolve<'a>(&'a self, address: &'a str) -> BoxFuture<'a, GeocodeResult<GeoPoint>>;
}
