//! Validation errors raised while saving an event.
//!
//! These are user-facing: they block the save and are shown to the editor
//! as-is, so the messages are written for people rather than logs.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// A save was rejected because the submitted event is not valid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Latitude given without longitude.
    #[error("Longitude required if specifying latitude.")]
    MissingLongitude,

    /// Longitude given without latitude.
    #[error("Latitude required if specifying longitude.")]
    MissingLatitude,

    /// A coordinate is outside its valid range.
    #[error("{field} {value} is out of range.")]
    CoordinateOutOfRange { field: &'static str, value: f64 },

    /// A required field is empty.
    #[error("{0} is required.")]
    MissingField(&'static str),

    /// The event ends before it starts.
    #[error("End date {end} is before start date {start}.")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    /// A wall time skipped by a daylight-saving change in the calendar zone.
    #[error("{date} {time} does not exist in {zone}; the clocks skip over it.")]
    NonexistentLocalTime {
        date: NaiveDate,
        time: NaiveTime,
        zone: String,
    },

    /// The geocoding service found no match for the mappable location.
    #[error(
        "The mappable location you specified could not be found on {service}: \"{address}\" \
         Try changing the mappable location, removing any business names, or leaving mappable \
         location blank and entering coordinates."
    )]
    LocationNotFound { service: String, address: String },
}

impl ValidationError {
    /// Creates a location-not-found error.
    pub fn location_not_found(service: impl Into<String>, address: impl Into<String>) -> Self {
        Self::LocationNotFound {
            service: service.into(),
            address: address.into(),
        }
    }
}
