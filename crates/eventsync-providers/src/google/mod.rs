//! Google services: Calendar API v3 and Maps geocoding.

mod calendar;
mod geocoder;

pub use calendar::GoogleCalendarClient;
pub use geocoder::{DEFAULT_GEOCODING_DOMAIN, GoogleGeocoder};
