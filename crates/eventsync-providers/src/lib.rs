//! Remote services and the event transformation layer.
//!
//! This crate holds everything that talks to the outside world:
//!
//! - [`CalendarService`] - The remote calendar: list all events, upsert one
//! - [`GeoResolver`] - Address to coordinates lookup
//! - [`EventTransformer`] - Conversion between [`EventPayload`] and local records
//! - [`ProviderError`] - Error types for calendar operations
//!
//! # Architecture
//!
//! ```text
//!   pull                                   push
//! ┌──────────────────┐              ┌──────────────────┐
//! │ Google Calendar  │◄─────────────│ upsert_event()   │
//! └────────┬─────────┘              └────────▲─────────┘
//!          │ list_events()                   │
//!          ▼                                 │
//! ┌──────────────────┐              ┌──────────────────┐
//! │  EventPayload    │              │  OutboundEvent   │
//! └────────┬─────────┘              └────────▲─────────┘
//!          │ from_remote()                   │ to_remote()
//!          ▼                                 │
//! ┌──────────────────┐              ┌──────────────────┐
//! │ EventRecordUpdate│─────────────►│   EventRecord    │
//! └──────────────────┘   (store)    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use eventsync_providers::{CalendarService, EventTransformer};
//!
//! async fn pull(service: &dyn CalendarService, transformer: &EventTransformer) {
//!     for payload in service.list_events(transformer.calendar_id()).await? {
//!         match transformer.from_remote(&payload) {
//!             Ok(update) => { /* upsert locally */ }
//!             Err(rejection) => { /* skip */ }
//!         }
//!     }
//! }
//! ```

pub mod calendar;
pub mod error;
pub mod geocode;
pub mod google;
pub mod payload;
pub mod transform;

// Re-export main types at crate root
pub use calendar::{BoxFuture, CalendarService, UnavailableCalendar};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use geocode::{GeoPoint, GeoResolver, GeocodeError, GeocodeResult};
pub use google::{DEFAULT_GEOCODING_DOMAIN, GoogleCalendarClient, GoogleGeocoder};
pub use payload::{BoundaryPayload, CATEGORIES_PROPERTY, EventPayload, EventSource, OutboundEvent};
pub use transform::{EventTransformer, Rejection, SiteConfig, derived_event_id, parse_categories};
