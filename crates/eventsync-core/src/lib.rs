//! Core types: event records, boundaries, coordinates, validation

pub mod error;
pub mod record;
pub mod time;
pub mod tracing;

pub use error::ValidationError;
pub use record::{
    COORDINATE_PRECISION, Coordinates, EventDraft, EventRecord, EventRecordUpdate, Keyword,
    KeywordId, NavigationFlags, PublishStatus, RecordId, RemoteRef, default_mappable_location,
};
pub use time::EventBoundary;
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
