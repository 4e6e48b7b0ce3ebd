//! CalendarService trait definition.
//!
//! A [`CalendarService`] is the remote side of the sync: it lists every event
//! of one calendar for the pull cycle and writes single events for the push
//! worker.

use std::future::Future;
use std::pin::Pin;

use crate::error::{ProviderError, ProviderResult};
use crate::payload::{EventPayload, OutboundEvent};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe so services can be shared as
/// `Arc<dyn CalendarService>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A remote calendar.
///
/// # Implementation Notes
///
/// - `list_events` handles pagination internally and returns every event
/// - `upsert_event` must be safe to repeat: writing the same event twice
///   leaves one remote event
/// - Neither method retries; callers own the retry policy
pub trait CalendarService: Send + Sync {
    /// Returns the name of this service (e.g. "google").
    fn name(&self) -> &str;

    /// Lists all events of a calendar.
    fn list_events<'a>(&'a self, calendar_id: &'a str)
    -> BoxFuture<'a, ProviderResult<Vec<EventPayload>>>;

    /// Creates or replaces the event identified by `outbound.event.id`.
    ///
    /// Returns the event as stored remotely, including its etag and link.
    fn upsert_event<'a>(
        &'a self,
        outbound: &'a OutboundEvent,
    ) -> BoxFuture<'a, ProviderResult<EventPayload>>;
}

/// A calendar that fails every call with a fixed error.
///
/// Stands in for a service that could not be configured, so the daemon can
/// still start and report the problem on each cycle.
#[derive(Debug)]
pub struct UnavailableCalendar {
    name: String,
    error: ProviderError,
}

impl UnavailableCalendar {
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn error(&self) -> ProviderError {
        ProviderError::new(self.error.code(), self.error.message()).with_provider(&self.name)
    }
}

impl CalendarService for UnavailableCalendar {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_events<'a>(
        &'a self,
        _calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<EventPayload>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn upsert_event<'a>(
        &'a self,
        _outbound: &'a OutboundEvent,
    ) -> BoxFuture<'a, ProviderResult<EventPayload>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[tokio::test]
    async fn unavailable_calendar_fails_every_call() {
        let calendar = UnavailableCalendar::new("google", ProviderError::network("offline"));
        assert_eq!(calendar.name(), "google");

        let err = calendar.list_events("primary").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NetworkError);
        assert_eq!(err.provider(), Some("google"));

        let outbound = OutboundEvent {
            calendar_id: "primary".to_string(),
            event: EventPayload::default(),
        };
        assert!(calendar.upsert_event(&outbound).await.is_err());
    }
}
