//! Conversion between remote payloads and local event records.
//!
//! [`EventTransformer::from_remote`] validates a pulled event and turns it into
//! an [`EventRecordUpdate`]; anything it cannot use becomes a [`Rejection`],
//! which the pull cycle counts and skips. [`EventTransformer::to_remote`] is the
//! structural inverse used when pushing.
//!
//! Boundaries map one to one: a remote `dateTime` splits into a date and a time
//! in the calendar zone, a remote `date` is an all-day boundary with no time.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use eventsync_core::{EventBoundary, EventRecord, EventRecordUpdate, RecordId, RemoteRef};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::payload::{
    BoundaryPayload, CATEGORIES_PROPERTY, EventPayload, EventSource, OutboundEvent,
};

/// Why a remote event was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable {field} value {value:?}")]
    InvalidBoundary { field: &'static str, value: String },

    #[error("event is cancelled")]
    Cancelled,
}

/// Public site the events are published on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SiteConfig {
    /// Host name, e.g. `events.example.org`.
    pub domain: String,
    /// `https` unless configured otherwise.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "https".to_string()
}

impl SiteConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            scheme: default_scheme(),
        }
    }

    /// Root URL of the site.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}/", self.scheme, self.domain))
    }
}

/// Remote event id for a record that has never been synced.
///
/// Calendar ids must be base32hex (`a-v`, `0-9`), so the local key is written
/// as zero-padded digits behind an `ev` prefix.
pub fn derived_event_id(id: RecordId) -> String {
    format!("ev{:010}", id.0)
}

/// Splits the categories property into distinct, trimmed labels.
pub fn parse_categories(raw: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in raw.split(',').map(str::trim).filter(|l| !l.is_empty()) {
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}

/// Maps events of one calendar between their remote and local shapes.
#[derive(Debug, Clone)]
pub struct EventTransformer {
    calendar_id: String,
    timezone: Tz,
    site_url: Option<Url>,
}

impl EventTransformer {
    /// Creates a transformer for a calendar whose local times are in `timezone`.
    pub fn new(calendar_id: impl Into<String>, timezone: Tz) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            timezone,
            site_url: None,
        }
    }

    /// Links pushed events back to their page under `site_url`.
    pub fn with_site_url(mut self, site_url: Url) -> Self {
        self.site_url = Some(site_url);
        self
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Converts a pulled event into a partial record update.
    pub fn from_remote(&self, payload: &EventPayload) -> Result<EventRecordUpdate, Rejection> {
        let id = non_empty(payload.id.as_deref()).ok_or(Rejection::MissingField("id"))?;
        let title =
            non_empty(payload.summary.as_deref()).ok_or(Rejection::MissingField("summary"))?;
        if payload.is_cancelled() {
            return Err(Rejection::Cancelled);
        }
        let location =
            non_empty(payload.location.as_deref()).ok_or(Rejection::MissingField("location"))?;
        let start = self.parse_boundary("start", payload.start.as_ref())?;
        let end = self.parse_boundary("end", payload.end.as_ref())?;

        Ok(EventRecordUpdate {
            remote: RemoteRef {
                id: id.to_string(),
                etag: payload.etag.clone(),
                html_link: payload.html_link.clone(),
            },
            title: title.to_string(),
            location: location.to_string(),
            start,
            end,
            description: payload.description.clone(),
            categories: payload.categories_property().map(parse_categories),
        })
    }

    /// Builds the payload that publishes `record` to the calendar.
    pub fn to_remote(&self, record: &EventRecord) -> OutboundEvent {
        let event_id = record
            .remote_id()
            .map(str::to_string)
            .unwrap_or_else(|| derived_event_id(record.id));

        let mut event = EventPayload {
            id: Some(event_id),
            summary: Some(record.title.clone()),
            description: Some(record.description.clone()),
            location: Some(record.location.clone()),
            start: Some(self.boundary_payload(record.start())),
            end: Some(self.boundary_payload(record.end())),
            ..EventPayload::default()
        };

        if !record.keywords().is_empty() {
            let labels: Vec<&str> = record.keywords().iter().map(|k| k.title.as_str()).collect();
            event.set_private_property(CATEGORIES_PROPERTY, labels.join(","));
        }

        if let Some(ref base) = self.site_url {
            match base.join(&format!("{}/", record.slug)) {
                Ok(url) => {
                    event.source = Some(EventSource {
                        title: record.title.clone(),
                        url: url.to_string(),
                    })
                }
                Err(e) => warn!(record_id = %record.id, slug = %record.slug, error = %e, "cannot build page URL"),
            }
        }

        OutboundEvent {
            calendar_id: self.calendar_id.clone(),
            event,
        }
    }

    fn parse_boundary(
        &self,
        field: &'static str,
        boundary: Option<&BoundaryPayload>,
    ) -> Result<EventBoundary, Rejection> {
        let boundary = boundary.ok_or(Rejection::MissingField(field))?;

        if let Some(ref value) = boundary.date_time {
            let instant =
                DateTime::parse_from_rfc3339(value).map_err(|_| Rejection::InvalidBoundary {
                    field,
                    value: value.clone(),
                })?;
            return Ok(EventBoundary::from_instant(&instant, self.timezone));
        }

        if let Some(ref value) = boundary.date {
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                Rejection::InvalidBoundary {
                    field,
                    value: value.clone(),
                }
            })?;
            return Ok(EventBoundary::all_day(date));
        }

        Err(Rejection::MissingField(field))
    }

    fn boundary_payload(&self, boundary: EventBoundary) -> BoundaryPayload {
        match boundary.to_zoned(self.timezone) {
            Some(instant) => BoundaryPayload::from_zoned(&instant),
            None => BoundaryPayload::from_date(boundary.date),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
