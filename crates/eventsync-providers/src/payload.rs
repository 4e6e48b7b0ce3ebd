//! Remote calendar event payloads.
//!
//! [`EventPayload`] mirrors the JSON event resource of the Google Calendar v3
//! API. Fields stay loosely typed (`Option<String>` dates included) so that a
//! malformed event decodes and is rejected by the transformer instead of
//! failing the whole listing.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Private extended property holding comma-separated category labels.
pub const CATEGORIES_PROPERTY: &str = "X-MOZ-CATEGORIES";

/// The start or end of a remote event: either `date` or `dateTime` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryPayload {
    /// All-day date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// RFC 3339 timestamp with offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// IANA zone name the timestamp was written in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl BoundaryPayload {
    /// An all-day boundary.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format("%Y-%m-%d").to_string()),
            ..Self::default()
        }
    }

    /// A timed boundary carrying its offset and zone name.
    pub fn from_zoned(instant: &DateTime<Tz>) -> Self {
        Self {
            date: None,
            date_time: Some(instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            time_zone: Some(instant.timezone().name().to_string()),
        }
    }
}

/// Key/value properties attached to a remote event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub private: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shared: BTreeMap<String, String>,
}

/// Link back to the page an event was published from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    pub title: String,
    pub url: String,
}

/// A remote calendar event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<BoundaryPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<BoundaryPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<ExtendedProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,
}

impl EventPayload {
    /// Returns true if the remote event has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.eq_ignore_ascii_case("cancelled"))
    }

    /// Raw value of the private categories property, if any.
    pub fn categories_property(&self) -> Option<&str> {
        self.extended_properties
            .as_ref()
            .and_then(|p| p.private.get(CATEGORIES_PROPERTY))
            .map(String::as_str)
    }

    /// Sets a private extended property.
    pub fn set_private_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extended_properties
            .get_or_insert_with(ExtendedProperties::default)
            .private
            .insert(key.into(), value.into());
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_start(mut self, start: BoundaryPayload) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: BoundaryPayload) -> Self {
        self.end = Some(end);
        self
    }
}

/// An event ready to be written to a calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub calendar_id: String,
    pub event: EventPayload,
}

impl OutboundEvent {
    /// The remote id the write targets.
    pub fn event_id(&self) -> Option<&str> {
        self.event.id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_timed_event() {
        let json = r#"{
            "id": "evt1",
            "etag": "\"3181161784712000\"",
            "htmlLink": "https://www.google.com/calendar/event?eid=ZXZ0MQ",
            "summary": "Board meeting",
            "location": "Room 4",
            "start": { "dateTime": "2024-06-01T18:00:00Z", "timeZone": "UTC" },
            "end": { "dateTime": "2024-06-01T19:30:00Z" },
            "extendedProperties": { "private": { "X-MOZ-CATEGORIES": "Board,Members" } }
        }"#;

        let event: EventPayload = serde_json::from_str(json).unwrap();
        assert_eq!(event.summary.as_deref(), Some("Board meeting"));
        assert_eq!(
            event.start.as_ref().unwrap().date_time.as_deref(),
            Some("2024-06-01T18:00:00Z")
        );
        assert_eq!(event.categories_property(), Some("Board,Members"));
        assert!(!event.is_cancelled());
    }

    #[test]
    fn parse_event_without_boundaries() {
        let event: EventPayload = serde_json::from_str(r#"{"id": "evt1"}"#).unwrap();
        assert!(event.start.is_none());
        assert!(event.categories_property().is_none());
    }

    #[test]
    fn zoned_boundary_keeps_offset_and_zone() {
        let paris = chrono_tz::Europe::Paris;
        let instant = paris.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let boundary = BoundaryPayload::from_zoned(&instant);
        assert_eq!(boundary.date_time.as_deref(), Some("2024-06-01T20:00:00+02:00"));
        assert_eq!(boundary.time_zone.as_deref(), Some("Europe/Paris"));
        assert!(boundary.date.is_none());
    }

    #[test]
    fn serialized_payload_omits_empty_fields() {
        let mut event = EventPayload::default()
            .with_id("ev0000000001")
            .with_summary("Talk")
            .with_start(BoundaryPayload::from_date(
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            ));
        event.set_private_property(CATEGORIES_PROPERTY, "Talks");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "ev0000000001",
                "summary": "Talk",
                "start": { "date": "2024-06-01" },
                "extendedProperties": { "private": { "X-MOZ-CATEGORIES": "Talks" } }
            })
        );
    }
}
