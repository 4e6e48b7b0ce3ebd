//! The local event record.
//!
//! This module provides:
//! - [`EventRecord`]: one stored event, with its page metadata and remote identity
//! - [`EventRecordUpdate`]: the partial overwrite produced from a remote event
//! - [`EventDraft`]: the editable fields submitted by a save
//! - [`Coordinates`]: a latitude/longitude pair at fixed precision

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::EventBoundary;

/// Number of decimal places kept for latitude and longitude.
pub const COORDINATE_PRECISION: i32 = 7;

/// Local primary key of an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of a keyword (tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordId(pub u64);

/// A tag attached to events, unique by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub title: String,
}

/// Publication state of the page backing an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    #[default]
    Draft,
    Published,
}

impl PublishStatus {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published)
    }
}

/// Site navigation flags of the page backing an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationFlags {
    /// Whether the page is listed in navigation.
    pub in_navigation: bool,
    /// Menus the page appears in.
    #[serde(default)]
    pub in_menus: Vec<String>,
}

impl Default for NavigationFlags {
    fn default() -> Self {
        Self {
            in_navigation: true,
            in_menus: Vec::new(),
        }
    }
}

impl NavigationFlags {
    /// Flags for a page excluded from every menu.
    pub fn hidden() -> Self {
        Self {
            in_navigation: false,
            in_menus: Vec::new(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        !self.in_navigation && self.in_menus.is_empty()
    }
}

/// Identity of an event on the remote calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    /// The remote event id, used as the upsert key when pulling.
    pub id: String,
    /// The remote entity tag of the last version seen.
    pub etag: Option<String>,
    /// Link to the event in the remote calendar UI.
    pub html_link: Option<String>,
}

impl RemoteRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            etag: None,
            html_link: None,
        }
    }
}

/// A latitude/longitude pair.
///
/// Both values are always present together; a record without a location fix
/// holds no `Coordinates` at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    /// Creates a pair, rounding both values to [`COORDINATE_PRECISION`] places.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::CoordinateOutOfRange {
                field: "Latitude",
                value: lat,
            });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::CoordinateOutOfRange {
                field: "Longitude",
                value: lon,
            });
        }
        Ok(Self {
            lat: round_coordinate(lat),
            lon: round_coordinate(lon),
        })
    }

    /// Builds coordinates from independently submitted values.
    ///
    /// Returns `Ok(None)` when neither is given and an error when only one is.
    pub fn from_pair(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Self>, ValidationError> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Self::new(lat, lon).map(Some),
            (Some(_), None) => Err(ValidationError::MissingLongitude),
            (None, Some(_)) => Err(ValidationError::MissingLatitude),
            (None, None) => Ok(None),
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_PRECISION);
    (value * scale).round() / scale
}

/// Mappable location derived from the free-text location: one line per
/// address part becomes a comma-separated address.
pub fn default_mappable_location(location: &str) -> String {
    location.replace("\r\n", "\n").replace('\n', ", ")
}

/// A stored event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: RecordId,
    /// URL path segment of the backing page.
    pub slug: String,
    pub status: PublishStatus,
    pub navigation: NavigationFlags,
    /// Remote identity, set once the event has been pushed or pulled.
    pub remote: Option<RemoteRef>,

    pub title: String,
    pub description: String,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,

    pub location: String,
    /// Address used for geocoding; replaced by the canonical address once resolved.
    pub mappable_location: String,
    coordinates: Option<Coordinates>,

    /// Speaker names, one per line.
    pub speakers: String,
    pub rsvp: String,
    keywords: Vec<Keyword>,
}

impl EventRecord {
    /// Creates a draft record with the required fields.
    pub fn new(
        id: RecordId,
        title: impl Into<String>,
        start: EventBoundary,
        end: EventBoundary,
        location: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            id,
            slug: slug::slugify(&title),
            status: PublishStatus::Draft,
            navigation: NavigationFlags::default(),
            remote: None,
            title,
            description: String::new(),
            start_date: start.date,
            end_date: end.date,
            start_time: start.time,
            end_time: end.time,
            location: location.into(),
            mappable_location: String::new(),
            coordinates: None,
            speakers: String::new(),
            rsvp: String::new(),
            keywords: Vec::new(),
        }
    }

    /// Creates a record from a pulled remote event.
    ///
    /// Pulled events are calendar content rather than navigable pages, so they
    /// start published and hidden from navigation.
    pub fn from_update(id: RecordId, update: &EventRecordUpdate, keywords: Vec<Keyword>) -> Self {
        let mut record = Self::new(
            id,
            update.title.clone(),
            update.start,
            update.end,
            update.location.clone(),
        );
        record.status = PublishStatus::Published;
        record.navigation = NavigationFlags::hidden();
        record.apply_update(update, Some(keywords));
        record
    }

    pub fn start(&self) -> EventBoundary {
        EventBoundary {
            date: self.start_date,
            time: self.start_time,
        }
    }

    pub fn end(&self) -> EventBoundary {
        EventBoundary {
            date: self.end_date,
            time: self.end_time,
        }
    }

    pub fn set_start(&mut self, boundary: EventBoundary) {
        self.start_date = boundary.date;
        self.start_time = boundary.time;
    }

    pub fn set_end(&mut self, boundary: EventBoundary) {
        self.end_date = boundary.date;
        self.end_time = boundary.time;
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    pub fn set_coordinates(&mut self, coordinates: Option<Coordinates>) {
        self.coordinates = coordinates;
    }

    pub fn lat(&self) -> Option<f64> {
        self.coordinates.map(|c| c.lat())
    }

    pub fn lon(&self) -> Option<f64> {
        self.coordinates.map(|c| c.lon())
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.id.as_str())
    }

    /// Speaker names with blank lines dropped.
    pub fn speakers_list(&self) -> Vec<&str> {
        self.speakers
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Replaces the keywords, keeping the first occurrence of each id.
    pub fn set_keywords(&mut self, keywords: impl IntoIterator<Item = Keyword>) {
        self.keywords.clear();
        for keyword in keywords {
            if !self.keywords.iter().any(|k| k.id == keyword.id) {
                self.keywords.push(keyword);
            }
        }
    }

    /// Excludes the page from site navigation and every menu.
    pub fn hide_from_navigation(&mut self) {
        self.navigation = NavigationFlags::hidden();
    }

    /// Overwrites the fields a remote event carries, leaving the rest alone.
    ///
    /// `keywords` is `None` when the remote event has no categories property,
    /// in which case the local keywords are kept.
    pub fn apply_update(&mut self, update: &EventRecordUpdate, keywords: Option<Vec<Keyword>>) {
        self.remote = Some(update.remote.clone());
        self.title = update.title.clone();
        self.location = update.location.clone();
        self.set_start(update.start);
        self.set_end(update.end);
        if let Some(ref description) = update.description {
            self.description = description.clone();
        }
        if let Some(keywords) = keywords {
            self.set_keywords(keywords);
        }
    }

    /// Overwrites the editable fields from a draft.
    ///
    /// The mappable location and coordinates are passed separately because
    /// they are the outcome of location resolution, not the raw submission.
    pub fn apply_draft(
        &mut self,
        draft: &EventDraft,
        mappable_location: String,
        coordinates: Option<Coordinates>,
    ) {
        self.title = draft.title.clone();
        if let Some(ref slug) = draft.slug {
            self.slug = slug.clone();
        } else if self.slug.is_empty() {
            self.slug = slug::slugify(&draft.title);
        }
        self.status = draft.status;
        self.description = draft.description.clone();
        self.set_start(draft.start());
        self.set_end(draft.end());
        self.location = draft.location.clone();
        self.mappable_location = mappable_location;
        self.coordinates = coordinates;
        self.speakers = draft.speakers.clone();
        self.rsvp = draft.rsvp.clone();
    }
}

/// Fields produced from one remote event, applied as a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecordUpdate {
    pub remote: RemoteRef,
    pub title: String,
    pub location: String,
    pub start: EventBoundary,
    pub end: EventBoundary,
    pub description: Option<String>,
    /// Category labels, `None` when the remote event carries none.
    pub categories: Option<Vec<String>>,
}

/// The editable fields of an event as submitted by a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Record being edited, `None` for a new event.
    #[serde(default)]
    pub id: Option<RecordId>,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    pub location: String,
    #[serde(default)]
    pub mappable_location: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub speakers: String,
    #[serde(default)]
    pub rsvp: String,
}

impl EventDraft {
    /// Creates a draft with the required fields.
    pub fn new(
        title: impl Into<String>,
        start: EventBoundary,
        end: EventBoundary,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            slug: None,
            status: PublishStatus::Draft,
            description: String::new(),
            start_date: start.date,
            end_date: end.date,
            start_time: start.time,
            end_time: end.time,
            location: location.into(),
            mappable_location: String::new(),
            lat: None,
            lon: None,
            speakers: String::new(),
            rsvp: String::new(),
        }
    }

    pub fn start(&self) -> EventBoundary {
        EventBoundary {
            date: self.start_date,
            time: self.start_time,
        }
    }

    pub fn end(&self) -> EventBoundary {
        EventBoundary {
            date: self.end_date,
            time: self.end_time,
        }
    }

    /// Checks the fields that do not depend on geocoding.
    pub fn validate(&self) -> Result<Option<Coordinates>, ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("Title"));
        }
        if self.location.trim().is_empty() {
            return Err(ValidationError::MissingField("Location"));
        }
        if self.end_date < self.start_date {
            return Err(ValidationError::EndBeforeStart {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Coordinates::from_pair(self.lat, self.lon)
    }
}
