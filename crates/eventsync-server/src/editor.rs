//! Save path for locally edited events.
//!
//! [`EventEditor::save`] validates a draft, resolves its mappable location,
//! persists it and, when the save publishes the event, hands it to the
//! [`PushDispatcher`]. A failed lookup aborts before anything is written, so
//! the stored record keeps its previous coordinates.

use std::sync::Arc;

use eventsync_core::{
    Coordinates, EventDraft, EventRecord, RecordId, default_mappable_location,
};
use eventsync_providers::GeoResolver;
use tracing::{debug, info, warn};

use crate::error::{SaveError, StoreError};
use crate::push::PushDispatcher;
use crate::store::EventStore;

/// Applies drafts to the store.
pub struct EventEditor {
    store: Arc<dyn EventStore>,
    geocoder: Arc<dyn GeoResolver>,
    dispatcher: PushDispatcher,
}

impl EventEditor {
    pub fn new(
        store: Arc<dyn EventStore>,
        geocoder: Arc<dyn GeoResolver>,
        dispatcher: PushDispatcher,
    ) -> Self {
        Self {
            store,
            geocoder,
            dispatcher,
        }
    }

    /// Saves a draft, creating the record if `draft.id` is unset.
    ///
    /// Times the calendar zone skips over are rejected, so every stored
    /// timed boundary maps to one remote instant and back. Push problems are
    /// logged and never fail the save.
    pub async fn save(&self, draft: &EventDraft) -> Result<EventRecord, SaveError> {
        let manual = draft.validate()?;
        let tz = self.dispatcher.timezone();
        draft.start().check_exists_in(tz)?;
        draft.end().check_exists_in(tz)?;

        let existing = match draft.id {
            Some(id) => Some(
                self.store
                    .get(id)
                    .await?
                    .ok_or(StoreError::NotFound(id))?,
            ),
            None => None,
        };

        let mut mappable = draft.mappable_location.trim().to_string();
        if mappable.is_empty() && manual.is_none() {
            mappable = default_mappable_location(&draft.location);
        }

        let (mappable, coordinates) = self
            .locate(existing.as_ref(), mappable, manual)
            .await?;

        let was_published = existing.as_ref().is_some_and(|r| r.status.is_published());
        let mut record = match existing {
            Some(mut record) => {
                record.apply_draft(draft, mappable, coordinates);
                self.store.update(&record).await?;
                record
            }
            None => {
                let mut record =
                    EventRecord::new(RecordId(0), draft.title.clone(), draft.start(), draft.end(), "");
                record.apply_draft(draft, mappable, coordinates);
                self.store.create(record).await?
            }
        };
        info!(record_id = %record.id, status = ?record.status, "event saved");

        if record.status.is_published() && !was_published {
            if let Err(e) = self.dispatcher.push(&mut record).await {
                warn!(record_id = %record.id, error = %e, "could not queue push");
            }
        }

        Ok(record)
    }

    /// Resolves the mappable location into the address and coordinates to store.
    ///
    /// The lookup runs only when the address differs from the stored one or
    /// the record has no coordinates yet; a resolved address replaces any
    /// manual coordinates.
    async fn locate(
        &self,
        existing: Option<&EventRecord>,
        mappable: String,
        manual: Option<Coordinates>,
    ) -> Result<(String, Option<Coordinates>), SaveError> {
        if mappable.is_empty() {
            return Ok((mappable, manual));
        }

        if let Some(record) = existing
            && record.mappable_location == mappable
            && let Some(coordinates) = record.coordinates()
        {
            debug!(record_id = %record.id, "mappable location unchanged, keeping coordinates");
            return Ok((mappable, Some(coordinates)));
        }

        let point = self.geocoder.resolve(&mappable).await?;
        debug!(address = %mappable, resolved = %point.address, "location resolved");
        Ok((point.address, Some(point.coordinates)))
    }
}
