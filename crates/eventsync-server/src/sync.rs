//! Pull cycle: remote calendar into local records.
//!
//! One [`Synchronizer::pull`] lists every remote event, transforms each one
//! and upserts it by remote id. A failed listing abandons the cycle before
//! anything is written; a bad item is skipped without affecting the rest.
//! Upserts are keyed, so re-running a cycle converges on the same state.

use std::sync::Arc;

use eventsync_core::{EventRecordUpdate, Keyword};
use eventsync_providers::{CalendarService, EventTransformer};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{StoreResult, SyncError};
use crate::store::{EventStore, RemoteUpsert};

/// Where a pull cycle currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    Fetching,
    Transforming,
    Committing,
}

/// Counts from one pull cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Remote events listed.
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    /// Rejected by the transformer.
    pub skipped: usize,
    /// Transformed but not committed.
    pub failed: usize,
}

/// Pulls a remote calendar into the store.
pub struct Synchronizer {
    service: Arc<dyn CalendarService>,
    store: Arc<dyn EventStore>,
    transformer: Arc<EventTransformer>,
    phase: watch::Sender<SyncPhase>,
}

impl Synchronizer {
    pub fn new(
        service: Arc<dyn CalendarService>,
        store: Arc<dyn EventStore>,
        transformer: Arc<EventTransformer>,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            service,
            store,
            transformer,
            phase,
        }
    }

    /// Watches the cycle phase.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Runs one pull cycle.
    pub async fn pull(&self) -> Result<SyncReport, SyncError> {
        let calendar_id = self.transformer.calendar_id();
        self.phase.send_replace(SyncPhase::Fetching);

        let payloads = match self.service.list_events(calendar_id).await {
            Ok(payloads) => payloads,
            Err(e) => {
                warn!(calendar_id, service = self.service.name(), error = %e, "pull abandoned");
                self.phase.send_replace(SyncPhase::Idle);
                return Err(SyncError::Fetch(e));
            }
        };

        let mut report = SyncReport {
            fetched: payloads.len(),
            ..SyncReport::default()
        };

        self.phase.send_replace(SyncPhase::Transforming);
        let mut updates = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            match self.transformer.from_remote(payload) {
                Ok(update) => updates.push(update),
                Err(rejection) => {
                    debug!(remote_id = ?payload.id, %rejection, "skipping remote event");
                    report.skipped += 1;
                }
            }
        }

        self.phase.send_replace(SyncPhase::Committing);
        for update in &updates {
            match self.commit(update).await {
                Ok(RemoteUpsert::Created(id)) => {
                    debug!(remote_id = %update.remote.id, record_id = %id, "created record");
                    report.created += 1;
                }
                Ok(RemoteUpsert::Updated(id)) => {
                    debug!(remote_id = %update.remote.id, record_id = %id, "updated record");
                    report.updated += 1;
                }
                Err(e) => {
                    warn!(remote_id = %update.remote.id, error = %e, "failed to commit event");
                    report.failed += 1;
                }
            }
        }

        self.phase.send_replace(SyncPhase::Idle);
        info!(
            calendar_id,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "pull complete"
        );
        Ok(report)
    }

    /// Upserts one update; the store applies it under a single write.
    async fn commit(&self, update: &EventRecordUpdate) -> StoreResult<RemoteUpsert> {
        let keywords = match &update.categories {
            Some(labels) => Some(self.resolve_keywords(labels).await?),
            None => None,
        };
        self.store.apply_remote_update(update, keywords).await
    }

    async fn resolve_keywords(&self, labels: &[String]) -> StoreResult<Vec<Keyword>> {
        let mut keywords = Vec::with_capacity(labels.len());
        for label in labels {
            keywords.push(self.store.get_or_create_keyword(label).await?);
        }
        Ok(keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use eventsync_core::NavigationFlags;
    use eventsync_providers::{
        BoundaryPayload, BoxFuture, CATEGORIES_PROPERTY, EventPayload, OutboundEvent,
        ProviderError, ProviderResult,
    };
    use std::sync::Mutex;

    use crate::store::MemoryStore;
    use crate::store::testing::EditAfterRead;

    /// Serves a fixed listing, replaceable between pulls.
    struct FakeCalendar {
        events: Mutex<ProviderResult<Vec<EventPayload>>>,
    }

    impl FakeCalendar {
        fn new(events: Vec<EventPayload>) -> Self {
            Self {
                events: Mutex::new(Ok(events)),
            }
        }

        fn set(&self, events: ProviderResult<Vec<EventPayload>>) {
            *self.events.lock().unwrap() = events;
        }
    }

    impl CalendarService for FakeCalendar {
        fn name(&self) -> &str {
            "fake"
        }

        fn list_events<'a>(
            &'a self,
            _calendar_id: &'a str,
        ) -> BoxFuture<'a, ProviderResult<Vec<EventPayload>>> {
            let events = match &*self.events.lock().unwrap() {
                Ok(events) => Ok(events.clone()),
                Err(e) => Err(ProviderError::new(e.code(), e.message())),
            };
            Box::pin(async move { events })
        }

        fn upsert_event<'a>(
            &'a self,
            outbound: &'a OutboundEvent,
        ) -> BoxFuture<'a, ProviderResult<EventPayload>> {
            let event = outbound.event.clone();
            Box::pin(async move { Ok(event) })
        }
    }

    fn timed(id: &str, summary: &str, start: &str, end: &str) -> EventPayload {
        EventPayload::default()
            .with_id(id)
            .with_summary(summary)
            .with_location("Town Hall")
            .with_start(BoundaryPayload {
                date_time: Some(start.to_string()),
                ..BoundaryPayload::default()
            })
            .with_end(BoundaryPayload {
                date_time: Some(end.to_string()),
                ..BoundaryPayload::default()
            })
    }

    fn setup(events: Vec<EventPayload>) -> (Arc<FakeCalendar>, Arc<MemoryStore>, Synchronizer) {
        let calendar = Arc::new(FakeCalendar::new(events));
        let store = Arc::new(MemoryStore::new());
        let transformer = Arc::new(EventTransformer::new("primary", chrono_tz::Tz::UTC));
        let sync = Synchronizer::new(calendar.clone(), store.clone(), transformer);
        (calendar, store, sync)
    }

    #[tokio::test]
    async fn malformed_item_is_skipped_not_fatal() {
        let mut missing_id = timed("x", "No id", "2024-06-01T10:00:00Z", "2024-06-01T11:00:00Z");
        missing_id.id = None;

        let (_, store, sync) = setup(vec![
            timed("a1", "One", "2024-06-01T10:00:00Z", "2024-06-01T11:00:00Z"),
            missing_id,
            timed("a2", "Two", "2024-06-02T10:00:00Z", "2024-06-02T11:00:00Z"),
            timed("a3", "Three", "2024-06-03T10:00:00Z", "2024-06-03T11:00:00Z"),
        ]);

        let report = sync.pull().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                fetched: 4,
                created: 3,
                updated: 0,
                skipped: 1,
                failed: 0,
            }
        );
        assert_eq!(store.list().await.unwrap().len(), 3);
        assert_eq!(sync.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn pulled_records_are_published_and_hidden() {
        let (_, store, sync) = setup(vec![timed(
            "a1",
            "Summer Fair",
            "2024-06-01T18:00:00Z",
            "2024-06-01T20:00:00Z",
        )]);
        sync.pull().await.unwrap();

        let record = store.get_by_remote_id("a1").await.unwrap().unwrap();
        assert!(record.status.is_published());
        assert_eq!(record.navigation, NavigationFlags::hidden());
        assert_eq!(record.slug, "summer-fair");
        assert_eq!(record.location, "Town Hall");
        assert_eq!(record.start_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(record.start_time, NaiveTime::from_hms_opt(18, 0, 0));
    }

    #[tokio::test]
    async fn second_pull_of_same_event_wins() {
        let (calendar, store, sync) = setup(vec![timed(
            "a1",
            "Draft title",
            "2024-06-01T18:00:00Z",
            "2024-06-01T20:00:00Z",
        )]);
        sync.pull().await.unwrap();

        calendar.set(Ok(vec![timed(
            "a1",
            "Final title",
            "2024-06-02T09:00:00Z",
            "2024-06-02T10:00:00Z",
        )]));
        let report = sync.pull().await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 1);

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Final title");
        assert_eq!(records[0].start_date, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
    }

    #[tokio::test]
    async fn update_keeps_locally_owned_fields() {
        let (calendar, store, sync) = setup(vec![timed(
            "a1",
            "Talk",
            "2024-06-01T18:00:00Z",
            "2024-06-01T20:00:00Z",
        )]);
        sync.pull().await.unwrap();

        let mut record = store.get_by_remote_id("a1").await.unwrap().unwrap();
        record.speakers = "Ada Lovelace".to_string();
        record.rsvp = "talks@example.org".to_string();
        store.update(&record).await.unwrap();

        calendar.set(Ok(vec![timed(
            "a1",
            "Talk (moved)",
            "2024-06-01T19:00:00Z",
            "2024-06-01T21:00:00Z",
        )
        .with_location("Library")]));
        sync.pull().await.unwrap();

        let record = store.get_by_remote_id("a1").await.unwrap().unwrap();
        assert_eq!(record.title, "Talk (moved)");
        assert_eq!(record.location, "Library");
        assert_eq!(record.speakers, "Ada Lovelace");
        assert_eq!(record.rsvp, "talks@example.org");
    }

    #[tokio::test]
    async fn edit_landing_mid_pull_is_kept() {
        let calendar = Arc::new(FakeCalendar::new(vec![timed(
            "a1",
            "Talk",
            "2024-06-01T18:00:00Z",
            "2024-06-01T20:00:00Z",
        )]));
        let store = Arc::new(EditAfterRead::default());
        let transformer = Arc::new(EventTransformer::new("primary", chrono_tz::Tz::UTC));
        let sync = Synchronizer::new(calendar.clone(), store.clone(), transformer);
        sync.pull().await.unwrap();

        store.queue_edit(|record| record.speakers = "Grace Hopper".to_string());
        calendar.set(Ok(vec![timed(
            "a1",
            "Talk (moved)",
            "2024-06-01T19:00:00Z",
            "2024-06-01T21:00:00Z",
        )]));
        let report = sync.pull().await.unwrap();
        assert_eq!(report.updated, 1);

        let record = store.inner.get_by_remote_id("a1").await.unwrap().unwrap();
        assert_eq!(record.title, "Talk (moved)");
        assert_eq!(record.speakers, "Grace Hopper");
    }

    #[tokio::test]
    async fn categories_resolve_to_shared_keywords() {
        let mut first = timed("a1", "One", "2024-06-01T10:00:00Z", "2024-06-01T11:00:00Z");
        first.set_private_property(CATEGORIES_PROPERTY, "Talks, Members");
        let mut second = timed("a2", "Two", "2024-06-02T10:00:00Z", "2024-06-02T11:00:00Z");
        second.set_private_property(CATEGORIES_PROPERTY, "Talks");

        let (_, store, sync) = setup(vec![first, second]);
        sync.pull().await.unwrap();

        let one = store.get_by_remote_id("a1").await.unwrap().unwrap();
        let two = store.get_by_remote_id("a2").await.unwrap().unwrap();
        assert_eq!(one.keywords().len(), 2);
        assert_eq!(two.keywords().len(), 1);
        assert_eq!(one.keywords()[0].id, two.keywords()[0].id);
    }

    #[tokio::test]
    async fn fetch_failure_abandons_cycle() {
        let (calendar, store, sync) = setup(Vec::new());
        calendar.set(Err(ProviderError::network("connection refused")));

        let err = sync.pull().await.unwrap_err();
        assert!(matches!(err, SyncError::Fetch(_)));
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(sync.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn phases_are_observable() {
        let (_, _, sync) = setup(Vec::new());
        let mut phases = sync.subscribe();
        assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);

        sync.pull().await.unwrap();
        assert!(phases.has_changed().unwrap());
        assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);
    }
}
