//! Push path: published records out to the remote calendar.
//!
//! [`PushDispatcher::push`] prepares the record, commits it and drops a
//! [`PushJob`] on a queue; it never waits on the network. A [`PushWorker`]
//! drains the queue on its own task and upserts each event, retrying
//! transient failures. Delivery is at least once, and since the upsert is
//! keyed by event id a repeated job leaves a single remote event.

use std::sync::Arc;

use chrono_tz::Tz;
use eventsync_core::{EventRecord, RecordId, RemoteRef};
use eventsync_providers::{
    CalendarService, EventPayload, EventTransformer, OutboundEvent, ProviderError,
    derived_event_id,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::error::PushError;
use crate::store::EventStore;

/// One queued write to the remote calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct PushJob {
    pub record_id: RecordId,
    /// Payload captured when the job was queued.
    pub outbound: OutboundEvent,
}

/// Queues published records for delivery.
#[derive(Clone)]
pub struct PushDispatcher {
    store: Arc<dyn EventStore>,
    transformer: Arc<EventTransformer>,
    queue: mpsc::UnboundedSender<PushJob>,
}

impl PushDispatcher {
    /// Creates a dispatcher and the receiving end of its queue.
    pub fn new(
        store: Arc<dyn EventStore>,
        transformer: Arc<EventTransformer>,
    ) -> (Self, mpsc::UnboundedReceiver<PushJob>) {
        let (queue, rx) = mpsc::unbounded_channel();
        (
            Self {
                store,
                transformer,
                queue,
            },
            rx,
        )
    }

    /// Zone the calendar expresses local times in.
    pub fn timezone(&self) -> Tz {
        self.transformer.timezone()
    }

    /// Queues a record that has just been published.
    ///
    /// The record is hidden from navigation and given its remote id, and that
    /// change is committed before the job is queued.
    pub async fn push(&self, record: &mut EventRecord) -> Result<(), PushError> {
        record.hide_from_navigation();
        if record.remote.is_none() {
            record.remote = Some(RemoteRef::new(derived_event_id(record.id)));
        }
        self.store.update(record).await?;

        let job = PushJob {
            record_id: record.id,
            outbound: self.transformer.to_remote(record),
        };
        debug!(record_id = %record.id, remote_id = ?job.outbound.event_id(), "queueing push");
        self.queue.send(job).map_err(|_| PushError::QueueClosed)
    }
}

/// Delivers queued jobs to the remote calendar.
pub struct PushWorker {
    service: Arc<dyn CalendarService>,
    store: Arc<dyn EventStore>,
    retry: RetryPolicy,
    jobs: mpsc::UnboundedReceiver<PushJob>,
}

impl PushWorker {
    pub fn new(
        service: Arc<dyn CalendarService>,
        store: Arc<dyn EventStore>,
        retry: RetryPolicy,
        jobs: mpsc::UnboundedReceiver<PushJob>,
    ) -> Self {
        Self {
            service,
            store,
            retry,
            jobs,
        }
    }

    /// Processes jobs until every dispatcher has been dropped.
    pub async fn run(mut self) {
        info!(service = self.service.name(), "push worker started");
        while let Some(job) = self.jobs.recv().await {
            if let Err(e) = self.deliver(&job).await {
                warn!(record_id = %job.record_id, error = %e, "push failed");
            }
        }
        info!("push worker stopped");
    }

    /// Delivers one job, retrying retryable failures.
    pub async fn deliver(&self, job: &PushJob) -> Result<(), PushError> {
        let stored = self.upsert_with_retry(job).await?;
        self.record_remote(job, stored).await
    }

    async fn upsert_with_retry(&self, job: &PushJob) -> Result<EventPayload, PushError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.service.upsert_event(&job.outbound).await {
                Ok(stored) => {
                    info!(record_id = %job.record_id, attempt, "event pushed");
                    return Ok(stored);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff_delay(attempt);
                    warn!(
                        record_id = %job.record_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "push attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => return Err(delivery_failed(job.record_id, attempt, source)),
            }
        }
    }

    /// Writes the remote etag and link back to the local record.
    async fn record_remote(&self, job: &PushJob, stored: EventPayload) -> Result<(), PushError> {
        let remote_id = stored
            .id
            .or_else(|| job.outbound.event_id().map(str::to_string))
            .unwrap_or_else(|| derived_event_id(job.record_id));
        let remote = RemoteRef {
            id: remote_id,
            etag: stored.etag,
            html_link: stored.html_link,
        };

        if self.store.set_remote(job.record_id, remote).await?.is_none() {
            debug!(record_id = %job.record_id, "record deleted before push completed");
        }
        Ok(())
    }
}

fn delivery_failed(record_id: RecordId, attempts: u32, source: ProviderError) -> PushError {
    PushError::Delivery {
        record_id,
        attempts,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use eventsync_core::{EventBoundary, NavigationFlags, PublishStatus};
    use eventsync_providers::{BoxFuture, ProviderResult};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::store::MemoryStore;
    use crate::store::testing::EditAfterRead;

    /// Records upserts and fails the first `failures` of them.
    struct FakeCalendar {
        upserts: Mutex<Vec<OutboundEvent>>,
        failures: Mutex<Vec<ProviderError>>,
    }

    impl FakeCalendar {
        fn new(failures: Vec<ProviderError>) -> Self {
            Self {
                upserts: Mutex::new(Vec::new()),
                failures: Mutex::new(failures),
            }
        }

        fn upserts(&self) -> Vec<OutboundEvent> {
            self.upserts.lock().unwrap().clone()
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
            Box::pin(async { Ok(Vec::new()) })
        }

        fn upsert_event<'a>(
            &'a self,
            outbound: &'a OutboundEvent,
        ) -> BoxFuture<'a, ProviderResult<EventPayload>> {
            self.upserts.lock().unwrap().push(outbound.clone());
            let result = {
                let mut failures = self.failures.lock().unwrap();
                if failures.is_empty() {
                    let mut stored = outbound.event.clone();
                    stored.etag = Some("\"etag-1\"".to_string());
                    stored.html_link = Some("https://calendar.example/e/1".to_string());
                    Ok(stored)
                } else {
                    Err(failures.remove(0))
                }
            };
            Box::pin(async move { result })
        }
    }

    async fn published_record(store: &MemoryStore) -> EventRecord {
        let day = EventBoundary::all_day(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let mut record = EventRecord::new(RecordId(0), "Open Day", day, day, "Campus");
        record.status = PublishStatus::Published;
        record.navigation.in_menus = vec!["main".to_string()];
        store.create(record).await.unwrap()
    }

    fn transformer() -> Arc<EventTransformer> {
        Arc::new(EventTransformer::new("primary", chrono_tz::Tz::UTC))
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .with_backoff(Duration::from_millis(10), Duration::from_millis(50), 2.0)
    }

    #[tokio::test]
    async fn push_commits_hidden_record_and_queues_job() {
        let store = Arc::new(MemoryStore::new());
        let (dispatcher, mut jobs) = PushDispatcher::new(store.clone(), transformer());

        let mut record = published_record(&store).await;
        dispatcher.push(&mut record).await.unwrap();

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.navigation, NavigationFlags::hidden());
        assert_eq!(stored.remote_id(), Some("ev0000000001"));

        let job = jobs.try_recv().unwrap();
        assert_eq!(job.record_id, record.id);
        assert_eq!(job.outbound.calendar_id, "primary");
        assert_eq!(job.outbound.event_id(), Some("ev0000000001"));
    }

    #[tokio::test]
    async fn payload_is_captured_at_enqueue_time() {
        let store = Arc::new(MemoryStore::new());
        let (dispatcher, mut jobs) = PushDispatcher::new(store.clone(), transformer());

        let mut record = published_record(&store).await;
        dispatcher.push(&mut record).await.unwrap();
        record.title = "Renamed later".to_string();
        store.update(&record).await.unwrap();

        let job = jobs.try_recv().unwrap();
        assert_eq!(job.outbound.event.summary.as_deref(), Some("Open Day"));
    }

    #[tokio::test]
    async fn push_fails_when_worker_is_gone() {
        let store = Arc::new(MemoryStore::new());
        let (dispatcher, jobs) = PushDispatcher::new(store.clone(), transformer());
        drop(jobs);

        let mut record = published_record(&store).await;
        let err = dispatcher.push(&mut record).await.unwrap_err();
        assert!(matches!(err, PushError::QueueClosed));

        // The navigation change is committed even though nothing was queued.
        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.navigation, NavigationFlags::hidden());
        assert_eq!(stored.remote_id(), Some("ev0000000001"));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_retries_transient_failures_and_records_etag() {
        let store = Arc::new(MemoryStore::new());
        let calendar = Arc::new(FakeCalendar::new(vec![
            ProviderError::network("reset"),
            ProviderError::server("503"),
        ]));
        let (dispatcher, jobs) = PushDispatcher::new(store.clone(), transformer());
        let worker = PushWorker::new(calendar.clone(), store.clone(), fast_retry(5), jobs);

        let mut record = published_record(&store).await;
        dispatcher.push(&mut record).await.unwrap();
        drop(dispatcher);
        worker.run().await;

        assert_eq!(calendar.upserts().len(), 3);
        let stored = store.get(record.id).await.unwrap().unwrap();
        let remote = stored.remote.unwrap();
        assert_eq!(remote.id, "ev0000000001");
        assert_eq!(remote.etag.as_deref(), Some("\"etag-1\""));
        assert_eq!(remote.html_link.as_deref(), Some("https://calendar.example/e/1"));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_gives_up_after_max_attempts() {
        let store = Arc::new(MemoryStore::new());
        let calendar = Arc::new(FakeCalendar::new(vec![
            ProviderError::network("down"),
            ProviderError::network("down"),
            ProviderError::network("down"),
        ]));
        let (dispatcher, mut jobs) = PushDispatcher::new(store.clone(), transformer());

        let mut record = published_record(&store).await;
        dispatcher.push(&mut record).await.unwrap();
        let job = jobs.try_recv().unwrap();

        let worker = PushWorker::new(calendar.clone(), store.clone(), fast_retry(2), jobs);
        let err = worker.deliver(&job).await.unwrap_err();
        assert!(matches!(err, PushError::Delivery { attempts: 2, .. }));
        assert_eq!(calendar.upserts().len(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let calendar = Arc::new(FakeCalendar::new(vec![ProviderError::authentication(
            "expired",
        )]));
        let (dispatcher, mut jobs) = PushDispatcher::new(store.clone(), transformer());

        let mut record = published_record(&store).await;
        dispatcher.push(&mut record).await.unwrap();
        let job = jobs.try_recv().unwrap();

        let worker = PushWorker::new(calendar.clone(), store.clone(), fast_retry(5), jobs);
        assert!(worker.deliver(&job).await.is_err());
        assert_eq!(calendar.upserts().len(), 1);
    }

    #[tokio::test]
    async fn edit_landing_mid_delivery_is_kept() {
        let store = Arc::new(EditAfterRead::default());
        let calendar = Arc::new(FakeCalendar::new(Vec::new()));
        let (dispatcher, mut jobs) = PushDispatcher::new(store.clone(), transformer());

        let mut record = published_record(&store.inner).await;
        dispatcher.push(&mut record).await.unwrap();
        let job = jobs.try_recv().unwrap();

        store.queue_edit(|record| record.description = "edited by user".to_string());
        let worker = PushWorker::new(calendar, store.clone(), fast_retry(1), jobs);
        worker.deliver(&job).await.unwrap();

        let stored = store.inner.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.description, "edited by user");
        assert_eq!(
            stored.remote.and_then(|r| r.etag).as_deref(),
            Some("\"etag-1\"")
        );
    }

    #[tokio::test]
    async fn repeated_job_is_harmless() {
        let store = Arc::new(MemoryStore::new());
        let calendar = Arc::new(FakeCalendar::new(Vec::new()));
        let (dispatcher, mut jobs) = PushDispatcher::new(store.clone(), transformer());

        let mut record = published_record(&store).await;
        dispatcher.push(&mut record).await.unwrap();
        let job = jobs.try_recv().unwrap();

        let worker = PushWorker::new(calendar.clone(), store.clone(), fast_retry(1), jobs);
        worker.deliver(&job).await.unwrap();
        worker.deliver(&job).await.unwrap();

        let upserts = calendar.upserts();
        assert_eq!(upserts.len(), 2);
        assert_eq!(upserts[0].event_id(), upserts[1].event_id());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
