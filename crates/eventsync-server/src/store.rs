//! Local event storage.
//!
//! [`EventStore`] is the persistence seam for records and keywords. Two
//! implementations are provided: [`MemoryStore`] for tests and short-lived
//! runs, and [`JsonFileStore`], which keeps the same state in memory and
//! rewrites a JSON file after every mutation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eventsync_core::{EventRecord, EventRecordUpdate, Keyword, KeywordId, RecordId, RemoteRef};
use eventsync_providers::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};

/// Persistent storage for event records.
///
/// Remote ids are unique across records: `create` and `update` refuse a
/// record whose remote id already belongs to another one.
pub trait EventStore: Send + Sync {
    /// Fetches a record by local id.
    fn get(&self, id: RecordId) -> BoxFuture<'_, StoreResult<Option<EventRecord>>>;

    /// Fetches the record mirroring a remote event.
    fn get_by_remote_id<'a>(
        &'a self,
        remote_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<EventRecord>>>;

    /// Stores a new record and returns it.
    ///
    /// The store assigns the id; whatever `record.id` holds is replaced.
    fn create(&self, record: EventRecord) -> BoxFuture<'_, StoreResult<EventRecord>>;

    /// Replaces an existing record.
    fn update<'a>(&'a self, record: &'a EventRecord) -> BoxFuture<'a, StoreResult<()>>;

    /// Returns all records ordered by id.
    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<EventRecord>>>;

    /// Returns the keyword with this title, creating it on first use.
    fn get_or_create_keyword<'a>(&'a self, title: &'a str) -> BoxFuture<'a, StoreResult<Keyword>>;

    /// Replaces the remote reference of a record and returns the stored result.
    ///
    /// Every other field keeps its stored value. `None` if the record is gone.
    fn set_remote(
        &self,
        id: RecordId,
        remote: RemoteRef,
    ) -> BoxFuture<'_, StoreResult<Option<EventRecord>>>;

    /// Applies a pulled update to the record holding its remote id, creating
    /// the record if there is none.
    ///
    /// `keywords` replaces the record's keywords when set.
    fn apply_remote_update<'a>(
        &'a self,
        update: &'a EventRecordUpdate,
        keywords: Option<Vec<Keyword>>,
    ) -> BoxFuture<'a, StoreResult<RemoteUpsert>>;
}

/// Outcome of [`EventStore::apply_remote_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteUpsert {
    Created(RecordId),
    Updated(RecordId),
}

/// Store contents shared by both implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    records: BTreeMap<RecordId, EventRecord>,
    keywords: Vec<Keyword>,
    #[serde(default)]
    last_record_id: u64,
    #[serde(default)]
    last_keyword_id: u64,
}

impl StoreState {
    fn get_by_remote_id(&self, remote_id: &str) -> Option<&EventRecord> {
        self.records
            .values()
            .find(|r| r.remote_id() == Some(remote_id))
    }

    fn check_remote_id(&self, record: &EventRecord) -> StoreResult<()> {
        if let Some(remote_id) = record.remote_id()
            && let Some(existing) = self.get_by_remote_id(remote_id)
            && existing.id != record.id
        {
            return Err(StoreError::DuplicateRemoteId {
                remote_id: remote_id.to_string(),
                existing: existing.id,
            });
        }
        Ok(())
    }

    fn create(&mut self, mut record: EventRecord) -> StoreResult<EventRecord> {
        record.id = RecordId(self.last_record_id + 1);
        self.check_remote_id(&record)?;
        self.last_record_id = record.id.0;
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&mut self, record: &EventRecord) -> StoreResult<()> {
        if !self.records.contains_key(&record.id) {
            return Err(StoreError::NotFound(record.id));
        }
        self.check_remote_id(record)?;
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn find_keyword(&self, title: &str) -> Option<Keyword> {
        let title = title.trim();
        self.keywords.iter().find(|k| k.title == title).cloned()
    }

    fn get_or_create_keyword(&mut self, title: &str) -> Keyword {
        if let Some(keyword) = self.find_keyword(title) {
            return keyword;
        }
        self.last_keyword_id += 1;
        let keyword = Keyword {
            id: KeywordId(self.last_keyword_id),
            title: title.trim().to_string(),
        };
        self.keywords.push(keyword.clone());
        keyword
    }

    fn set_remote(&mut self, id: RecordId, remote: RemoteRef) -> StoreResult<Option<EventRecord>> {
        let Some(mut record) = self.records.get(&id).cloned() else {
            return Ok(None);
        };
        record.remote = Some(remote);
        self.check_remote_id(&record)?;
        self.records.insert(id, record.clone());
        Ok(Some(record))
    }

    fn apply_remote_update(
        &mut self,
        update: &EventRecordUpdate,
        keywords: Option<Vec<Keyword>>,
    ) -> StoreResult<RemoteUpsert> {
        match self.get_by_remote_id(&update.remote.id).map(|r| r.id) {
            Some(id) => {
                let record = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
                record.apply_update(update, keywords);
                Ok(RemoteUpsert::Updated(id))
            }
            None => {
                let record =
                    EventRecord::from_update(RecordId(0), update, keywords.unwrap_or_default());
                Ok(RemoteUpsert::Created(self.create(record)?.id))
            }
        }
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryStore {
    fn get(&self, id: RecordId) -> BoxFuture<'_, StoreResult<Option<EventRecord>>> {
        Box::pin(async move { Ok(self.state.read().await.records.get(&id).cloned()) })
    }

    fn get_by_remote_id<'a>(
        &'a self,
        remote_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<EventRecord>>> {
        Box::pin(async move { Ok(self.state.read().await.get_by_remote_id(remote_id).cloned()) })
    }

    fn create(&self, record: EventRecord) -> BoxFuture<'_, StoreResult<EventRecord>> {
        Box::pin(async move { self.state.write().await.create(record) })
    }

    fn update<'a>(&'a self, record: &'a EventRecord) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.state.write().await.update(record) })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<EventRecord>>> {
        Box::pin(async move { Ok(self.state.read().await.records.values().cloned().collect()) })
    }

    fn get_or_create_keyword<'a>(&'a self, title: &'a str) -> BoxFuture<'a, StoreResult<Keyword>> {
        Box::pin(async move { Ok(self.state.write().await.get_or_create_keyword(title)) })
    }

    fn set_remote(
        &self,
        id: RecordId,
        remote: RemoteRef,
    ) -> BoxFuture<'_, StoreResult<Option<EventRecord>>> {
        Box::pin(async move { self.state.write().await.set_remote(id, remote) })
    }

    fn apply_remote_update<'a>(
        &'a self,
        update: &'a EventRecordUpdate,
        keywords: Option<Vec<Keyword>>,
    ) -> BoxFuture<'a, StoreResult<RemoteUpsert>> {
        Box::pin(async move { self.state.write().await.apply_remote_update(update, keywords) })
    }
}

/// Store backed by a JSON file.
///
/// The whole state is loaded on open and written back (via a temporary file
/// and rename) after each mutation, while the write lock is held. A mutation
/// becomes visible only once its file write has succeeded.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file missing, starting empty");
                StoreState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &StoreState) -> StoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        trace!(path = %self.path.display(), records = state.records.len(), "store written");
        Ok(())
    }

    /// Runs `apply` on a copy of `state`, writes the copy out and only then
    /// installs it.
    async fn commit<T>(
        &self,
        state: &mut StoreState,
        apply: impl FnOnce(&mut StoreState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut next = state.clone();
        let value = apply(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(value)
    }
}

impl EventStore for JsonFileStore {
    fn get(&self, id: RecordId) -> BoxFuture<'_, StoreResult<Option<EventRecord>>> {
        Box::pin(async move { Ok(self.state.read().await.records.get(&id).cloned()) })
    }

    fn get_by_remote_id<'a>(
        &'a self,
        remote_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<EventRecord>>> {
        Box::pin(async move { Ok(self.state.read().await.get_by_remote_id(remote_id).cloned()) })
    }

    fn create(&self, record: EventRecord) -> BoxFuture<'_, StoreResult<EventRecord>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            self.commit(&mut state, |s| s.create(record)).await
        })
    }

    fn update<'a>(&'a self, record: &'a EventRecord) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            self.commit(&mut state, |s| s.update(record)).await
        })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<EventRecord>>> {
        Box::pin(async move { Ok(self.state.read().await.records.values().cloned().collect()) })
    }

    fn get_or_create_keyword<'a>(&'a self, title: &'a str) -> BoxFuture<'a, StoreResult<Keyword>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if let Some(keyword) = state.find_keyword(title) {
                return Ok(keyword);
            }
            self.commit(&mut state, |s| Ok(s.get_or_create_keyword(title))).await
        })
    }

    fn set_remote(
        &self,
        id: RecordId,
        remote: RemoteRef,
    ) -> BoxFuture<'_, StoreResult<Option<EventRecord>>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if !state.records.contains_key(&id) {
                return Ok(None);
            }
            self.commit(&mut state, |s| s.set_remote(id, remote)).await
        })
    }

    fn apply_remote_update<'a>(
        &'a self,
        update: &'a EventRecordUpdate,
        keywords: Option<Vec<Keyword>>,
    ) -> BoxFuture<'a, StoreResult<RemoteUpsert>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            self.commit(&mut state, |s| s.apply_remote_update(update, keywords))
                .await
        })
    }
}
