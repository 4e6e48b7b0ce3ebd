//! Sync engine: pull cycles, push queue, save path, scheduling.
//!
//! This crate wires the services from `eventsync-providers` to a local
//! [`EventStore`]:
//! - [`Synchronizer`] pulls the remote calendar into the store
//! - [`PushDispatcher`] and [`PushWorker`] push published records back out
//! - [`EventEditor`] is the save path for local edits, including geocoding
//! - [`PullScheduler`] repeats pulls on an interval
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use eventsync_providers::GoogleCalendarClient;
//! use eventsync_server::{MemoryStore, SyncConfig, Synchronizer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::new("primary");
//!     let calendar = GoogleCalendarClient::new("token", std::time::Duration::from_secs(30))?;
//!     let sync = Synchronizer::new(
//!         Arc::new(calendar),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(config.transformer()?),
//!     );
//!     let report = sync.pull().await?;
//!     println!("{} created, {} updated", report.created, report.updated);
//!     Ok(())
//! }
//! ```

mod config;
mod editor;
mod error;
mod push;
mod scheduler;
mod store;
mod sync;

pub use config::{RetryPolicy, SyncConfig};
pub use editor::EventEditor;
pub use error::{ConfigError, PushError, SaveError, StoreError, StoreResult, SyncError};
pub use push::{PushDispatcher, PushJob, PushWorker};
pub use scheduler::{
    PullScheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle, SchedulerState,
    SharedSchedulerState,
};
pub use store::{EventStore, JsonFileStore, MemoryStore, RemoteUpsert};
pub use sync::{SyncPhase, SyncReport, Synchronizer};
