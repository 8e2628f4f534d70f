//! Core downloader implementation split into focused submodules.
//!
//! The `DatasetDownloader` struct and its methods are organized by domain:
//! - [`session`] - Catalog fetch, parse, planning and the bounded image phase
//! - [`fetch_unit`] - One image download with deadline, retry and cancellation
//! - [`control`] - Session lifecycle control (start/cancel/status/shutdown)

mod control;
mod fetch_unit;
mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::network::{FileFetcher, NetworkClient};
use crate::record::Record;
use crate::store::DatasetStore;
use crate::training::LabeledImages;
use crate::types::{Event, SessionId, SessionReport, SessionStatus};

/// Session bookkeeping shared by every clone of the downloader
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Set while a session owns the downloader
    running: AtomicBool,
    /// Last issued session ID
    last_id: AtomicU64,
    /// Fetch units finished in the running session
    pub(crate) completed: AtomicUsize,
    /// Fetch units planned in the running session
    pub(crate) total: AtomicUsize,
    /// Running session and its cancellation token
    active: Mutex<Option<(SessionId, CancellationToken)>>,
    /// Outcome of the last finished session
    last_outcome: RwLock<SessionStatus>,
}

impl SessionState {
    fn active(&self) -> std::sync::MutexGuard<'_, Option<(SessionId, CancellationToken)>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_outcome(&self, status: SessionStatus) {
        *self
            .last_outcome
            .write()
            .unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn outcome(&self) -> SessionStatus {
        self.last_outcome
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Exclusive claim on the downloader for one session
///
/// Dropping the guard releases the claim, so a session that panics or whose
/// future is dropped never blocks later sessions.
pub(crate) struct SessionGuard {
    state: Arc<SessionState>,
    pub(crate) id: SessionId,
    pub(crate) token: CancellationToken,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        {
            let mut active = self.state.active();
            if active.as_ref().is_some_and(|(id, _)| *id == self.id) {
                *active = None;
            }
        }
        self.state.running.store(false, Ordering::SeqCst);
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DatasetDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Network seam used for the catalog and every image
    pub(crate) fetcher: Arc<dyn FileFetcher>,
    /// Local layout
    pub(crate) store: DatasetStore,
    /// Session exclusivity, progress and last outcome
    pub(crate) session_state: Arc<SessionState>,
    /// Records of the latest successful session
    pub(crate) records: Arc<RwLock<Arc<Vec<Record>>>>,
    /// Parent of every session token; cancelled on shutdown
    pub(crate) shutdown_token: CancellationToken,
}

impl DatasetDownloader {
    /// Create a new DatasetDownloader talking to the configured source
    ///
    /// Validates the configuration and builds the HTTP client. Nothing is fetched
    /// until a session starts.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = NetworkClient::from_config(&config)?;
        Self::with_fetcher(config, Arc::new(client))
    }

    /// Create a downloader that fetches through `fetcher`
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn FileFetcher>) -> Result<Self> {
        config.validate()?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        Ok(Self {
            event_tx,
            store: DatasetStore::from_config(&config),
            config: Arc::new(config),
            fetcher,
            session_state: Arc::new(SessionState::default()),
            records: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Subscribe to session events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chestxray_dl::{Config, DatasetDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = DatasetDownloader::new(Config::default())?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "dataset event");
    ///         }
    ///     });
    ///
    ///     let records = downloader.execute().await?;
    ///     println!("{} records", records.len());
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Local layout used by this downloader
    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Run one session to completion and return every parsed record in catalog order
    ///
    /// Records whose image failed to download are included. Fails only when the
    /// catalog could not be fetched or parsed (no image is scheduled then), when
    /// another session is running, or when the session is cancelled.
    pub async fn execute(&self) -> Result<Vec<Record>> {
        self.execute_with_report().await.map(|report| report.records)
    }

    /// Run one session and return the records together with per-image outcomes
    pub async fn execute_with_report(&self) -> Result<SessionReport> {
        let guard = self.begin_session()?;
        self.run_session(guard).await
    }

    /// Records of the latest successful session (empty before the first one)
    pub fn records(&self) -> Arc<Vec<Record>> {
        Arc::clone(&self.records.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Latest records grouped by label for a trainer
    pub fn labeled_images(&self) -> Result<LabeledImages> {
        let dataset_dir = self.store.dataset_dir()?;
        Ok(LabeledImages::from_records(&self.records(), &dataset_dir))
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with sessions and listens on the configured
    /// bind address (default: 127.0.0.1:6790).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }

    /// Claim the downloader for a new session
    pub(crate) fn begin_session(&self) -> Result<SessionGuard> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self
            .session_state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::SessionInProgress);
        }

        let state = &self.session_state;
        let id = SessionId(state.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        state.completed.store(0, Ordering::SeqCst);
        state.total.store(0, Ordering::SeqCst);

        let token = self.shutdown_token.child_token();
        *state.active() = Some((id, token.clone()));

        Ok(SessionGuard {
            state: Arc::clone(state),
            id,
            token,
        })
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    pub(crate) fn replace_records(&self, records: Vec<Record>) {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(records);
    }
}
