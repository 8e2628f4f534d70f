//! Session lifecycle control (start/cancel/status/shutdown).

use std::sync::atomic::Ordering;

use crate::error::Result;
use crate::types::{SessionId, SessionReport, SessionStatus};

use super::DatasetDownloader;

impl DatasetDownloader {
    /// Start a session in the background
    ///
    /// The claim on the downloader is taken before this returns, so a second call
    /// fails with [`Error::SessionInProgress`](crate::Error::SessionInProgress)
    /// immediately rather than from inside the spawned task.
    pub fn start(&self) -> Result<(SessionId, tokio::task::JoinHandle<Result<SessionReport>>)> {
        let guard = self.begin_session()?;
        let id = guard.id;
        let downloader = self.clone();

        let handle = tokio::spawn(async move { downloader.run_session(guard).await });
        Ok((id, handle))
    }

    /// Cancel the running session
    ///
    /// Returns the cancelled session's ID, or `None` when no session is running.
    /// Units in flight are abandoned; files they were writing are left untouched
    /// because downloads land in temporary files first.
    pub fn cancel(&self) -> Option<SessionId> {
        let active = self.session_state.active();
        let (id, token) = active.as_ref()?;
        tracing::info!(session = %id, "cancelling dataset session");
        token.cancel();
        Some(*id)
    }

    /// Current state of the downloader
    pub fn status(&self) -> SessionStatus {
        let state = &self.session_state;
        if let Some((session, _)) = state.active().as_ref() {
            return SessionStatus::Running {
                session: *session,
                completed: state.completed.load(Ordering::SeqCst),
                total: state.total.load(Ordering::SeqCst),
            };
        }
        state.outcome()
    }

    /// Whether a session is running
    pub fn is_running(&self) -> bool {
        self.session_state.running.load(Ordering::SeqCst)
    }

    /// Cancel any running session and refuse new ones
    pub fn shutdown(&self) {
        tracing::info!("shutting down dataset downloader");
        self.shutdown_token.cancel();
    }
}
