//! Core types for chestxray-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::record::Record;

/// Unique identifier for a download session
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Event emitted during a download session
///
/// Every session emits `SessionStarted` first and exactly one terminal event
/// (`SessionComplete`, `SessionFailed` or `SessionCancelled`) last.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Session accepted, catalog fetch starting
    SessionStarted {
        /// Session ID
        session: SessionId,
    },

    /// Catalog stored on disk
    CatalogDownloaded {
        /// Session ID
        session: SessionId,
        /// Where the catalog was written
        #[schema(value_type = String)]
        path: PathBuf,
    },

    /// Catalog converted into records
    CatalogParsed {
        /// Session ID
        session: SessionId,
        /// Data rows read from the catalog
        total_rows: usize,
        /// Rows that produced a record
        records: usize,
        /// Rows dropped as malformed
        dropped_rows: usize,
        /// Records whose image is hosted on the source
        image_rows: usize,
    },

    /// Image stored in its label folder
    ImageDownloaded {
        /// Session ID
        session: SessionId,
        /// Patient the image belongs to
        patient_id: String,
        /// Catalog filename
        filename: String,
        /// Local destination
        #[schema(value_type = String)]
        path: PathBuf,
    },

    /// Image fetch unit failed (the session continues)
    ImageFailed {
        /// Session ID
        session: SessionId,
        /// Patient the image belongs to
        patient_id: String,
        /// Catalog filename
        filename: String,
        /// Error message
        error: String,
    },

    /// Image row has no usable local destination
    ImageSkipped {
        /// Session ID
        session: SessionId,
        /// Patient the image belongs to
        patient_id: String,
        /// Catalog filename
        filename: String,
        /// Why the row was skipped
        reason: String,
    },

    /// Image row resolves to a destination already claimed in this session
    DuplicateImage {
        /// Session ID
        session: SessionId,
        /// Patient the image belongs to
        patient_id: String,
        /// Catalog filename
        filename: String,
        /// Shared local destination
        #[schema(value_type = String)]
        path: PathBuf,
    },

    /// Every fetch unit finished
    SessionComplete {
        /// Session ID
        session: SessionId,
        /// Final counters
        summary: SessionSummary,
    },

    /// Catalog could not be fetched or parsed; no image was scheduled
    SessionFailed {
        /// Session ID
        session: SessionId,
        /// Error message
        error: String,
    },

    /// Session cancelled before completion
    SessionCancelled {
        /// Session ID
        session: SessionId,
    },
}

impl Event {
    /// Session the event belongs to
    pub fn session(&self) -> SessionId {
        match self {
            Event::SessionStarted { session }
            | Event::CatalogDownloaded { session, .. }
            | Event::CatalogParsed { session, .. }
            | Event::ImageDownloaded { session, .. }
            | Event::ImageFailed { session, .. }
            | Event::ImageSkipped { session, .. }
            | Event::DuplicateImage { session, .. }
            | Event::SessionComplete { session, .. }
            | Event::SessionFailed { session, .. }
            | Event::SessionCancelled { session } => *session,
        }
    }

    /// Whether this event ends its session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::SessionComplete { .. }
                | Event::SessionFailed { .. }
                | Event::SessionCancelled { .. }
        )
    }
}

/// Counters describing a finished session
///
/// `image_rows == scheduled + skipped + duplicates` and
/// `scheduled == succeeded + failed`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    /// Data rows read from the catalog
    pub total_rows: usize,
    /// Rows that produced a record
    pub records: usize,
    /// Rows dropped as malformed
    pub dropped_rows: usize,
    /// Records whose image is hosted on the source
    pub image_rows: usize,
    /// Fetch units actually run
    pub scheduled: usize,
    /// Fetch units that stored their image
    pub succeeded: usize,
    /// Fetch units that failed
    pub failed: usize,
    /// Image rows without a usable destination
    pub skipped: usize,
    /// Image rows sharing a destination with an earlier row
    pub duplicates: usize,
}

/// Image fetch failure recorded in a session report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImageFailure {
    /// Patient the image belongs to
    pub patient_id: String,
    /// Catalog filename
    pub filename: String,
    /// Error message
    pub error: String,
}

/// Full outcome of a successful session
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionReport {
    /// Session ID
    pub session: SessionId,
    /// Every parsed record in catalog order, including those whose image failed
    pub records: Vec<Record>,
    /// Final counters
    pub summary: SessionSummary,
    /// Per-image failures in catalog order
    pub failures: Vec<ImageFailure>,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the last fetch unit finished
    pub finished_at: DateTime<Utc>,
}

/// Current state of the downloader
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session has run yet
    #[default]
    Idle,
    /// A session is in progress
    Running {
        /// Session ID
        session: SessionId,
        /// Fetch units finished so far
        completed: usize,
        /// Fetch units planned (0 until the catalog is parsed)
        total: usize,
    },
    /// Last session finished
    Complete {
        /// Session ID
        session: SessionId,
        /// Final counters
        summary: SessionSummary,
    },
    /// Last session failed before scheduling images
    Failed {
        /// Session ID
        session: SessionId,
        /// Error message
        error: String,
    },
    /// Last session was cancelled
    Cancelled {
        /// Session ID
        session: SessionId,
    },
}

impl SessionStatus {
    /// Whether a session is in progress
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Running { .. })
    }
}
