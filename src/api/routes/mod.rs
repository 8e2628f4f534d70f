//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`dataset`]: Session start, cancel and status
//! - [`records`]: Parsed catalog and label buckets
//! - [`system`]: Health, events, OpenAPI

use serde::{Deserialize, Serialize};

mod dataset;
mod records;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use dataset::*;
pub use records::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /records
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RecordsQuery {
    /// Only records with this label ("COVID-19", "No Finding" or "Other")
    pub finding: Option<String>,
    /// Only records whose catalog folder matches exactly
    pub folder: Option<String>,
    /// Maximum number of records to return (default: 100, max: 1000)
    pub limit: Option<usize>,
    /// Number of matching records to skip (default: 0)
    pub offset: Option<usize>,
}

/// Response for GET /records
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecordsPage {
    /// Records matching the filters, before paging
    pub total: usize,
    /// Offset applied
    pub offset: usize,
    /// Limit applied
    pub limit: usize,
    /// The page, in catalog order
    pub records: Vec<crate::record::Record>,
}

/// Response for POST /dataset/download and POST /dataset/cancel
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionAccepted {
    /// Session the request applies to
    pub session: crate::types::SessionId,
}

/// Response for GET /records/labels
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LabelsResponse {
    /// Records of the latest session per label
    pub records: Vec<LabelTally>,
    /// Image files present on disk per label
    pub images: Vec<crate::training::LabelCount>,
}

/// Record count for one label
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LabelTally {
    /// Label
    pub finding: crate::record::Finding,
    /// Number of records
    pub count: usize,
}
