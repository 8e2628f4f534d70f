//! Error types for chestxray-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (transport, storage, catalog)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Row-level catalog problems are never errors: a malformed row is dropped by
//! the parser. Only failures that void a whole session surface here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for chestxray-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chestxray-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// Fetching a remote resource failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Creating, moving, copying or removing a local file failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The downloaded catalog could not be opened or read as CSV
    #[error("catalog error: {0}")]
    Catalog(String),

    /// CSV reader error while opening the catalog
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A download session is already running
    #[error("a download session is already in progress")]
    SessionInProgress,

    /// The session was cancelled before it finished
    #[error("download session cancelled")]
    Cancelled,

    /// Requested resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// An internal contract was violated (a value that must exist was missing)
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Errors raised while talking to the remote dataset host
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request path could not be joined onto the base URL
    #[error("invalid URL for path '{path}': {reason}")]
    InvalidUrl {
        /// The request path
        path: String,
        /// Why the URL could not be built
        reason: String,
    },

    /// The request could not be sent or the body could not be read
    #[error("request to {url} failed: {source}")]
    Request {
        /// The URL that was requested
        url: String,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The URL that was requested
        url: String,
        /// HTTP status code of the response
        status: u16,
    },

    /// The server answered 2xx with an empty body where content was required
    #[error("{url} returned an empty body")]
    EmptyBody {
        /// The URL that was requested
        url: String,
    },

    /// A fetch unit exceeded its deadline
    #[error("{path} timed out after {}ms", .after.as_millis())]
    Timeout {
        /// The request path that timed out
        path: String,
        /// The deadline that was exceeded
        after: Duration,
    },
}

/// Errors raised while placing files on local storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// A base location (such as the documents directory) could not be resolved
    #[error("could not resolve {what}")]
    UnresolvedLocation {
        /// Which location was missing (e.g., "documents directory")
        what: String,
    },

    /// Directory creation failed
    #[error("failed to create directory {path}: {reason}")]
    CreateDir {
        /// The directory that could not be created
        path: PathBuf,
        /// The reason creation failed
        reason: String,
    },

    /// Removing a pre-existing file failed
    #[error("failed to remove {path}: {reason}")]
    Remove {
        /// The file that could not be removed
        path: PathBuf,
        /// The reason removal failed
        reason: String,
    },

    /// Copying a downloaded file to a destination failed
    #[error("failed to copy {from} to {to}: {reason}")]
    Copy {
        /// Source file
        from: PathBuf,
        /// Destination file
        to: PathBuf,
        /// The reason the copy failed
        reason: String,
    },

    /// Moving a downloaded file into place failed
    #[error("failed to move {from} to {to}: {reason}")]
    Move {
        /// Source file
        from: PathBuf,
        /// Destination file
        to: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// Writing downloaded bytes to a temporary file failed
    #[error("failed to write {path}: {reason}")]
    Write {
        /// The file being written
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "session_in_progress",
///     "message": "a download session is already in progress"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "transport_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - invalid configuration
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 409 Conflict - session state
            Error::SessionInProgress => 409,
            Error::Cancelled => 409,

            // 502 Bad Gateway - the dataset host misbehaved
            Error::Transport(_) => 502,
            Error::Network(_) => 502,
            Error::Catalog(_) => 502,
            Error::Csv(_) => 502,

            // 500 Internal Server Error - local issues
            Error::Storage(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Unknown(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Transport(e) => match e {
                TransportError::InvalidUrl { .. } => "invalid_url",
                TransportError::Request { .. } => "request_failed",
                TransportError::Status { .. } => "bad_status",
                TransportError::EmptyBody { .. } => "empty_body",
                TransportError::Timeout { .. } => "timeout",
            },
            Error::Storage(e) => match e {
                StorageError::UnresolvedLocation { .. } => "unresolved_location",
                StorageError::CreateDir { .. } => "create_dir_failed",
                StorageError::Remove { .. } => "remove_failed",
                StorageError::Copy { .. } => "copy_failed",
                StorageError::Move { .. } => "move_failed",
                StorageError::Write { .. } => "write_failed",
            },
            Error::Catalog(_) => "catalog_error",
            Error::Csv(_) => "catalog_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::SessionInProgress => "session_in_progress",
            Error::Cancelled => "cancelled",
            Error::NotFound(_) => "not_found",
            Error::ApiServerError(_) => "api_server_error",
            Error::Unknown(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Transport(TransportError::Status { url, status }) => Some(serde_json::json!({
                "url": url,
                "status": status,
            })),
            Error::Transport(TransportError::Timeout { path, after }) => Some(serde_json::json!({
                "path": path,
                "timeout_ms": after.as_millis() as u64,
            })),
            Error::Storage(StorageError::UnresolvedLocation { what }) => {
                Some(serde_json::json!({ "location": what }))
            }
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            _ => None,
        };

        match details {
            Some(details) => ApiError::with_details(code, message, details),
            None => ApiError::new(code, message),
        }
    }
}
