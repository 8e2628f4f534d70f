//! # chestxray-dl
//!
//! Downloader for the public COVID-19 chest X-ray dataset.
//!
//! A session fetches the dataset catalog (`metadata.csv`), parses every row into a
//! typed [`Record`], and downloads the image of each image row into a folder named
//! after its diagnostic label:
//!
//! ```text
//! <documents>/metadata.csv
//! <documents>/DataSet/COVID-19/<filename>
//! <documents>/DataSet/No Finding/<filename>
//! <documents>/DataSet/others/<filename>
//! ```
//!
//! Image downloads run concurrently, at most `max_concurrent_downloads` (10 by
//! default) at a time. A failed image never fails the session; the session fails
//! only when the catalog cannot be fetched or parsed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chestxray_dl::{Config, DatasetDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = DatasetDownloader::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let records = downloader.execute().await?;
//!     println!("{} records", records.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Session orchestration (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// HTTP fetch client
pub mod network;
/// Catalog records and CSV parsing
pub mod record;
/// Retry logic with exponential backoff
pub mod retry;
/// Local dataset layout
pub mod store;
/// Trainer boundary
pub mod training;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use downloader::DatasetDownloader;
pub use error::{ApiError, Error, ErrorDetail, Result, StorageError, ToHttpStatus, TransportError};
pub use network::{FileFetcher, NetworkClient, Request};
pub use record::{Finding, Record, parse_catalog, read_catalog};
pub use store::DatasetStore;
pub use training::{EvaluationMetrics, ImageClassifier, LabeledImages};
pub use types::{Event, SessionId, SessionReport, SessionStatus, SessionSummary};

/// Run one session, cancelling it when a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns the session's records, or [`Error::Cancelled`] if a signal stopped it.
///
/// # Example
///
/// ```no_run
/// use chestxray_dl::{Config, DatasetDownloader, execute_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = DatasetDownloader::new(Config::default())?;
///     let records = execute_until_signal(&downloader).await?;
///     println!("{} records", records.len());
///     Ok(())
/// }
/// ```
pub async fn execute_until_signal(downloader: &DatasetDownloader) -> Result<Vec<Record>> {
    let session = downloader.execute();
    tokio::pin!(session);

    tokio::select! {
        result = &mut session => result,
        _ = wait_for_signal() => {
            tracing::info!("stopping dataset session");
            downloader.cancel();
            session.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
