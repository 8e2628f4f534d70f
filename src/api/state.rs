//! Application state for the API server

use crate::{Config, DatasetDownloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the downloader instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The dataset downloader driven by the API
    pub downloader: Arc<DatasetDownloader>,

    /// Configuration the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<DatasetDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
