//! Shared test helpers for creating DatasetDownloader instances in tests.

use crate::config::Config;
use crate::downloader::DatasetDownloader;
use crate::error::{Error, Result, TransportError};
use crate::network::{FileFetcher, Request};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Catalog header in the column order of the published dataset
pub(crate) const HEADER: &str = "patientid,offset,sex,age,finding,survival,intubated,went_icu,needed_supplemental_O2,extubated,temperature,pO2_saturation,leukocyte_count,neutrophil_count,lymphocyte_count,view,modality,date,location,folder,filename,doi,url,license,clinical_notes,other_notes";

/// A complete 26-field catalog row
pub(crate) fn image_row(patient_id: &str, finding: &str, folder: &str, filename: &str) -> String {
    format!(
        "{patient_id},0,F,40,{finding},Y,N,N,N,N,37.5,95,6.1,4.2,1.1,PA,X-ray,2020,Somewhere,{folder},{filename},,,,,"
    )
}

/// Header followed by `rows`, one per line
pub(crate) fn catalog(rows: &[String]) -> String {
    let mut csv = String::from(HEADER);
    for row in rows {
        csv.push('\n');
        csv.push_str(row);
    }
    csv.push('\n');
    csv
}

/// Catalog with `count` downloadable "No Finding" rows named `img-<n>.png`
pub(crate) fn catalog_with_images(count: usize) -> String {
    let rows: Vec<String> = (0..count)
        .map(|n| image_row(&n.to_string(), "No Finding", "images", &format!("img-{n}.png")))
        .collect();
    catalog(&rows)
}

/// In-memory stand-in for the HTTP client
///
/// Serves `metadata.csv` from the given catalog text and writes `image:<path>`
/// for every other path. Paths can be made to fail, fail transiently, hang or
/// respond slowly.
pub(crate) struct FakeFetcher {
    catalog: Option<String>,
    failing: HashSet<String>,
    flaky: Mutex<HashMap<String, usize>>,
    hanging: HashSet<String>,
    delay: Option<Duration>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub(crate) fn new(catalog_csv: &str) -> Self {
        Self {
            catalog: Some(catalog_csv.to_string()),
            failing: HashSet::new(),
            flaky: Mutex::new(HashMap::new()),
            hanging: HashSet::new(),
            delay: None,
            delays: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Catalog requests fail with 404
    pub(crate) fn without_catalog(mut self) -> Self {
        self.catalog = None;
        self
    }

    /// `path` always fails with 404
    pub(crate) fn with_failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// `path` fails with 503 for its first `failures` requests
    pub(crate) fn with_flaky(self, path: &str, failures: usize) -> Self {
        self.flaky
            .lock()
            .unwrap()
            .insert(path.to_string(), failures);
        self
    }

    /// `path` never completes
    pub(crate) fn with_hanging(mut self, path: &str) -> Self {
        self.hanging.insert(path.to_string());
        self
    }

    /// Every image request takes at least `delay`
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `path` takes `delay`, overriding the shared delay
    pub(crate) fn with_path_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    /// Number of requests made for `path`
    pub(crate) fn request_count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    /// Every requested path, in request order
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Image requests only
    pub(crate) fn image_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|p| p != "metadata.csv")
            .collect()
    }

    /// Highest number of requests observed in flight at once
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn status_error(path: &str, status: u16) -> Error {
        Error::Transport(TransportError::Status {
            url: format!("fake://{path}"),
            status,
        })
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileFetcher for FakeFetcher {
    async fn fetch_to_file(&self, request: &Request, destination: &Path) -> Result<PathBuf> {
        let path = request.path.clone();
        self.requests.lock().unwrap().push(path.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let body = if path == "metadata.csv" {
            match &self.catalog {
                Some(csv) => csv.clone(),
                None => return Err(Self::status_error(&path, 404)),
            }
        } else {
            if let Some(delay) = self.delays.get(&path).copied().or(self.delay) {
                tokio::time::sleep(delay).await;
            }
            if self.hanging.contains(&path) {
                std::future::pending::<()>().await;
            }
            if self.failing.contains(&path) {
                return Err(Self::status_error(&path, 404));
            }
            {
                let mut flaky = self.flaky.lock().unwrap();
                if let Some(remaining) = flaky.get_mut(&path)
                    && *remaining > 0
                {
                    *remaining -= 1;
                    return Err(Self::status_error(&path, 503));
                }
            }
            format!("image:{path}")
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, body).await?;
        Ok(destination.to_path_buf())
    }
}

/// Config rooted in `documents_dir` with retry off
pub(crate) fn test_config(documents_dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.documents_dir = Some(documents_dir.to_path_buf());
    config
}

/// Helper to create a test DatasetDownloader backed by `fetcher`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader(fetcher: Arc<FakeFetcher>) -> (DatasetDownloader, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let downloader = DatasetDownloader::with_fetcher(config, fetcher).unwrap();
    (downloader, temp_dir)
}

/// Like [`create_test_downloader`] with a caller-adjusted config
pub(crate) fn create_test_downloader_with(
    fetcher: Arc<FakeFetcher>,
    adjust: impl FnOnce(&mut Config),
) -> (DatasetDownloader, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path());
    adjust(&mut config);
    let downloader = DatasetDownloader::with_fetcher(config, fetcher).unwrap();
    (downloader, temp_dir)
}
