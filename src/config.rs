//! Configuration types for chestxray-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Public host serving the COVID-19 chest X-ray dataset
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/ieee8023/covid-chestxray-dataset/master/";

/// Remote source settings (where the catalog and images live)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SourceConfig {
    /// Base URL of the dataset host; request paths are appended to it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the catalog file on the host and in the documents directory (default: "metadata.csv")
    #[serde(default = "default_catalog_name")]
    pub catalog_name: String,

    /// Only records whose `folder` equals this value have a downloadable image (default: "images")
    #[serde(default = "default_image_folder")]
    pub image_folder: String,

    /// Whole-request timeout for a single HTTP call (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout (default: 15 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            catalog_name: default_catalog_name(),
            image_folder: default_image_folder(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Local placement settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Per-user documents directory holding the catalog copy and the dataset tree
    ///
    /// Defaults to the platform documents directory. `None` means the location could
    /// not be resolved: sessions then fail before any fetch.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: Option<PathBuf>,

    /// Name of the dataset folder inside the documents directory (default: "DataSet")
    #[serde(default = "default_dataset_dir_name")]
    pub dataset_dir_name: String,

    /// Directory for in-flight downloads
    ///
    /// Defaults to `<documents>/.partial` so finished files can be renamed into place
    /// on the same filesystem.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            dataset_dir_name: default_dataset_dir_name(),
            temp_dir: None,
        }
    }
}

/// Image download behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Maximum number of image fetch units in flight at once (default: 10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Deadline for a single image fetch unit, including retries (None = no deadline)
    #[serde(default, with = "optional_duration_serde")]
    pub unit_timeout: Option<Duration>,

    /// Download each local destination only once per session (default: true)
    ///
    /// Two catalog rows with the same finding and filename resolve to the same file.
    /// With this enabled the first row downloads it and later rows are reported as
    /// duplicates instead of racing on the same path.
    #[serde(default = "default_true")]
    pub deduplicate_destinations: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            unit_timeout: None,
            deduplicate_destinations: true,
        }
    }
}

/// Retry configuration for transient failures
///
/// Retries are disabled by default (`max_attempts = 0`): every failure is terminal
/// for its fetch unit unless a consumer opts in.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 0)
    #[serde(default)]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for DatasetDownloader
///
/// Fields are organized into logical sub-configs:
/// - [`source`](SourceConfig): remote host, catalog name, image folder, timeouts
/// - [`storage`](StorageConfig): documents directory, dataset folder, temp dir
/// - [`download`](DownloadConfig): concurrency cap, unit deadline, deduplication
/// - [`retry`](RetryConfig): optional backoff for transient failures
/// - [`api`](ApiConfig): REST server settings
///
/// The first three sub-configs are flattened for serialization, so a JSON config
/// reads `{"base_url": ..., "max_concurrent_downloads": ...}` without nesting.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Remote source settings
    #[serde(flatten)]
    pub source: SourceConfig,

    /// Local placement settings
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Image download behavior
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retry behavior for transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check settings that would otherwise fail later in a confusing way
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be greater than zero".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }

        let base = url::Url::parse(&self.source.base_url).map_err(|e| Error::Config {
            message: format!("invalid base_url '{}': {}", self.source.base_url, e),
            key: Some("base_url".to_string()),
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("base_url '{}' cannot be a base URL", self.source.base_url),
                key: Some("base_url".to_string()),
            });
        }

        if self.source.catalog_name.trim().is_empty() {
            return Err(Error::Config {
                message: "catalog_name must not be empty".to_string(),
                key: Some("catalog_name".to_string()),
            });
        }

        if self.source.image_folder.is_empty() {
            return Err(Error::Config {
                message: "image_folder must not be empty".to_string(),
                key: Some("image_folder".to_string()),
            });
        }

        if self.storage.dataset_dir_name.trim().is_empty() {
            return Err(Error::Config {
                message: "dataset_dir_name must not be empty".to_string(),
                key: Some("dataset_dir_name".to_string()),
            });
        }

        Ok(())
    }

    /// Directory used for in-flight downloads
    pub fn temp_dir(&self) -> PathBuf {
        match (&self.storage.temp_dir, &self.storage.documents_dir) {
            (Some(dir), _) => dir.clone(),
            (None, Some(documents)) => documents.join(".partial"),
            (None, None) => std::env::temp_dir(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_catalog_name() -> String {
    "metadata.csv".to_string()
}

fn default_image_folder() -> String {
    "images".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_documents_dir() -> Option<PathBuf> {
    dirs::document_dir()
}

fn default_dataset_dir_name() -> String {
    "DataSet".to_string()
}

fn default_max_concurrent() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper (milliseconds, unit deadlines are short)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
