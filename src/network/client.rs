//! HTTP client bound to one base URL

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::request::Request;
use crate::config::Config;
use crate::error::{Error, Result, StorageError, TransportError};
use crate::store::DatasetStore;
use crate::utils::extract_filename_from_response;

/// Downloads a request's body to a local file
///
/// The seam between the downloader and the network: production code uses
/// [`NetworkClient`], tests substitute an in-memory fetcher.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch `request` and place the body at `destination`, replacing any existing file
    async fn fetch_to_file(&self, request: &Request, destination: &Path) -> Result<PathBuf>;
}

/// HTTP client for one dataset host
#[derive(Clone, Debug)]
pub struct NetworkClient {
    client: reqwest::Client,
    base_url: Url,
    temp_dir: PathBuf,
    documents_dir: Option<PathBuf>,
}

impl NetworkClient {
    /// Client for `base_url` using the timeouts and directories from `config`
    pub fn new(base_url: &str, config: &Config) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::Transport(TransportError::InvalidUrl {
                path: base_url.to_string(),
                reason: e.to_string(),
            })
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.source.request_timeout)
            .connect_timeout(config.source.connect_timeout)
            .user_agent(concat!("chestxray-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            temp_dir: config.temp_dir(),
            documents_dir: config.storage.documents_dir.clone(),
        })
    }

    /// Client for the configured source
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.source.base_url, config)
    }

    /// Base URL every request path is appended to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch a non-empty 2xx body
    pub async fn fetch_body(&self, request: &Request) -> Result<Vec<u8>> {
        let (url, response) = self.send(request).await?;

        let body = response.bytes().await.map_err(|e| TransportError::Request {
            url: url.clone(),
            source: e,
        })?;
        if body.is_empty() {
            return Err(TransportError::EmptyBody { url }.into());
        }

        tracing::trace!(url = %url, body = %String::from_utf8_lossy(&body), "response body");
        Ok(body.to_vec())
    }

    /// Fetch a body and decode it as JSON
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: &Request) -> Result<T> {
        let body = self.fetch_body(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Download to `destination`, or to the documents directory under the remote file name
    ///
    /// The body is streamed to a temporary file first, so a failed transfer never
    /// touches an existing destination.
    pub async fn fetch_to_file(
        &self,
        request: &Request,
        destination: Option<&Path>,
    ) -> Result<PathBuf> {
        let (temp, remote_name) = self.download_to_temp(request).await?;

        let destination = match destination {
            Some(path) => path.to_path_buf(),
            None => self
                .documents_dir
                .as_ref()
                .ok_or_else(|| StorageError::UnresolvedLocation {
                    what: "documents directory".to_string(),
                })?
                .join(remote_name),
        };

        DatasetStore::replace_with(temp, &destination).await?;
        tracing::debug!(path = %destination.display(), "stored download");
        Ok(destination)
    }

    /// Download once and copy the body to every destination
    ///
    /// Destinations are written in order; the first failure aborts the rest. The
    /// temporary download is deleted either way.
    pub async fn fetch_to_files(
        &self,
        request: &Request,
        destinations: &[PathBuf],
    ) -> Result<Vec<PathBuf>> {
        let (temp, _) = self.download_to_temp(request).await?;

        let mut stored = Vec::with_capacity(destinations.len());
        for destination in destinations {
            DatasetStore::copy_replacing(&temp, destination).await?;
            stored.push(destination.clone());
        }

        discard_temp(temp)?;
        Ok(stored)
    }

    async fn send(&self, request: &Request) -> Result<(String, reqwest::Response)> {
        let builder = request.build(&self.client, &self.base_url)?;
        let url = request.url(&self.base_url)?.to_string();

        tracing::debug!(method = %request.method, url = %url, "sending request");

        let response = builder.send().await.map_err(|e| TransportError::Request {
            url: url.clone(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            }
            .into());
        }
        Ok((url, response))
    }

    async fn download_to_temp(&self, request: &Request) -> Result<(TempPath, String)> {
        let (url, mut response) = self.send(request).await?;
        let remote_name = extract_filename_from_response(&response, response.url().as_str());

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| StorageError::CreateDir {
                path: self.temp_dir.clone(),
                reason: e.to_string(),
            })?;

        let write_error = |path: &Path, e: std::io::Error| StorageError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let (file, temp) = tempfile::Builder::new()
            .prefix(".chestxray-")
            .suffix(".part")
            .tempfile_in(&self.temp_dir)
            .map_err(|e| write_error(&self.temp_dir, e))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| TransportError::Request {
            url: url.clone(),
            source: e,
        })? {
            file.write_all(&chunk)
                .await
                .map_err(|e| write_error(&temp, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| write_error(&temp, e))?;
        drop(file);

        tracing::trace!(url = %url, bytes = written, path = %temp.display(), "downloaded to temporary file");
        Ok((temp, remote_name))
    }
}

/// Delete a temporary download, reporting the file's own path on failure
fn discard_temp(temp: TempPath) -> Result<()> {
    let path = temp.to_path_buf();
    temp.close().map_err(|e| {
        Error::Storage(StorageError::Remove {
            path,
            reason: e.to_string(),
        })
    })
}

#[async_trait]
impl FileFetcher for NetworkClient {
    async fn fetch_to_file(&self, request: &Request, destination: &Path) -> Result<PathBuf> {
        NetworkClient::fetch_to_file(self, request, Some(destination)).await
    }
}
