//! One image download: deadline, retry and cancellation around a single fetch.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::{Error, TransportError};
use crate::network::{FileFetcher, Request};
use crate::retry::fetch_with_retry;

/// Image download planned for one record
#[derive(Clone, Debug)]
pub(crate) struct FetchUnit {
    /// Position of the record in the parsed list
    pub(crate) index: usize,
    pub(crate) patient_id: String,
    pub(crate) filename: String,
    pub(crate) request: Request,
    pub(crate) destination: PathBuf,
}

/// How a fetch unit ended
#[derive(Debug)]
pub(crate) enum UnitOutcome {
    Stored(PathBuf),
    Failed(Error),
    Cancelled,
}

/// Per-unit policy shared by every unit of a session
#[derive(Clone, Debug)]
pub(crate) struct UnitPolicy {
    pub(crate) retry: RetryConfig,
    pub(crate) deadline: Option<Duration>,
}

impl FetchUnit {
    /// Run the unit to completion
    ///
    /// Never returns an error: failures are folded into the outcome so one unit
    /// can never abort its siblings.
    pub(crate) async fn run(
        &self,
        fetcher: &dyn FileFetcher,
        policy: &UnitPolicy,
        token: &CancellationToken,
    ) -> UnitOutcome {
        let attempts = fetch_with_retry(&policy.retry, || {
            fetcher.fetch_to_file(&self.request, &self.destination)
        });

        let bounded = async {
            match policy.deadline {
                Some(after) => match tokio::time::timeout(after, attempts).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Transport(TransportError::Timeout {
                        path: self.request.path.clone(),
                        after,
                    })),
                },
                None => attempts.await,
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => UnitOutcome::Cancelled,
            result = bounded => match result {
                Ok(path) => UnitOutcome::Stored(path),
                Err(e) => UnitOutcome::Failed(e),
            },
        }
    }
}
