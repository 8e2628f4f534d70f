//! Session pipeline: catalog fetch, parse, image-row planning and the bounded
//! image phase.
//!
//! The catalog is always fetched and parsed before any image unit starts. Image
//! units run through one `buffer_unordered` stream capped at
//! `max_concurrent_downloads`; the session ends when that stream is exhausted.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::network::Request;
use crate::record::{Catalog, Record, read_catalog};
use crate::types::{Event, ImageFailure, SessionId, SessionReport, SessionStatus, SessionSummary};

use super::fetch_unit::{FetchUnit, UnitOutcome, UnitPolicy};
use super::{DatasetDownloader, SessionGuard};

/// Image rows split by what the session will do with them
struct Plan {
    units: Vec<FetchUnit>,
    image_rows: usize,
    skipped: usize,
    duplicates: usize,
}

impl DatasetDownloader {
    /// Run a claimed session to its single terminal event
    pub(crate) async fn run_session(&self, guard: SessionGuard) -> Result<SessionReport> {
        let session = guard.id;
        let started_at = Utc::now();

        tracing::info!(session = %session, "dataset session started");
        self.emit_event(Event::SessionStarted { session });

        let result = self.run_pipeline(session, &guard.token).await;
        let state = &self.session_state;

        match result {
            Ok((records, summary, failures)) => {
                let report = SessionReport {
                    session,
                    records,
                    summary,
                    failures,
                    started_at,
                    finished_at: Utc::now(),
                };
                self.replace_records(report.records.clone());
                state.set_outcome(SessionStatus::Complete {
                    session,
                    summary: report.summary.clone(),
                });
                drop(guard);

                tracing::info!(
                    session = %session,
                    records = report.summary.records,
                    succeeded = report.summary.succeeded,
                    failed = report.summary.failed,
                    skipped = report.summary.skipped,
                    duplicates = report.summary.duplicates,
                    "dataset session complete"
                );
                self.emit_event(Event::SessionComplete {
                    session,
                    summary: report.summary.clone(),
                });
                Ok(report)
            }
            Err(Error::Cancelled) => {
                state.set_outcome(SessionStatus::Cancelled { session });
                drop(guard);

                tracing::info!(session = %session, "dataset session cancelled");
                self.emit_event(Event::SessionCancelled { session });
                Err(Error::Cancelled)
            }
            Err(e) => {
                state.set_outcome(SessionStatus::Failed {
                    session,
                    error: e.to_string(),
                });
                drop(guard);

                tracing::error!(session = %session, error = %e, "dataset session failed");
                self.emit_event(Event::SessionFailed {
                    session,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        session: SessionId,
        token: &CancellationToken,
    ) -> Result<(Vec<Record>, SessionSummary, Vec<ImageFailure>)> {
        let catalog = self.acquire_catalog(session, token).await?;
        let Catalog {
            records,
            total_rows,
            dropped_rows,
        } = catalog;

        let image_rows = records
            .iter()
            .filter(|r| r.folder == self.config.source.image_folder)
            .count();
        tracing::info!(
            session = %session,
            total_rows,
            records = records.len(),
            dropped_rows,
            image_rows,
            "catalog parsed"
        );
        self.emit_event(Event::CatalogParsed {
            session,
            total_rows,
            records: records.len(),
            dropped_rows,
            image_rows,
        });

        let plan = self.plan_units(session, &records)?;

        let mut summary = SessionSummary {
            total_rows,
            records: records.len(),
            dropped_rows,
            image_rows: plan.image_rows,
            scheduled: plan.units.len(),
            skipped: plan.skipped,
            duplicates: plan.duplicates,
            ..Default::default()
        };

        let mut failures = self.run_units(session, plan.units, token, &mut summary).await?;
        failures.sort_by_key(|(index, _)| *index);

        Ok((
            records,
            summary,
            failures.into_iter().map(|(_, failure)| failure).collect(),
        ))
    }

    /// Fetch the catalog into the documents directory and parse it
    async fn acquire_catalog(&self, session: SessionId, token: &CancellationToken) -> Result<Catalog> {
        let catalog_path = self.store.catalog_path()?;
        let request = Request::get(self.config.source.catalog_name.clone());

        let stored = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            result = self.fetcher.fetch_to_file(&request, &catalog_path) => result?,
        };
        tracing::debug!(session = %session, path = %stored.display(), "catalog downloaded");
        self.emit_event(Event::CatalogDownloaded {
            session,
            path: stored.clone(),
        });

        let parse = tokio::task::spawn_blocking(move || read_catalog(&stored));
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            joined = parse => joined
                .map_err(|e| Error::Unknown(format!("catalog parse task failed: {e}")))?,
        }
    }

    /// Turn image rows into fetch units, skipping unusable and duplicate destinations
    fn plan_units(&self, session: SessionId, records: &[Record]) -> Result<Plan> {
        let dataset_dir = self.store.dataset_dir()?;
        let image_folder = &self.config.source.image_folder;
        let deduplicate = self.config.download.deduplicate_destinations;

        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut plan = Plan {
            units: Vec::new(),
            image_rows: 0,
            skipped: 0,
            duplicates: 0,
        };

        for (index, record) in records.iter().enumerate() {
            if record.folder != *image_folder {
                continue;
            }
            plan.image_rows += 1;

            let Some(destination) = record.local_image_path(&dataset_dir) else {
                plan.skipped += 1;
                tracing::warn!(
                    session = %session,
                    patient_id = %record.patient_id,
                    filename = %record.filename,
                    "image row has no usable filename, skipping"
                );
                self.emit_event(Event::ImageSkipped {
                    session,
                    patient_id: record.patient_id.clone(),
                    filename: record.filename.clone(),
                    reason: "filename cannot name a file inside the label folder".to_string(),
                });
                continue;
            };

            if deduplicate && !claimed.insert(destination.clone()) {
                plan.duplicates += 1;
                tracing::debug!(
                    session = %session,
                    patient_id = %record.patient_id,
                    path = %destination.display(),
                    "destination already claimed in this session"
                );
                self.emit_event(Event::DuplicateImage {
                    session,
                    patient_id: record.patient_id.clone(),
                    filename: record.filename.clone(),
                    path: destination,
                });
                continue;
            }

            plan.units.push(FetchUnit {
                index,
                patient_id: record.patient_id.clone(),
                filename: record.filename.clone(),
                request: Request::get(record.remote_image_path()),
                destination,
            });
        }

        self.session_state
            .total
            .store(plan.units.len(), Ordering::SeqCst);
        Ok(plan)
    }

    /// Drive every unit through the bounded stream and tally outcomes
    ///
    /// Returns the failures keyed by record index.
    async fn run_units(
        &self,
        session: SessionId,
        units: Vec<FetchUnit>,
        token: &CancellationToken,
        summary: &mut SessionSummary,
    ) -> Result<Vec<(usize, ImageFailure)>> {
        let concurrency = self.config.download.max_concurrent_downloads.max(1);
        let policy = UnitPolicy {
            retry: self.config.retry.clone(),
            deadline: self.config.download.unit_timeout,
        };
        let fetcher = &*self.fetcher;
        let policy = &policy;

        let mut outcomes = futures::stream::iter(units)
            .map(|unit| async move {
                let outcome = unit.run(fetcher, policy, token).await;
                (unit, outcome)
            })
            .buffer_unordered(concurrency);

        let mut failures = Vec::new();
        let mut cancelled = false;

        while let Some((unit, outcome)) = outcomes.next().await {
            self.session_state.completed.fetch_add(1, Ordering::SeqCst);
            match outcome {
                UnitOutcome::Stored(path) => {
                    summary.succeeded += 1;
                    tracing::debug!(
                        session = %session,
                        patient_id = %unit.patient_id,
                        path = %path.display(),
                        "image stored"
                    );
                    self.emit_event(Event::ImageDownloaded {
                        session,
                        patient_id: unit.patient_id,
                        filename: unit.filename,
                        path,
                    });
                }
                UnitOutcome::Failed(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        session = %session,
                        patient_id = %unit.patient_id,
                        filename = %unit.filename,
                        error = %e,
                        "image download failed"
                    );
                    self.emit_event(Event::ImageFailed {
                        session,
                        patient_id: unit.patient_id.clone(),
                        filename: unit.filename.clone(),
                        error: e.to_string(),
                    });
                    failures.push((
                        unit.index,
                        ImageFailure {
                            patient_id: unit.patient_id,
                            filename: unit.filename,
                            error: e.to_string(),
                        },
                    ));
                }
                UnitOutcome::Cancelled => cancelled = true,
            }
        }

        if cancelled {
            return Err(Error::Cancelled);
        }
        Ok(failures)
    }
}
