//! Catalog record handlers.

use super::{LabelTally, LabelsResponse, RecordsPage, RecordsQuery};
use crate::api::AppState;
use crate::error::ApiError;
use crate::record::Finding;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /records - Parsed records of the latest session (with filters and pagination)
#[utoipa::path(
    get,
    path = "/records",
    tag = "records",
    params(
        ("finding" = Option<String>, Query, description = "Filter by label (COVID-19, No Finding, Other)"),
        ("folder" = Option<String>, Query, description = "Filter by catalog folder"),
        ("limit" = Option<usize>, Query, description = "Maximum number of records to return"),
        ("offset" = Option<usize>, Query, description = "Number of records to skip")
    ),
    responses(
        (status = 200, description = "Page of records in catalog order", body = RecordsPage),
        (status = 400, description = "Invalid query parameters", body = ApiError)
    )
)]
pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<RecordsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0);

    let finding = match query.finding.as_deref() {
        Some(label) => match Finding::from_label(label) {
            Some(finding) => Some(finding),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiError::validation(format!(
                        "unknown finding '{label}', expected COVID-19, No Finding or Other"
                    ))),
                )
                    .into_response();
            }
        },
        None => None,
    };

    let records = state.downloader.records();
    let matching: Vec<_> = records
        .iter()
        .filter(|r| finding.is_none_or(|f| r.finding == f))
        .filter(|r| query.folder.as_ref().is_none_or(|folder| r.folder == *folder))
        .collect();

    let page = RecordsPage {
        total: matching.len(),
        offset,
        limit,
        records: matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect(),
    };
    (StatusCode::OK, Json(page)).into_response()
}

/// GET /records/labels - Records and stored images per label
#[utoipa::path(
    get,
    path = "/records/labels",
    tag = "records",
    responses(
        (status = 200, description = "Counts per label", body = LabelsResponse),
        (status = 500, description = "Dataset location could not be resolved", body = ApiError)
    )
)]
pub async fn label_counts(State(state): State<AppState>) -> Response {
    let records = state.downloader.records();
    let tallies = Finding::ALL
        .into_iter()
        .map(|finding| LabelTally {
            finding,
            count: records.iter().filter(|r| r.finding == finding).count(),
        })
        .collect();

    let downloader = state.downloader.clone();
    let images = match tokio::task::spawn_blocking(move || downloader.labeled_images()).await {
        Ok(Ok(images)) => images,
        Ok(Err(e)) => return e.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "label scan task failed");
            return crate::Error::Unknown(e.to_string()).into_response();
        }
    };

    (
        StatusCode::OK,
        Json(LabelsResponse {
            records: tallies,
            images: images.counts(),
        }),
    )
        .into_response()
}
