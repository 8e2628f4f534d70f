//! Dataset session handlers.

use super::SessionAccepted;
use crate::api::AppState;
use crate::error::Error;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /dataset/status - Current session state
#[utoipa::path(
    get,
    path = "/dataset/status",
    tag = "dataset",
    responses(
        (status = 200, description = "Running session progress or the outcome of the last one", body = crate::types::SessionStatus)
    )
)]
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.status())
}

/// POST /dataset/download - Start a download session
#[utoipa::path(
    post,
    path = "/dataset/download",
    tag = "dataset",
    responses(
        (status = 202, description = "Session started", body = SessionAccepted),
        (status = 409, description = "A session is already running", body = crate::error::ApiError)
    )
)]
pub async fn start_download(State(state): State<AppState>) -> Response {
    match state.downloader.start() {
        Ok((session, handle)) => {
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    tracing::error!(session = %session, error = %e, "dataset session task panicked");
                }
            });
            (StatusCode::ACCEPTED, Json(SessionAccepted { session })).into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "refused to start dataset session");
            e.into_response()
        }
    }
}

/// POST /dataset/cancel - Cancel the running session
#[utoipa::path(
    post,
    path = "/dataset/cancel",
    tag = "dataset",
    responses(
        (status = 202, description = "Cancellation requested", body = SessionAccepted),
        (status = 404, description = "No session is running", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(State(state): State<AppState>) -> Response {
    match state.downloader.cancel() {
        Some(session) => (StatusCode::ACCEPTED, Json(SessionAccepted { session })).into_response(),
        None => Error::NotFound("running session".to_string()).into_response(),
    }
}
