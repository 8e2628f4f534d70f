//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the chestxray-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the chestxray-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "chestxray-dl REST API",
        version = "0.1.0",
        description = "REST API for downloading the COVID-19 chest X-ray dataset, following session progress and browsing the parsed catalog",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local development server")
    ),
    paths(
        // Dataset sessions
        crate::api::routes::get_status,
        crate::api::routes::start_download,
        crate::api::routes::cancel_download,

        // Records
        crate::api::routes::list_records,
        crate::api::routes::label_counts,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Session types from types.rs
        crate::types::SessionId,
        crate::types::Event,
        crate::types::SessionSummary,
        crate::types::SessionStatus,
        crate::types::ImageFailure,

        // Catalog types
        crate::record::Record,
        crate::record::Finding,
        crate::record::Sex,
        crate::record::YesNo,
        crate::record::View,
        crate::record::Modality,
        crate::training::LabelCount,

        // API request/response types from routes
        crate::api::routes::RecordsPage,
        crate::api::routes::SessionAccepted,
        crate::api::routes::LabelsResponse,
        crate::api::routes::LabelTally,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "dataset", description = "Dataset sessions - Start, cancel and monitor catalog and image downloads"),
        (name = "records", description = "Records - Browse the parsed catalog of the latest session"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
