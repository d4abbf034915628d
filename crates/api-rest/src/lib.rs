//! # API REST
//!
//! REST API for the ePI preprocessing service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status codes, CORS)
//!
//! All document processing is delegated to `epi-core`; this crate only maps requests and
//! errors onto HTTP.

#![warn(rust_2018_idioms)]

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use epi_core::{preprocess_bundle_value, PreprocessConfig, PreprocessError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST API handlers
///
/// Holds the preprocessing configuration resolved once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PreprocessConfig>,
}

/// Health check response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, preprocess),
    components(schemas(HealthRes, ErrorRes))
)]
pub struct ApiDoc;

type ApiError = (StatusCode, Json<ErrorRes>);

/// Build the REST router with OpenAPI docs and permissive CORS.
pub fn router(config: Arc<PreprocessConfig>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/preprocess", post(preprocess))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(AppState { config })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "ePI preprocessor is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/preprocess",
    request_body(content = Object, description = "ePI document Bundle", content_type = "application/json"),
    responses(
        (status = 200, description = "Preprocessed ePI Bundle", body = Object),
        (status = 400, description = "Body is not a document Bundle", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Preprocess an ePI
///
/// Receives an ePI document Bundle and returns it with every Composition's narrative
/// optimized, unused `HtmlElementLink`s removed and unannotated styling stripped, as enabled
/// by the service configuration.
///
/// # Errors
/// Returns `400 Bad Request` if:
/// - the body is not JSON,
/// - the body is not a Bundle of type `document`, or
/// - a Composition entry has the wrong shape.
///
/// Returns `500 Internal Server Error` if the processed bundle cannot be serialized.
#[axum::debug_handler]
async fn preprocess(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let value: Value = serde_json::from_str(&body).map_err(|e| {
        tracing::debug!("Rejected non-JSON body: {}", e);
        bad_request(format!("invalid JSON: {e}"))
    })?;

    match preprocess_bundle_value(value, &state.config) {
        Ok((bundle, report)) => {
            tracing::info!(
                compositions = report.compositions.len(),
                optimized = report.total_optimized(),
                validation_failures = report.total_validation_failures(),
                links_removed = report.total_links_removed(),
                bytes_saved = report.bytes_saved(),
                "ePI preprocessed"
            );
            Ok(Json(bundle))
        }
        Err(PreprocessError::Fhir(fhir::FhirError::InvalidJson(e))) => {
            tracing::error!("Serialize bundle error: {:?}", e);
            Err(internal_error())
        }
        Err(e @ (PreprocessError::Fhir(_) | PreprocessError::InvalidInput(_))) => {
            tracing::debug!("Rejected ePI: {}", e);
            Err(bad_request(e.to_string()))
        }
        Err(e) => {
            tracing::error!("Preprocess error: {:?}", e);
            Err(internal_error())
        }
    }
}

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorRes { error: message }))
}

fn internal_error() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorRes {
            error: "Internal error".into(),
        }),
    )
}
