//! HTTP interface.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bitframe_codec::Variant;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::error::TranscodeError;
use crate::range::{parse_range_header, RangeOutcome};
use crate::request::TranscodeRequest;
use crate::state::AppState;

/// File name offered to clients saving the blob.
const ATTACHMENT: &str = "attachment; filename=\"image.bin\"";

/// Creates the web router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/frames", get(frames))
        .route("/frames/mono", get(frames_mono))
        .route("/frames/color", get(frames_color))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /frames?variant=mono|color
async fn frames(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, TranscodeError> {
    let variant = match params.get("variant") {
        Some(name) => name
            .parse::<Variant>()
            .map_err(|e| TranscodeError::InvalidParameter {
                name: "variant",
                reason: e.to_string(),
            })?,
        None => Variant::default(),
    };
    serve(&state, variant, &params, &headers).await
}

/// GET /frames/mono - thresholded 1-bit bitmap
async fn frames_mono(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, TranscodeError> {
    serve(&state, Variant::Mono, &params, &headers).await
}

/// GET /frames/color - RGB565
async fn frames_color(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, TranscodeError> {
    serve(&state, Variant::Color, &params, &headers).await
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

async fn serve(
    state: &AppState,
    variant: Variant,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<Response, TranscodeError> {
    let config = state.config();
    let request = TranscodeRequest::from_params(variant, params, &config.defaults, &config.limits)?;
    let location = state.ensure(&request).await?;

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header);
    let outcome = RangeOutcome::resolve(range, location.len);

    let body = match outcome {
        RangeOutcome::Full { .. } => state.read_blob(&location).await?.into_bytes(),
        RangeOutcome::Partial { start, .. } => {
            state
                .read_range(&location, start, outcome.content_length())
                .await?
        }
        RangeOutcome::Unsatisfiable { total } => {
            debug!("Range {:?} not satisfiable for {} byte blob", range, total);
            Vec::new()
        }
    };

    Ok(blob_response(outcome, body))
}

fn blob_response(outcome: RangeOutcome, body: Vec<u8>) -> Response {
    let mut builder = Response::builder()
        .status(outcome.status())
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, ATTACHMENT)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, outcome.content_length());
    if let Some(content_range) = outcome.content_range() {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    match builder.body(Body::from(body)) {
        Ok(response) => response,
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to build response: {}", e),
        )
            .into_response(),
    }
}

impl IntoResponse for TranscodeError {
    fn into_response(self) -> Response {
        let status = match &self {
            TranscodeError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            TranscodeError::Fetch(_) => StatusCode::BAD_GATEWAY,
            TranscodeError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TranscodeError::CacheWrite(_)
            | TranscodeError::CacheLookup(_)
            | TranscodeError::ArtifactMissing { .. }
            | TranscodeError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            TranscodeError::InvalidParameter { .. } => debug!("Rejected request: {}", self),
            TranscodeError::Fetch(_) | TranscodeError::Decode(_) => warn!("{}", self),
            _ => error!("{}", self),
        }

        (status, self.to_string()).into_response()
    }
}
