// src/handlers/analyze.rs
//! Combined image/video analysis endpoints

use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, Extension},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::handlers::read_upload;
use crate::models::analysis::{configured, PingResponse, ServiceStatus, StatusResponse};
use crate::types::AggregateResult;
use crate::AppState;

pub fn analysis_routes(body_limit: usize) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/api/status", get(api_status))
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// GET /ping - liveness check
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "alive".to_string(),
    })
}

/// POST /analyze - score an image or mp4 upload (multipart field `file`)
pub async fn analyze(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AggregateResult>, ApiError> {
    let (filename, bytes) = read_upload(multipart).await?;
    tracing::info!(filename = %filename, size = bytes.len(), "received file for analysis");

    let media = state.pipeline.validate(&filename, bytes).map_err(|e| {
        tracing::warn!(filename = %filename, "rejected upload: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(state.pipeline.run(media).await))
}

/// GET /api/status - which collaborators are configured
pub async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<StatusResponse> {
    let config = &state.config;
    Json(StatusResponse {
        status: "operational".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: ServiceStatus {
            classifier: configured(config.classifier.api_key.is_some()),
            explainer: configured(config.explainer.api_key.is_some()),
            model_api: configured(state.model_api.is_configured()),
        },
        max_frames: config.max_frames,
        analyze_max_bytes: config.analyze_policy.max_bytes,
        detect_max_bytes: config.detect_policy.max_bytes,
    })
}
