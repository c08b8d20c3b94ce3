// src/handlers/detect.rs
//! Image-only detection forwarded to the self-hosted model API

use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, Extension},
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::handlers::read_upload;
use crate::models::analysis::DetectResponse;
use crate::validation::{preprocess_image, validate_upload};
use crate::AppState;

pub fn detect_routes(body_limit: usize) -> Router {
    Router::new()
        .route("/detect", post(detect))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// POST /detect - validate, normalise to JPEG and forward to the model API.
/// Upstream failures are reported as 502 with the reason.
pub async fn detect(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let (filename, bytes) = read_upload(multipart).await?;
    let media = validate_upload(&filename, bytes, &state.config.detect_policy).map_err(|e| {
        tracing::warn!(filename = %filename, "rejected image: {}", e);
        ApiError::from(e)
    })?;

    let raw = media.bytes.clone();
    let processed = tokio::task::spawn_blocking(move || preprocess_image(&raw))
        .await
        .map_err(|e| ApiError::internal(format!("Image preprocessing failed: {}", e)))??;

    let upload_name = if filename.is_empty() { "image.jpg" } else { filename.as_str() };
    let result = state.model_api.detect(processed, upload_name).await.map_err(|e| {
        tracing::warn!("model API call failed: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(DetectResponse {
        success: true,
        filename,
        result,
    }))
}
