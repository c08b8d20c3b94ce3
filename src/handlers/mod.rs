// src/handlers/mod.rs
pub mod analyze;
pub mod detect;

use axum::body::Bytes;
use axum::extract::multipart::Multipart;

use crate::error::{ApiError, ValidationError};

/// Name of the multipart field carrying the upload.
pub const UPLOAD_FIELD: &str = "file";

/// Pull the declared filename and bytes of the `file` field out of a
/// multipart body. Other fields are ignored.
pub async fn read_upload(mut multipart: Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e.body_text())))?;
        return Ok((filename, data));
    }
    Err(ValidationError::MissingFile.into())
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::error::ExplainError;
    use crate::explainer::fallback_explanation;
    use crate::pipeline::tests::{CannedText, FixedVideo, TableClassifier};
    use crate::types::Verdict;
    use crate::{app, AppState};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "deepguard-test-boundary";

    fn state(
        dir: &Path,
        table: &[(&str, f64)],
        frames: u64,
        text: Result<String, ExplainError>,
    ) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.temp_dir = dir.to_path_buf();
        config.classifier.retry_delay = Duration::from_millis(1);
        let table = table.iter().map(|(k, v)| (k.as_bytes().to_vec(), *v)).collect();
        Arc::new(AppState::with_collaborators(
            config,
            Arc::new(TableClassifier(table)),
            Arc::new(CannedText(text)),
            Arc::new(FixedVideo(frames)),
        ))
    }

    fn upload(uri: &str, field: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    fn png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([10, 200, 10]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_ping() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let (status, body) = send(state(dir.path(), &[], 0, Ok("x".into())), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "alive"}));
    }

    #[tokio::test]
    async fn test_analyze_rejects_gif_without_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), &[], 0, Ok("x".into()));
        let (status, body) = send(state, upload("/analyze", "file", "anim.gif", b"GIF89a")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().starts_with("Invalid file type"));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_analyze_video_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(
            dir.path(),
            &[("frame-0", 0.9), ("frame-1", 0.8), ("frame-2", 0.7)],
            3,
            Ok("Three sentences.".into()),
        );
        let (status, body) = send(state, upload("/analyze", "file", "clip.mp4", b"mp4")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "FAKE");
        assert_eq!(body["score"], 0.8);
        assert_eq!(body["frames_analyzed"], 3);
        assert_eq!(body["explanation"], "Three sentences.");
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_analyze_explainer_failure_still_200() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(
            dir.path(),
            &[("jpeg", 0.1)],
            0,
            Err(ExplainError::Api { status: 403, body: "denied".into() }),
        );
        let (status, body) = send(state, upload("/analyze", "file", "me.jpg", b"jpeg")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "REAL");
        assert_eq!(body["frames_analyzed"], 1);
        assert_eq!(body["explanation"], fallback_explanation(Verdict::Real));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_analyze_degrades_when_workspace_missing() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir.path().join("gone"), &[("jpeg", 0.9)], 0, Ok("x".into()));
        let (status, body) = send(state, upload("/analyze", "file", "me.jpg", b"jpeg")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "SUSPICIOUS");
        assert_eq!(body["score"], 0.5);
        assert_eq!(body["explanation"], "Analysis complete. Manual review recommended.");
    }

    #[tokio::test]
    async fn test_analyze_without_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), &[], 0, Ok("x".into()));
        let (status, body) = send(state, upload("/analyze", "image", "a.jpg", b"x")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_detect_rejects_undecodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), &[], 0, Ok("x".into()));
        let (status, body) = send(state, upload("/detect", "file", "a.jpg", b"nope")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "File is not a valid image.");
    }

    #[tokio::test]
    async fn test_detect_rejects_video() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), &[], 0, Ok("x".into()));
        let (status, _) = send(state, upload("/detect", "file", "a.mp4", b"mp4")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detect_without_model_api_is_502() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), &[], 0, Ok("x".into()));
        let (status, body) = send(state, upload("/detect", "file", "a.png", &png())).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["detail"], "MODEL_API_URL is not configured");
    }

    #[tokio::test]
    async fn test_status_reports_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder().uri("/api/status").body(Body::empty()).unwrap();
        let (status, body) = send(state(dir.path(), &[], 0, Ok("x".into())), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["services"]["model_api"], "not_configured");
        assert_eq!(body["max_frames"], 8);
    }
}
