// lib.rs - Deepfake analysis service: modules, shared state and router
pub mod config;
pub mod detector;
pub mod error;
pub mod explainer;
pub mod frames;
pub mod gemini_client;
pub mod handlers;
pub mod huggingface_client;
pub mod middleware;
pub mod model_api_client;
pub mod models;
pub mod pipeline;
pub mod temp_files;
pub mod types;
pub mod utils;
pub mod validation;

use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use config::AppConfig;
use detector::{Detector, ImageClassifier};
use explainer::{Explainer, TextGenerator};
use frames::{FfmpegFrameSource, FrameSampler, FrameSource};
use gemini_client::GeminiClient;
use huggingface_client::HuggingFaceClient;
use model_api_client::ModelApiClient;
use pipeline::AnalysisPipeline;
use temp_files::TempWorkspace;

/// Extra room on top of the upload ceilings so oversize files still reach
/// the validator and get a readable 400.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

// AppState holds the configuration plus every collaborator built from it
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: AnalysisPipeline,
    pub model_api: ModelApiClient,
}

impl AppState {
    /// Wire the production collaborators: Hugging Face classifier, Gemini
    /// explainer and ffmpeg frame decoding.
    pub fn from_config(config: AppConfig) -> Self {
        let classifier = Arc::new(HuggingFaceClient::new(&config.classifier, config.http_timeout));
        let generator = Arc::new(GeminiClient::new(&config.explainer, config.http_timeout));
        Self::with_collaborators(config, classifier, generator, Arc::new(FfmpegFrameSource))
    }

    pub fn with_collaborators(
        config: AppConfig,
        classifier: Arc<dyn ImageClassifier>,
        generator: Arc<dyn TextGenerator>,
        frames: Arc<dyn FrameSource>,
    ) -> Self {
        let detector = Detector::new(
            classifier,
            config.thresholds,
            config.classifier.max_attempts,
            config.classifier.retry_delay,
        );
        let explainer = Explainer::new(generator, config.explainer.max_output_tokens);
        let pipeline = AnalysisPipeline::new(
            TempWorkspace::new(config.temp_dir.clone()),
            FrameSampler::new(frames, config.max_frames),
            detector,
            explainer,
            config.analyze_policy.clone(),
            config.thresholds,
        );
        let model_api = ModelApiClient::new(config.model_api_url.clone(), config.http_timeout);

        Self {
            config,
            pipeline,
            model_api,
        }
    }
}

/// Build the HTTP application with all routes and shared state.
pub fn app(state: Arc<AppState>) -> Router {
    let analyze_limit = state.config.analyze_policy.max_bytes + MULTIPART_OVERHEAD;
    let detect_limit = state.config.detect_policy.max_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .merge(handlers::analyze::analysis_routes(analyze_limit))
        .merge(handlers::detect::detect_routes(detect_limit))
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
