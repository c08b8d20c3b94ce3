// error.rs - Error taxonomy for the service and its HTTP mapping
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Upload rejected before any processing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0}")]
    InvalidType(String),
    #[error("{0}")]
    TooLarge(String),
    #[error("File is not a valid image.")]
    Undecodable,
    #[error("No file uploaded")]
    MissingFile,
}

/// Failure talking to an image-classification model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("model is still loading: {0}")]
    Loading(String),
    #[error("classifier API key is not configured")]
    NotConfigured,
    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("classifier response could not be parsed: {0}")]
    Malformed(String),
}

impl InferenceError {
    pub fn is_loading(&self) -> bool {
        matches!(self, InferenceError::Loading(_))
    }
}

/// Failure talking to the text-generation model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExplainError {
    #[error("explainer API key is not configured")]
    NotConfigured,
    #[error("explainer request failed: {0}")]
    Transport(String),
    #[error("explainer API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("explainer returned no text")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum TempFileError {
    #[error("temp file I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the forwarding model API behind `/detect`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelApiError {
    #[error("MODEL_API_URL is not configured")]
    NotConfigured,
    #[error("Model API request timed out. Please try again.")]
    Timeout,
    #[error("Model API returned error: {0}")]
    Status(u16),
    #[error("Failed to connect to model API: {0}")]
    Transport(String),
}

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn bad_gateway(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<ModelApiError> for ApiError {
    fn from(err: ModelApiError) -> Self {
        ApiError::bad_gateway(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
