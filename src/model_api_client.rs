use crate::error::ModelApiError;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Client for a self-hosted detection model that takes a multipart upload
/// and answers with its own JSON payload, forwarded untouched.
#[derive(Debug, Clone)]
pub struct ModelApiClient {
    client: Client,
    url: Option<String>,
}

impl ModelApiClient {
    pub fn new(url: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { client, url }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    pub async fn detect(&self, image: Vec<u8>, filename: &str) -> Result<Value, ModelApiError> {
        let url = self.url.as_ref().ok_or(ModelApiError::NotConfigured)?;

        let part = Part::bytes(image)
            .file_name(filename.to_string())
            .mime_str("image/jpeg")
            .map_err(|e| ModelApiError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("model API returned {}", status);
            return Err(ModelApiError::Status(status.as_u16()));
        }

        response.json::<Value>().await.map_err(map_send_error)
    }
}

fn map_send_error(e: reqwest::Error) -> ModelApiError {
    if e.is_timeout() {
        ModelApiError::Timeout
    } else {
        ModelApiError::Transport(e.without_url().to_string())
    }
}
