use crate::config::ClassifierConfig;
use crate::detector::ImageClassifier;
use crate::error::InferenceError;
use crate::types::LabelScore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Hosted image-classification model reached over the Hugging Face
/// inference API.
#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

/// The API answers either a flat label list or, for batched models, a list
/// with one label list per input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Flat(Vec<LabelScore>),
    Nested(Vec<Vec<LabelScore>>),
}

impl HuggingFaceClient {
    pub fn new(config: &ClassifierConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }
}

/// Map a non-success answer to an error, recognising a model cold start.
fn classify_failure(status: StatusCode, body: &str) -> InferenceError {
    if status == StatusCode::SERVICE_UNAVAILABLE || body.to_lowercase().contains("loading") {
        InferenceError::Loading(body.chars().take(200).collect())
    } else {
        InferenceError::Status {
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        }
    }
}

fn parse_labels(body: &str) -> Result<Vec<LabelScore>, InferenceError> {
    match serde_json::from_str::<ClassificationResponse>(body) {
        Ok(ClassificationResponse::Flat(labels)) => Ok(labels),
        Ok(ClassificationResponse::Nested(mut batches)) => {
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(batches.swap_remove(0))
            }
        }
        Err(e) => Err(InferenceError::Malformed(format!("{}: {}", e, body))),
    }
}

#[async_trait]
impl ImageClassifier for HuggingFaceClient {
    async fn classify_image(&self, image: &[u8]) -> Result<Vec<LabelScore>, InferenceError> {
        let api_key = self.api_key.as_ref().ok_or(InferenceError::NotConfigured)?;

        tracing::debug!(model = %self.model, bytes = image.len(), "sending image to classifier");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header("Content-Type", "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        tracing::debug!("classifier response: {}", body);
        parse_labels(&body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_and_nested() {
        let flat = parse_labels(r#"[{"label":"artificial","score":0.91},{"label":"human","score":0.09}]"#)
            .unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].label, "artificial");

        let nested = parse_labels(r#"[[{"label":"real","score":0.7}]]"#).unwrap();
        assert_eq!(nested, vec![LabelScore { label: "real".into(), score: 0.7 }]);
    }

    #[test]
    fn test_parse_rejects_error_object() {
        let err = parse_labels(r#"{"error":"bad input"}"#).unwrap_err();
        assert!(matches!(err, InferenceError::Malformed(_)));
    }

    #[test]
    fn test_cold_start_is_loading() {
        let err = classify_failure(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error":"Model umm-maybe/AI-image-detector is currently loading","estimated_time":20.0}"#,
        );
        assert!(err.is_loading());

        let err = classify_failure(StatusCode::BAD_REQUEST, "model is Loading, try later");
        assert!(err.is_loading());

        let err = classify_failure(StatusCode::UNAUTHORIZED, "invalid token");
        assert_eq!(
            err,
            InferenceError::Status { status: 401, body: "invalid token".into() }
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let config = crate::config::AppConfig::default().classifier;
        let client = HuggingFaceClient::new(&config, Duration::from_secs(1));
        let err = client.classify_image(b"jpeg").await.unwrap_err();
        assert_eq!(err, InferenceError::NotConfigured);
    }
}
