// detector.rs - Fake-probability scoring of single images
use crate::error::InferenceError;
use crate::types::{round4, DetectionResult, LabelScore, VerdictThresholds, NEUTRAL_SCORE};
use async_trait::async_trait;
use backoff::backoff::Constant;
use backoff::future::retry;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A remote image-classification model.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Classify one encoded image, returning labels in the model's order.
    async fn classify_image(&self, image: &[u8]) -> Result<Vec<LabelScore>, InferenceError>;

    fn name(&self) -> &str {
        "image-classifier"
    }
}

const FAKE_LABELS: [&str; 3] = ["artificial", "fake", "deepfake"];
const REAL_LABELS: [&str; 2] = ["human", "real"];

/// Turn a label list into a fake-probability.
///
/// The first label (in response order) naming either family decides: a
/// fake-family label gives its score directly, a real-family label gives
/// `1 - score`. Anything else yields the neutral 0.5.
pub fn fake_probability(labels: &[LabelScore]) -> f64 {
    for item in labels {
        let label = item.label.to_lowercase();
        if FAKE_LABELS.iter().any(|l| label.contains(l)) {
            return round4(item.score.clamp(0.0, 1.0));
        }
        if REAL_LABELS.iter().any(|l| label.contains(l)) {
            return round4(1.0 - item.score.clamp(0.0, 1.0));
        }
    }
    NEUTRAL_SCORE
}

#[derive(Clone)]
pub struct Detector {
    classifier: Arc<dyn ImageClassifier>,
    thresholds: VerdictThresholds,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Detector {
    pub fn new(
        classifier: Arc<dyn ImageClassifier>,
        thresholds: VerdictThresholds,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            classifier,
            thresholds,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// Score the image stored at `path`. Never fails: every problem becomes
    /// a neutral result carrying the reason.
    pub async fn classify_file(&self, path: &Path) -> DetectionResult {
        match tokio::fs::read(path).await {
            Ok(bytes) if !bytes.is_empty() => self.classify_bytes(&bytes).await,
            Ok(_) => {
                tracing::warn!(path = %path.display(), "image file is empty");
                DetectionResult::neutral("File is empty")
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "image file not readable");
                DetectionResult::neutral("File not found")
            }
        }
    }

    pub async fn classify_bytes(&self, image: &[u8]) -> DetectionResult {
        match self.request_labels(image).await {
            Ok(labels) => {
                let score = fake_probability(&labels);
                let verdict = self.thresholds.verdict_for(score);
                tracing::debug!(score, %verdict, "image classified");
                DetectionResult {
                    score,
                    verdict,
                    error: None,
                }
            }
            Err(InferenceError::Loading(_)) => {
                tracing::warn!(
                    "Model did not load after {} attempts",
                    self.max_attempts
                );
                DetectionResult::neutral("Model loading timeout")
            }
            Err(InferenceError::NotConfigured) => {
                tracing::warn!("classifier not configured, returning neutral result");
                DetectionResult::neutral("HF_API_KEY not set")
            }
            Err(e) => {
                tracing::warn!("Detection failed: {}", e);
                DetectionResult::neutral("Detection failed")
            }
        }
    }

    /// Call the classifier, waiting `retry_delay` and trying again while it
    /// reports a cold start, up to `max_attempts` calls in total.
    async fn request_labels(&self, image: &[u8]) -> Result<Vec<LabelScore>, InferenceError> {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let max_attempts = self.max_attempts;

        let operation = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!("classifier attempt {}/{}", attempt, max_attempts);

            match self.classifier.classify_image(image).await {
                Ok(labels) => Ok(labels),
                Err(e) if e.is_loading() && attempt < max_attempts => {
                    tracing::info!(
                        "{} is loading, waiting {:?} before retrying",
                        self.classifier.name(),
                        self.retry_delay
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        };

        retry(Constant::new(self.retry_delay), operation).await
    }
}
