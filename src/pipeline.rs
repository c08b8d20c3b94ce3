// pipeline.rs - One analysis request: persist, sample, classify, aggregate, explain, clean up
use crate::config::UploadPolicy;
use crate::detector::Detector;
use crate::error::{TempFileError, ValidationError};
use crate::explainer::Explainer;
use crate::frames::FrameSampler;
use crate::temp_files::{TempRole, TempScope, TempWorkspace};
use crate::types::{round4, AggregateResult, MediaKind, Verdict, VerdictThresholds, NEUTRAL_SCORE};
use crate::validation::{validate_upload, UploadedMedia};
use axum::body::Bytes;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;

/// Explanation sent whenever the pipeline itself fails.
pub const NEUTRAL_EXPLANATION: &str = "Analysis complete. Manual review recommended.";

/// Stages of a request, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Persisting,
    Sampling,
    Classifying,
    Aggregating,
    Explaining,
    Responding,
    CleaningUp,
}

/// Arithmetic mean rounded to four decimals; `None` for no scores.
pub fn aggregate_scores(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(round4(scores.iter().sum::<f64>() / scores.len() as f64))
}

/// The response sent when analysis could not complete.
pub fn neutral_result() -> AggregateResult {
    AggregateResult {
        verdict: Verdict::Suspicious,
        score: NEUTRAL_SCORE,
        explanation: NEUTRAL_EXPLANATION.to_string(),
        frames_analyzed: 0,
    }
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    workspace: TempWorkspace,
    sampler: FrameSampler,
    detector: Detector,
    explainer: Explainer,
    policy: UploadPolicy,
    thresholds: VerdictThresholds,
}

impl AnalysisPipeline {
    pub fn new(
        workspace: TempWorkspace,
        sampler: FrameSampler,
        detector: Detector,
        explainer: Explainer,
        policy: UploadPolicy,
        thresholds: VerdictThresholds,
    ) -> Self {
        Self {
            workspace,
            sampler,
            detector,
            explainer,
            policy,
            thresholds,
        }
    }

    pub fn workspace(&self) -> &TempWorkspace {
        &self.workspace
    }

    pub fn validate(&self, filename: &str, bytes: Bytes) -> Result<UploadedMedia, ValidationError> {
        tracing::debug!(stage = ?Stage::Validating, filename, bytes = bytes.len());
        validate_upload(filename, bytes, &self.policy)
    }

    /// Analyse a validated upload. Always returns a result: failures after
    /// validation, panics included, give the neutral result. Every scratch
    /// file created on the way is removed before returning.
    pub async fn run(&self, media: UploadedMedia) -> AggregateResult {
        let mut scope = self.workspace.scope();

        let outcome = AssertUnwindSafe(self.process(&media, &mut scope))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!(filename = %media.filename, "analysis failed: {}", e);
                neutral_result()
            }
            Err(_) => {
                tracing::error!(filename = %media.filename, "analysis panicked");
                neutral_result()
            }
        };

        tracing::debug!(stage = ?Stage::CleaningUp, files = scope.len());
        scope.cleanup().await;
        result
    }

    async fn process(
        &self,
        media: &UploadedMedia,
        scope: &mut TempScope,
    ) -> Result<AggregateResult, TempFileError> {
        tracing::debug!(stage = ?Stage::Persisting, kind = %media.kind);
        let upload = scope
            .persist(&media.bytes, &media.extension, TempRole::Upload)
            .await?;

        let (score, verdict, frames_analyzed) = match media.kind {
            MediaKind::Image => {
                tracing::debug!(stage = ?Stage::Classifying, "processing image");
                let result = self.detector.classify_file(&upload).await;
                (result.score, result.verdict, 1)
            }
            MediaKind::Video => self.process_video(&upload, scope).await?,
        };
        tracing::info!(score, %verdict, frames_analyzed, kind = %media.kind, "final verdict");

        tracing::debug!(stage = ?Stage::Explaining);
        let explanation = self.explainer.explain(score, verdict, media.kind).await;

        tracing::debug!(stage = ?Stage::Responding);
        Ok(AggregateResult {
            verdict,
            score,
            explanation,
            frames_analyzed,
        })
    }

    async fn process_video(
        &self,
        upload: &Path,
        scope: &mut TempScope,
    ) -> Result<(f64, Verdict, usize), TempFileError> {
        tracing::debug!(stage = ?Stage::Sampling, max_frames = self.sampler.max_frames());
        let frames = self.sampler.sample(upload, scope).await?;

        if frames.is_empty() {
            tracing::warn!("no frames extracted, falling back to neutral verdict");
            return Ok((NEUTRAL_SCORE, Verdict::Suspicious, 0));
        }

        let mut scores = Vec::with_capacity(frames.len());
        for (i, frame) in frames.iter().enumerate() {
            tracing::debug!(stage = ?Stage::Classifying, "analyzing frame {}/{}", i + 1, frames.len());
            scores.push(self.detector.classify_file(frame).await.score);
        }

        tracing::debug!(stage = ?Stage::Aggregating, ?scores);
        let score = aggregate_scores(&scores).unwrap_or(NEUTRAL_SCORE);
        Ok((score, self.thresholds.verdict_for(score), frames.len()))
    }
}
