// types.rs - Common data structures shared by the detector, explainer and pipeline
use serde::{Deserialize, Serialize};
use std::fmt;

/// Neutral fake-probability used whenever a score cannot be obtained.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Three-way verdict derived from a fake-probability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Fake,
    Real,
    Suspicious,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Fake => "FAKE",
            Verdict::Real => "REAL",
            Verdict::Suspicious => "SUSPICIOUS",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score cut-offs. Both comparisons are strict, so the boundary values
/// themselves are SUSPICIOUS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerdictThresholds {
    pub fake_above: f64,
    pub real_below: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            fake_above: 0.65,
            real_below: 0.35,
        }
    }
}

impl VerdictThresholds {
    pub fn verdict_for(&self, score: f64) -> Verdict {
        if score > self.fake_above {
            Verdict::Fake
        } else if score < self.real_below {
            Verdict::Real
        } else {
            Verdict::Suspicious
        }
    }
}

/// What kind of media an upload is, decided from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "mp4" => MediaKind::Video,
            _ => MediaKind::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{label, score}` entry as returned by an image-classification model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Outcome of classifying a single image (or a single video frame).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub score: f64,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            score: NEUTRAL_SCORE,
            verdict: Verdict::Suspicious,
            error: Some(reason.into()),
        }
    }
}

/// Final payload of an analysis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub verdict: Verdict,
    pub score: f64,
    pub explanation: String,
    pub frames_analyzed: usize,
}

/// Round to four decimal places, the precision scores are reported with.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
