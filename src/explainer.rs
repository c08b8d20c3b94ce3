// explainer.rs - Plain-language explanation of a verdict
use crate::error::ExplainError;
use crate::types::{MediaKind, Verdict};
use async_trait::async_trait;
use std::sync::Arc;

/// A remote text-generation model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String, ExplainError>;
}

pub const SYSTEM_PROMPT: &str = "You are a digital forensics AI assistant specializing in deepfake \
detection. Generate clear forensic reports for non-technical users. \
Rules: plain English, authoritative but not alarmist, exactly 3 \
sentences, no bullet points, no titles, output only the paragraph. \
Never invent specific pixel details. Base analysis on score ranges only.";

/// Text used when the model cannot be reached.
pub fn fallback_explanation(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Fake => "High manipulation indicators detected. Exercise caution.",
        Verdict::Real => "No significant manipulation detected. Content appears authentic.",
        Verdict::Suspicious => "Inconclusive results. Seek additional verification.",
    }
}

pub fn build_prompt(score: f64, verdict: Verdict, kind: MediaKind) -> String {
    format!(
        "A deepfake model analyzed a {} and returned a fake probability of {:.0}%. \
         Verdict: {}. Generate a forensic explanation based on this score range only.",
        kind,
        score * 100.0,
        verdict
    )
}

#[derive(Clone)]
pub struct Explainer {
    generator: Arc<dyn TextGenerator>,
    max_output_tokens: u32,
}

impl Explainer {
    pub fn new(generator: Arc<dyn TextGenerator>, max_output_tokens: u32) -> Self {
        Self {
            generator,
            max_output_tokens,
        }
    }

    /// Never fails: any generator error yields the verdict's fallback text.
    pub async fn explain(&self, score: f64, verdict: Verdict, kind: MediaKind) -> String {
        let prompt = build_prompt(score, verdict, kind);
        tracing::debug!(score, %verdict, %kind, "requesting explanation");

        match self
            .generator
            .generate(SYSTEM_PROMPT, &prompt, self.max_output_tokens)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("explainer returned blank text, using fallback");
                fallback_explanation(verdict).to_string()
            }
            Err(ExplainError::NotConfigured) => {
                tracing::warn!("GEMINI_API_KEY not set, using fallback explanation");
                fallback_explanation(verdict).to_string()
            }
            Err(e) => {
                tracing::warn!("explainer failed, using fallback: {}", e);
                fallback_explanation(verdict).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoGenerator {
        seen: Mutex<Vec<(String, String, u32)>>,
        reply: Result<String, ExplainError>,
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(
            &self,
            system: &str,
            prompt: &str,
            max_output_tokens: u32,
        ) -> Result<String, ExplainError> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string(), max_output_tokens));
            self.reply.clone()
        }
    }

    fn generator(reply: Result<String, ExplainError>) -> Arc<EchoGenerator> {
        Arc::new(EchoGenerator {
            seen: Mutex::new(Vec::new()),
            reply,
        })
    }

    #[test]
    fn test_prompt_embeds_percentage_verdict_and_kind() {
        let prompt = build_prompt(0.914, Verdict::Fake, MediaKind::Video);
        assert!(prompt.contains("analyzed a video"));
        assert!(prompt.contains("fake probability of 91%"));
        assert!(prompt.contains("Verdict: FAKE."));
    }

    #[tokio::test]
    async fn test_generated_text_is_trimmed() {
        let generator = generator(Ok("  Three sentences here.\n".to_string()));
        let explainer = Explainer::new(generator.clone(), 200);
        let text = explainer.explain(0.2, Verdict::Real, MediaKind::Image).await;
        assert_eq!(text, "Three sentences here.");

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0].0, SYSTEM_PROMPT);
        assert_eq!(seen[0].2, 200);
    }

    #[tokio::test]
    async fn test_failure_uses_fallback_per_verdict() {
        let explainer = Explainer::new(
            generator(Err(ExplainError::Api { status: 500, body: "boom".into() })),
            200,
        );
        for verdict in [Verdict::Fake, Verdict::Real, Verdict::Suspicious] {
            let text = explainer.explain(0.5, verdict, MediaKind::Image).await;
            assert_eq!(text, fallback_explanation(verdict));
        }
    }

    #[tokio::test]
    async fn test_blank_reply_uses_fallback() {
        let explainer = Explainer::new(generator(Ok("   ".to_string())), 200);
        let text = explainer.explain(0.9, Verdict::Fake, MediaKind::Image).await;
        assert_eq!(text, "High manipulation indicators detected. Exercise caution.");
    }
}
