// config.rs - Process configuration, loaded once at startup and passed down explicitly
use crate::types::VerdictThresholds;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const MIB: usize = 1024 * 1024;

/// Rules an upload must satisfy before any work is done on it.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub allowed_extensions: Vec<String>,
    pub max_bytes: usize,
    /// Try to decode the bytes as an image and reject what fails.
    pub sniff_content: bool,
}

impl UploadPolicy {
    /// Policy of the combined image/video analysis endpoint.
    pub fn analyze(max_bytes: usize) -> Self {
        Self {
            allowed_extensions: ["jpg", "jpeg", "png", "webp", "mp4"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_bytes,
            sniff_content: false,
        }
    }

    /// Policy of the image-only detection endpoint.
    pub fn detect(max_bytes: usize) -> Self {
        Self {
            allowed_extensions: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_bytes,
            sniff_content: true,
        }
    }

    /// The byte ceiling in MiB as shown to users: whole numbers stay whole,
    /// anything else keeps up to two decimals.
    pub fn max_megabytes_label(&self) -> String {
        if self.max_bytes % MIB == 0 {
            return (self.max_bytes / MIB).to_string();
        }
        let label = format!("{:.2}", self.max_bytes as f64 / MIB as f64);
        label.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ExplainerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub temp_dir: PathBuf,
    pub http_timeout: Duration,
    pub max_frames: usize,
    pub thresholds: VerdictThresholds,
    pub analyze_policy: UploadPolicy,
    pub detect_policy: UploadPolicy,
    pub classifier: ClassifierConfig,
    pub explainer: ExplainerConfig,
    pub model_api_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            temp_dir: std::env::temp_dir().join("deepguard"),
            http_timeout: Duration::from_secs(60),
            max_frames: 8,
            thresholds: VerdictThresholds::default(),
            analyze_policy: UploadPolicy::analyze(20 * MIB),
            detect_policy: UploadPolicy::detect(10 * MIB),
            classifier: ClassifierConfig {
                api_key: None,
                base_url: "https://api-inference.huggingface.co/models".to_string(),
                model: "umm-maybe/AI-image-detector".to_string(),
                max_attempts: 3,
                retry_delay: Duration::from_secs(20),
            },
            explainer: ExplainerConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.5-flash".to_string(),
                max_output_tokens: 200,
            },
            model_api_url: None,
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment. Call after
    /// `dotenvy::dotenv()` so values from a `.env` file are visible.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let analyze_max = parse_or(&get, "ANALYZE_MAX_BYTES", defaults.analyze_policy.max_bytes);
        let detect_max = parse_or(&get, "DETECT_MAX_BYTES", defaults.detect_policy.max_bytes);

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            temp_dir: get("TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.temp_dir),
            http_timeout: Duration::from_secs(parse_or(
                &get,
                "HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )),
            max_frames: parse_or(&get, "MAX_FRAMES", defaults.max_frames),
            thresholds: defaults.thresholds,
            analyze_policy: UploadPolicy::analyze(analyze_max),
            detect_policy: UploadPolicy::detect(detect_max),
            classifier: ClassifierConfig {
                api_key: get("HF_API_KEY"),
                base_url: get("HF_API_BASE_URL").unwrap_or(defaults.classifier.base_url),
                model: get("HF_MODEL").unwrap_or(defaults.classifier.model),
                max_attempts: parse_or(
                    &get,
                    "CLASSIFIER_MAX_ATTEMPTS",
                    defaults.classifier.max_attempts,
                )
                .max(1),
                retry_delay: Duration::from_secs(parse_or(
                    &get,
                    "CLASSIFIER_RETRY_DELAY_SECS",
                    defaults.classifier.retry_delay.as_secs(),
                )),
            },
            explainer: ExplainerConfig {
                api_key: get("GEMINI_API_KEY"),
                base_url: get("GEMINI_API_BASE_URL").unwrap_or(defaults.explainer.base_url),
                model: get("GEMINI_MODEL").unwrap_or(defaults.explainer.model),
                max_output_tokens: parse_or(
                    &get,
                    "EXPLAINER_MAX_OUTPUT_TOKENS",
                    defaults.explainer.max_output_tokens,
                ),
            },
            model_api_url: get("MODEL_API_URL"),
        }
    }

    /// Emit a start-up summary of which collaborators are configured.
    pub fn log_summary(&self) {
        tracing::info!(
            "Configuration - Classifier: {}, Explainer: {}, Model API: {}",
            if self.classifier.api_key.is_some() { "✅" } else { "❌" },
            if self.explainer.api_key.is_some() { "✅" } else { "❌" },
            if self.model_api_url.is_some() { "✅" } else { "❌" },
        );
        if self.classifier.api_key.is_none() {
            tracing::warn!("HF_API_KEY not found. Every analysis will return a neutral verdict.");
        }
        if self.explainer.api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not found. Explanations will use fallback text.");
        }
        if self.model_api_url.is_none() {
            tracing::warn!("MODEL_API_URL not found. /detect will answer 502.");
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr + Copy,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring unparseable value for {}: {:?}", key, raw);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.analyze_policy.max_bytes, 20 * MIB);
        assert_eq!(config.detect_policy.max_bytes, 10 * MIB);
        assert_eq!(config.max_frames, 8);
        assert_eq!(config.classifier.max_attempts, 3);
        assert_eq!(config.classifier.retry_delay, Duration::from_secs(20));
        assert!(config.classifier.api_key.is_none());
        assert!(config.model_api_url.is_none());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = config_from(&[
            ("HF_API_KEY", "hf_x"),
            ("MAX_FRAMES", "4"),
            ("HTTP_TIMEOUT_SECS", "soon"),
            ("GEMINI_API_KEY", "   "),
        ]);
        assert_eq!(config.classifier.api_key.as_deref(), Some("hf_x"));
        assert_eq!(config.max_frames, 4);
        assert_eq!(config.http_timeout, Duration::from_secs(60));
        assert!(config.explainer.api_key.is_none());
    }

    #[test]
    fn test_policies_differ_by_endpoint() {
        let config = config_from(&[]);
        assert!(config.analyze_policy.allowed_extensions.contains(&"mp4".to_string()));
        assert!(!config.detect_policy.allowed_extensions.contains(&"mp4".to_string()));
        assert!(config.detect_policy.sniff_content);
        assert_eq!(config.analyze_policy.max_megabytes_label(), "20");
    }

    #[test]
    fn test_megabyte_label_keeps_fractions() {
        assert_eq!(UploadPolicy::analyze(MIB + MIB / 2).max_megabytes_label(), "1.5");
        assert_eq!(UploadPolicy::analyze(MIB + MIB / 4).max_megabytes_label(), "1.25");
        assert_eq!(UploadPolicy::detect(10 * MIB).max_megabytes_label(), "10");
        assert_eq!(UploadPolicy::detect(MIB / 2).max_megabytes_label(), "0.5");
    }
}
