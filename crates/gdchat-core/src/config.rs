//! Configuration types.
//!
//! `ChatConfig` mirrors `config.toml`; every section and field falls back to
//! its default so a partial (or missing) file is valid. Secrets live in a
//! separate `secret.json` described by [`SecretConfig`].

use serde::{Deserialize, Serialize};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Root of `config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub limits: LimitsConfig,
    pub correction: CorrectionConfig,
    pub generation: GenerationConfig,
    pub models: ModelsConfig,
    pub api: ApiConfig,
}

/// Size caps, rate limiting and continuation bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Minimum spacing between remote workflows, in milliseconds.
    pub rate_limit_ms: i64,
    pub max_display: usize,
    pub max_api_history: usize,
    /// Character budget for the history sent with each request.
    pub max_api_context_chars: usize,
    /// Approximate per-message cost added to `content` length.
    pub message_overhead_chars: usize,
    pub max_user_input_chars: usize,
    /// Inputs longer than this, with a correction keyword, go through chunking.
    pub large_text_threshold: usize,
    pub max_continue_attempts: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 15_000,
            max_display: 250,
            max_api_history: 100,
            max_api_context_chars: 30_000,
            message_overhead_chars: 20,
            max_user_input_chars: 20_000,
            large_text_threshold: 4_000,
            max_continue_attempts: 2,
        }
    }
}

/// Large-text correction workflow settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    /// Keep the oversized prompt and its corrected echo out of the API log.
    pub exclude_from_api: bool,
    /// Lowercase substrings that mark a correction request.
    pub keywords: Vec<String>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            chunk_max_chars: 3_800,
            chunk_overlap_chars: 250,
            exclude_from_api: true,
            keywords: ["corrigir", "corrija", "corrige", "correção", "correcao"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl CorrectionConfig {
    /// Case-insensitive substring match against the keyword set.
    pub fn mentions_correction(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()))
    }
}

/// Sampling parameters sent with each request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub chat_temperature: f32,
    pub correction_temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub long_input_max_output_tokens: u32,
    pub long_input_threshold_chars: usize,
    pub safety_threshold: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            chat_temperature: 0.7,
            correction_temperature: 0.2,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2_048,
            long_input_max_output_tokens: 8_192,
            long_input_threshold_chars: 1_000,
            safety_threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
        }
    }
}

/// Backend model pool used by the selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub pool: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            pool: vec![
                DEFAULT_GEMINI_MODEL.to_string(),
                "gemini-2.5-flash-lite".to_string(),
                "gemini-3-flash-preview".to_string(),
            ],
        }
    }
}

/// Remote endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Overall request timeout; `None` leaves the transport default in place.
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
        }
    }
}

/// Root configuration structure for secret.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
}

/// Gemini API credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ChatConfig = toml::from_str(
            r#"
            [limits]
            rate_limit_ms = 1000

            [models]
            pool = ["gemini-2.5-pro"]
            "#,
        )
        .unwrap();

        assert_eq!(config.limits.rate_limit_ms, 1000);
        assert_eq!(config.limits.max_display, 250);
        assert_eq!(config.models.pool, vec!["gemini-2.5-pro".to_string()]);
        assert_eq!(config.correction.chunk_max_chars, 3_800);
    }

    #[test]
    fn test_correction_keywords_case_insensitive() {
        let correction = CorrectionConfig::default();
        assert!(correction.mentions_correction("Por favor CORRIJA este texto"));
        assert!(correction.mentions_correction("preciso de correção"));
        assert!(!correction.mentions_correction("traduza este texto"));
    }
}
