//! Wire types of the remote generation endpoint and the client seam.
//!
//! Requests serialize to
//! `{contents, generationConfig, safetySettings}`; responses carry
//! `candidates[].content.parts[].text`, `candidates[].finishReason` and an
//! optional `promptFeedback.blockReason`.

use crate::error::Result;
use crate::message::{ApiRole, ApiTurn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Finish reason reported when the output-token ceiling cut the answer short.
pub const FINISH_MAX_TOKENS: &str = "MAX_TOKENS";
/// Finish reason for a candidate withheld by the output safety filter.
pub const FINISH_SAFETY: &str = "SAFETY";

pub const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Performs one request/response exchange with a backend model.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, model: &str, request: &GenerateContentRequest)
    -> Result<GenerateContentResponse>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationParams,
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerateContentRequest {
    pub fn new(turns: &[ApiTurn], generation_config: GenerationParams, threshold: &str) -> Self {
        Self {
            contents: turns.iter().map(Content::from).collect(),
            generation_config,
            safety_settings: SafetySetting::all(threshold),
        }
    }

    /// Text of the last turn, mostly useful to test doubles.
    pub fn last_text(&self) -> Option<&str> {
        self.contents
            .last()
            .and_then(|content| content.parts.first())
            .map(|part| part.text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: ApiRole,
    pub parts: Vec<Part>,
}

impl From<&ApiTurn> for Content {
    fn from(turn: &ApiTurn) -> Self {
        Self {
            role: turn.role,
            parts: vec![Part {
                text: turn.text.clone(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    /// One setting per harm category, all at `threshold`.
    pub fn all(threshold: &str) -> Vec<Self> {
        HARM_CATEGORIES
            .iter()
            .map(|category| Self {
                category: category.to_string(),
                threshold: threshold.to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// A response whose first candidate carries `text` with `finish_reason`.
    pub fn from_text(text: impl Into<String>, finish_reason: &str) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(CandidateContent {
                    parts: vec![ResponsePart {
                        text: Some(text.into()),
                    }],
                }),
                finish_reason: Some(finish_reason.to_string()),
            }],
            prompt_feedback: None,
        }
    }

    /// A response rejected by the prompt safety filter.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            candidates: Vec::new(),
            prompt_feedback: Some(PromptFeedback {
                block_reason: Some(reason.into()),
            }),
        }
    }

    /// The prompt-level block reason, if the request was refused.
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
    }

    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|part| part.text.as_deref()).collect();
        if text.is_empty() { None } else { Some(text) }
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref())
    }

    /// True when the candidate was stopped by the safety filter.
    pub fn is_safety_stop(&self) -> bool {
        self.finish_reason()
            .is_some_and(|reason| reason.eq_ignore_ascii_case(FINISH_SAFETY))
    }

    /// True when generation stopped at the output-token ceiling.
    pub fn is_truncated(&self) -> bool {
        self.finish_reason()
            .is_some_and(|reason| reason.to_ascii_uppercase().contains(FINISH_MAX_TOKENS))
    }
}

/// Best-effort guess that a reply was cut short although the finish reason
/// did not say so. Only ever logged.
pub fn looks_truncated(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.ends_with("...") || trimmed.ends_with('…') || trimmed.ends_with(',')
}
