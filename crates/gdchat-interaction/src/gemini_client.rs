//! GeminiClient - direct REST client for the `generateContent` endpoint.
//!
//! The API key travels in the query string, so it is kept out of every log
//! line and error message this module produces.

use async_trait::async_trait;
use gdchat_core::config::ApiConfig;
use gdchat_core::error::{ChatError, Result};
use gdchat_core::protocol::{GenerateContentRequest, GenerateContentResponse, GenerationClient};
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::Deserialize;
use std::time::Duration;

/// [`GenerationClient`] that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Creates a client for the default endpoint with the transport's default timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: ApiConfig::default().base_url,
            api_key: api_key.into(),
        }
    }

    /// Creates a client from the `[api]` configuration section.
    pub fn from_config(api_key: impl Into<String>, config: &ApiConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|err| ChatError::transport(err.without_url().to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Overrides the endpoint root (e.g. a local mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{model}:generateContent", self.base_url)
    }

    async fn send_request(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        tracing::debug!(
            "[Gemini] POST {} ({} turn(s))",
            self.endpoint(model),
            body.contents.len()
        );

        let response = self
            .client
            .post(self.endpoint(model))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|err| ChatError::transport(err.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            tracing::warn!("[Gemini] {} returned {}", model, status);
            return Err(map_http_error(status, &body_text, retry_after));
        }

        let text = response
            .text()
            .await
            .map_err(|err| ChatError::transport(err.without_url().to_string()))?;
        parse_response(&text)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let response = self.send_request(model, request).await?;
        tracing::debug!(
            "[Gemini] {} finished with {:?}",
            model,
            response.finish_reason()
        );
        Ok(response)
    }
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn parse_response(body: &str) -> Result<GenerateContentResponse> {
    serde_json::from_str(body)
        .map_err(|err| ChatError::parse(err.to_string()))
}

fn map_http_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> ChatError {
    let mut message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.trim().to_string());

    if message.is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("erro desconhecido")
            .to_string();
    }
    if let Some(delay) = retry_after {
        message.push_str(&format!(" (tente novamente em {}s)", delay.as_secs()));
    }

    ChatError::api(Some(status.as_u16()), message)
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdchat_core::protocol::FINISH_MAX_TOKENS;

    #[test]
    fn test_endpoint_shape() {
        let client = GeminiClient::new("secret-key").with_base_url("http://localhost:9999/models/");
        let url = client.endpoint("gemini-2.5-flash");
        assert_eq!(url, "http://localhost:9999/models/gemini-2.5-flash:generateContent");
        assert!(!url.contains("secret-key"));
    }

    #[test]
    fn test_parse_text_and_finish_reason() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Olá, "}, {"text": "mundo"}], "role": "model"},
                "finishReason": "MAX_TOKENS"
            }]
        }"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text().as_deref(), Some("Olá, mundo"));
        assert_eq!(response.finish_reason(), Some(FINISH_MAX_TOKENS));
        assert!(response.is_truncated());
        assert_eq!(response.block_reason(), None);
    }

    #[test]
    fn test_parse_prompt_block() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.block_reason(), Some("SAFETY"));
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        let err = parse_response("<html>").unwrap_err();
        assert!(matches!(err, ChatError::Parse(_)));
    }

    #[test]
    fn test_map_http_error_uses_api_message() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, body, Some(Duration::from_secs(30)));
        let ChatError::Api { status, message } = err else {
            panic!("expected an API error");
        };
        assert_eq!(status, Some(429));
        assert_eq!(message, "RESOURCE_EXHAUSTED: Quota exceeded (tente novamente em 30s)");
    }

    #[test]
    fn test_map_http_error_with_plain_body() {
        let err = map_http_error(StatusCode::BAD_GATEWAY, "", None);
        assert_eq!(err.to_string(), "API retornou 502: Bad Gateway");
    }

    #[test]
    fn test_retry_after_seconds_only() {
        assert_eq!(
            parse_retry_after(Some(&HeaderValue::from_static("12"))),
            Some(Duration::from_secs(12))
        );
        assert_eq!(
            parse_retry_after(Some(&HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"))),
            None
        );
    }
}
