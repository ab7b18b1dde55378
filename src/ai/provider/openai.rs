//! OpenAI API Provider
//!
//! LLM provider using OpenAI's Chat Completions API.
//! The request/response translation is shared with Perplexity, whose API is
//! wire-compatible.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{LlmProvider, ProviderConfig, ProviderReply, TokenUsage};
use crate::constants::provider::SYSTEM_PROMPT;
use crate::types::{ErrorClassifier, ProviderError, ProviderKind, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    inner: ChatCompletionsClient,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletionsClient::new(config, DEFAULT_API_BASE)?,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> std::result::Result<ProviderReply, ProviderError> {
        self.inner.complete(prompt).await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    fn model(&self) -> &str {
        &self.inner.model
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.list_models().await
    }
}

// =============================================================================
// Shared Chat Completions Client
// =============================================================================

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub(super) struct ChatCompletionsClient {
    kind: ProviderKind,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    pub(super) model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("kind", &self.kind)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ChatCompletionsClient {
    pub(super) fn new(config: ProviderConfig, default_base: &str) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = config.http_client()?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| default_base.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            kind: config.kind,
            api_key: SecretString::from(api_key),
            api_base,
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_request(&self, prompt: &str, max_tokens: usize) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: Some(max_tokens),
        }
    }

    pub(super) async fn complete(
        &self,
        prompt: &str,
    ) -> std::result::Result<ProviderReply, ProviderError> {
        self.complete_limited(prompt, self.max_tokens).await
    }

    /// Completion with an explicit token budget
    pub(super) async fn complete_limited(
        &self,
        prompt: &str,
        max_tokens: usize,
    ) -> std::result::Result<ProviderReply, ProviderError> {
        let provider = self.kind.as_str();
        info!(
            "Querying {} (model: {}, temperature: {})",
            provider, self.model, self.temperature
        );

        let request = self.build_request(prompt, max_tokens);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, provider))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("{} API error ({}): {}", provider, status, body),
                provider,
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e, provider))?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::malformed(provider, format!("Failed to parse response: {}", e))
        })?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::malformed(provider, "No content in response"))?;

        debug!(provider, tokens = usage.total(), "Received chat completion");
        Ok(ProviderReply { text, usage })
    }

    pub(super) async fn list_models(&self) -> Result<bool> {
        let url = format!("{}/models", self.api_base);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("{} API is available", self.kind);
                Ok(true)
            }
            Ok(resp) => {
                warn!("{} API check failed: {}", self.kind, resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("{} API check failed: {}", self.kind, e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderErrorKind;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            kind: ProviderKind::Openai,
            model: "gpt-3.5-turbo".to_string(),
            api_key: Some("sk-test".to_string()),
            api_base: Some(server.uri()),
            temperature: 0.1,
            max_tokens: 256,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_complete_parses_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": " 1. DataTobiz\n2. Other "}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config_for(&server)).unwrap();
        let reply = provider.complete("best BI firms").await.unwrap();
        assert_eq!(reply.text, "1. DataTobiz\n2. Other");
        assert_eq!(reply.usage, TokenUsage::new(12, 8));
    }

    #[tokio::test]
    async fn test_complete_classifies_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config_for(&server)).unwrap();
        let err = provider.complete("q").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
        assert_eq!(err.provider.as_deref(), Some("openai"));
    }

    #[tokio::test]
    async fn test_complete_classifies_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config_for(&server)).unwrap();
        let err = provider.complete("q").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimit);
    }

    #[tokio::test]
    async fn test_complete_rejects_garbage_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config_for(&server)).unwrap();
        let err = provider.complete("q").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config_for(&server)).unwrap();
        let err = provider.complete("q").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config_for(&server)).unwrap();
        assert!(provider.health_check().await.unwrap());
    }
}
