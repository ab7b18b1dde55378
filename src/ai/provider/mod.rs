//! LLM Provider Abstraction
//!
//! Defines the `LlmProvider` trait. Each backend only translates a plain text
//! query into its own wire format and back; timeouts and failure
//! classification live in the trait's provided `query` method so every
//! adapter honors the same contract.
//!
//! ## Modules
//!
//! - `openai`: Chat Completions API (also the wire format for Perplexity)
//! - `perplexity`: Perplexity Sonar via its OpenAI-compatible endpoint
//! - `gemini`: Google Generative Language `generateContent`

mod gemini;
mod openai;
mod perplexity;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use perplexity::PerplexityProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::ai::timeout::with_timeout_map;
use crate::config::{Config, ProviderSettings};
use crate::types::{MonitorError, ProviderError, ProviderKind, ProviderResult, Result};

// =============================================================================
// Provider Reply with Usage Metrics
// =============================================================================

/// Normalized answer from one provider call
#[derive(Debug, Clone)]
pub struct ProviderReply {
    /// Plain response text
    pub text: String,
    pub usage: TokenUsage,
}

/// Token usage metrics for cost tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Shared LLM provider type for concurrent access across query tasks.
pub type SharedProvider = Arc<dyn LlmProvider>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Runtime configuration for one provider adapter
///
/// Note: API keys are never serialized and are redacted in debug output.
/// Each provider converts the key to SecretString internally.
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Transport-level timeout; the orchestrator applies its own per-call bound
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn from_settings(kind: ProviderKind, settings: &ProviderSettings, timeout: Duration) -> Self {
        Self {
            kind,
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            api_base: settings.api_base.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout,
        }
    }

    /// Configured key, falling back to the provider's environment variable
    pub(crate) fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(self.kind.api_key_env()).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                MonitorError::Config(format!(
                    "{} API key not found. Set {} env var or providers.{}.api_key in config",
                    self.kind,
                    self.kind.api_key_env(),
                    self.kind
                ))
            })
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(
                crate::constants::network::CONNECTION_TIMEOUT_SECS,
            ))
            .build()
            .map_err(MonitorError::Http)
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one query and return the normalized text.
    ///
    /// Adapters classify their own failures; callers should prefer `query`.
    async fn complete(&self, prompt: &str) -> std::result::Result<ProviderReply, ProviderError>;

    fn kind(&self) -> ProviderKind;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is reachable with the configured credentials
    async fn health_check(&self) -> Result<bool>;

    /// Query bounded by `timeout`. Never fails: every failure mode becomes a
    /// failed `ProviderResult`.
    async fn query(&self, text: &str, timeout: Duration) -> ProviderResult {
        let kind = self.kind();
        let start = Instant::now();

        let outcome = with_timeout_map(timeout, self.complete(text), kind.as_str()).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(reply)) => {
                debug!(provider = %kind, latency_ms, chars = reply.text.len(), "Provider answered");
                ProviderResult::succeeded(kind, self.model(), latency_ms, reply.text, reply.usage)
            }
            Ok(Err(error)) => {
                warn!(provider = %kind, latency_ms, kind = %error.kind, error = %error.message, "Provider failed");
                ProviderResult::failed(kind, self.model(), latency_ms, error)
            }
            Err(_) => {
                warn!(provider = %kind, ?timeout, "Provider timed out");
                ProviderResult::failed(
                    kind,
                    self.model(),
                    latency_ms,
                    ProviderError::timeout(kind.as_str(), timeout),
                )
            }
        }
    }
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.kind {
        ProviderKind::Openai => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        ProviderKind::Perplexity => Ok(Arc::new(PerplexityProvider::new(config.clone())?)),
        ProviderKind::Gemini => Ok(Arc::new(GeminiProvider::new(config.clone())?)),
    }
}

/// Build every enabled provider, in configured order
pub fn create_enabled_providers(config: &Config) -> Result<Vec<SharedProvider>> {
    let timeout = config.monitor.per_provider_timeout();
    config
        .monitor
        .enabled_providers
        .iter()
        .map(|kind| {
            let provider_config =
                ProviderConfig::from_settings(*kind, config.providers.get(*kind), timeout);
            create_provider(&provider_config)
        })
        .collect()
}
