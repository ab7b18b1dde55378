//! Perplexity API Provider
//!
//! Perplexity's Sonar models answer with live web search results and speak
//! the OpenAI Chat Completions wire format.

use async_trait::async_trait;

use super::openai::ChatCompletionsClient;
use super::{LlmProvider, ProviderConfig, ProviderReply};
use crate::types::{ProviderError, ProviderKind, Result};

const DEFAULT_API_BASE: &str = "https://api.perplexity.ai";

#[derive(Debug)]
pub struct PerplexityProvider {
    inner: ChatCompletionsClient,
}

impl PerplexityProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletionsClient::new(config, DEFAULT_API_BASE)?,
        })
    }
}

#[async_trait]
impl LlmProvider for PerplexityProvider {
    async fn complete(&self, prompt: &str) -> std::result::Result<ProviderReply, ProviderError> {
        self.inner.complete(prompt).await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Perplexity
    }

    fn model(&self) -> &str {
        &self.inner.model
    }

    /// Perplexity has no model listing endpoint, so this sends a one-token
    /// completion instead.
    async fn health_check(&self) -> Result<bool> {
        Ok(self.inner.complete_limited("ping", 1).await.is_ok())
    }
}
