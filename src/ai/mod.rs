//! AI Integration Layer
//!
//! LLM provider adapters, call timeouts and usage metrics.

pub mod metrics;
pub mod provider;
pub mod timeout;

pub use metrics::{
    MetricsCollector, MetricsSummary, ProviderMetrics, SharedMetrics, cost_for,
    create_shared_metrics,
};
pub use provider::{
    GeminiProvider, LlmProvider, OpenAiProvider, PerplexityProvider, ProviderConfig,
    ProviderReply, SharedProvider, TokenUsage, create_enabled_providers, create_provider,
};
pub use timeout::{with_timeout, with_timeout_map};
