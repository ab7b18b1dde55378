//! Provider Usage Metrics
//!
//! Aggregates call counts, token usage, latency and estimated cost across a
//! monitoring run. Thread-safe for concurrent provider tasks.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = MetricsCollector::new("batch-42");
//! metrics.record_result(&result);
//! println!("{}", metrics.summary().display());
//! ```

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::ai::provider::TokenUsage;
use crate::constants::pricing;
use crate::types::{ProviderKind, ProviderResult};

/// Estimated USD cost of one call from the per-provider price table
pub fn cost_for(kind: ProviderKind, usage: &TokenUsage) -> f64 {
    let (input_per_1k, output_per_1k) = match kind {
        ProviderKind::Openai => (pricing::OPENAI_INPUT_PER_1K, pricing::OPENAI_OUTPUT_PER_1K),
        ProviderKind::Perplexity => (
            pricing::PERPLEXITY_INPUT_PER_1K,
            pricing::PERPLEXITY_OUTPUT_PER_1K,
        ),
        ProviderKind::Gemini => (pricing::GEMINI_INPUT_PER_1K, pricing::GEMINI_OUTPUT_PER_1K),
    };
    (usage.input_tokens as f64 / 1000.0) * input_per_1k
        + (usage.output_tokens as f64 / 1000.0) * output_per_1k
}

// =============================================================================
// Metrics Collector
// =============================================================================

/// Thread-safe metrics collector for a monitoring run.
///
/// Global counters are atomics; the per-provider breakdown sits behind a
/// `RwLock` because it is touched once per call.
pub struct MetricsCollector {
    session_id: String,
    start_time: Instant,
    api_calls: AtomicU32,
    failures: AtomicU32,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
    /// Stored as microdollars for atomic ops
    total_cost_micros: AtomicU64,
    per_provider: RwLock<BTreeMap<ProviderKind, ProviderMetrics>>,
}

/// Totals for a single provider
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderMetrics {
    pub calls: u32,
    pub failures: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_latency_ms: u64,
    pub cost_usd: f64,
}

impl ProviderMetrics {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.calls as f64
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub session_id: String,
    pub total_duration_ms: u64,
    pub api_calls: u32,
    pub failures: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub avg_latency_ms: f64,
    pub total_cost_usd: f64,
    pub providers: BTreeMap<ProviderKind, ProviderMetrics>,
}

impl MetricsCollector {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            start_time: Instant::now(),
            api_calls: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            total_cost_micros: AtomicU64::new(0),
            per_provider: RwLock::new(BTreeMap::new()),
        }
    }

    /// Record one provider result, successful or not
    pub fn record_result(&self, result: &ProviderResult) {
        let usage = result
            .response()
            .map(|r| r.usage)
            .unwrap_or_default();
        self.record(
            result.provider,
            &usage,
            result.cost_usd(),
            result.latency_ms,
            !result.is_success(),
        );
    }

    /// Record token usage directly
    pub fn record(
        &self,
        provider: ProviderKind,
        usage: &TokenUsage,
        cost_usd: f64,
        latency_ms: u64,
        failed: bool,
    ) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.input_tokens
            .fetch_add(usage.input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(usage.output_tokens as u64, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);

        let cost_micros = (cost_usd * 1_000_000.0) as u64;
        self.total_cost_micros
            .fetch_add(cost_micros, Ordering::Relaxed);

        let mut per_provider = self.per_provider.write().unwrap_or_else(|poisoned| {
            tracing::error!("Metrics per_provider RwLock poisoned, recovering");
            poisoned.into_inner()
        });
        let entry = per_provider.entry(provider).or_default();
        entry.calls += 1;
        if failed {
            entry.failures += 1;
        }
        entry.input_tokens += usage.input_tokens as u64;
        entry.output_tokens += usage.output_tokens as u64;
        entry.total_latency_ms += latency_ms;
        entry.cost_usd += cost_usd;
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSummary {
        let api_calls = self.api_calls.load(Ordering::Relaxed);
        let input_tokens = self.input_tokens.load(Ordering::Relaxed);
        let output_tokens = self.output_tokens.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        let total_cost_micros = self.total_cost_micros.load(Ordering::Relaxed);

        let avg_latency = if api_calls > 0 {
            total_latency as f64 / api_calls as f64
        } else {
            0.0
        };

        let providers = self
            .per_provider
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::error!("Metrics per_provider RwLock poisoned on read, recovering");
                poisoned.into_inner()
            })
            .clone();

        MetricsSummary {
            session_id: self.session_id.clone(),
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            api_calls,
            failures: self.failures.load(Ordering::Relaxed),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            avg_latency_ms: avg_latency,
            total_cost_usd: total_cost_micros as f64 / 1_000_000.0,
            providers,
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        self.snapshot()
    }
}

impl MetricsSummary {
    /// Format summary for display
    pub fn display(&self) -> String {
        let mut out = format!(
            "Session: {}\n\
             Duration: {:.1}s\n\
             API Calls: {} ({} failed)\n\
             Tokens: {} (input: {}, output: {})\n\
             Avg Latency: {:.0}ms\n\
             Estimated Cost: ${:.4}",
            self.session_id,
            self.total_duration_ms as f64 / 1000.0,
            self.api_calls,
            self.failures,
            self.total_tokens,
            self.input_tokens,
            self.output_tokens,
            self.avg_latency_ms,
            self.total_cost_usd
        );
        for (kind, metrics) in &self.providers {
            out.push_str(&format!(
                "\n  {}: {} calls, {} failed, {:.0}ms avg, ${:.4}",
                kind,
                metrics.calls,
                metrics.failures,
                metrics.avg_latency_ms(),
                metrics.cost_usd
            ));
        }
        out
    }
}

// =============================================================================
// Shared Type
// =============================================================================

use std::sync::Arc;

/// Shared metrics collector for concurrent provider tasks
pub type SharedMetrics = Arc<MetricsCollector>;

pub fn create_shared_metrics(session_id: impl Into<String>) -> SharedMetrics {
    Arc::new(MetricsCollector::new(session_id))
}

// =============================================================================
// Tests
// =============================================================================
