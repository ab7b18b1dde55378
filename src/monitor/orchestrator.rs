//! Query Orchestrator
//!
//! Fans one query out to every configured provider concurrently, then runs
//! brand detection and rank estimation on each successful answer.
//!
//! ## Flow
//!
//! ```text
//! Query ─┬─ spawn(openai.query)     ─┐
//!        ├─ spawn(perplexity.query) ─┼─ join (configured order) ─ QueryReport
//!        └─ spawn(gemini.query)     ─┘
//! ```
//!
//! Each provider call runs in its own task under its own timeout, so a slow
//! or panicking provider only fails its own entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info, instrument, warn};

use super::cache::ResponseCache;
use super::summary::{BatchOutcome, BatchSummary, PersistFailure};
use crate::ai::{SharedMetrics, SharedProvider, cost_for, create_enabled_providers};
use crate::config::Config;
use crate::detect::BrandDetector;
use crate::rank::RankEstimator;
use crate::storage::ResultSink;
use crate::types::{
    ProviderError, ProviderErrorKind, ProviderResult, Query, QueryReport, Result,
};

/// Immutable run settings, captured once from `Config`
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub target_brand: String,
    pub per_provider_timeout: Duration,
    pub max_concurrent_queries: usize,
    pub enable_ranking_detection: bool,
    pub enable_cost_tracking: bool,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_brand: config.brand.target_brand.trim().to_string(),
            per_provider_timeout: config.monitor.per_provider_timeout(),
            max_concurrent_queries: config.monitor.max_concurrent_queries.max(1),
            enable_ranking_detection: config.monitor.enable_ranking_detection,
            enable_cost_tracking: config.monitor.enable_cost_tracking,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Per-call state moved into each provider task
#[derive(Clone)]
struct CallContext {
    settings: Arc<MonitorSettings>,
    detector: Arc<BrandDetector>,
    estimator: Arc<RankEstimator>,
    cache: Option<Arc<ResponseCache>>,
}

impl CallContext {
    async fn call(&self, provider: SharedProvider, text: String) -> ProviderResult {
        let kind = provider.kind();

        let raw = match self.cache.as_ref().and_then(|c| c.get(&text, kind)) {
            Some(cached) => cached,
            None => {
                let fresh = provider.query(&text, self.settings.per_provider_timeout).await;
                if let Some(cache) = &self.cache {
                    cache.insert(&text, &fresh);
                }
                // Cache hits cost nothing, so cost is only charged here
                let cost = fresh
                    .response()
                    .filter(|_| self.settings.enable_cost_tracking)
                    .map(|response| cost_for(kind, &response.usage));
                match cost {
                    Some(cost) => fresh.with_cost(cost),
                    None => fresh,
                }
            }
        };

        self.analyze(raw)
    }

    fn analyze(&self, result: ProviderResult) -> ProviderResult {
        let Some(text) = result.text() else {
            return result;
        };

        let matches = self.detector.detect(text);
        let rank = if self.settings.enable_ranking_detection {
            self.estimator.estimate(text, &matches)
        } else {
            None
        };
        result.with_analysis(matches, rank)
    }
}

pub struct Orchestrator {
    providers: Vec<SharedProvider>,
    context: CallContext,
    metrics: Option<SharedMetrics>,
}

impl Orchestrator {
    pub fn new(
        settings: MonitorSettings,
        providers: Vec<SharedProvider>,
        detector: BrandDetector,
        estimator: RankEstimator,
    ) -> Self {
        Self {
            providers,
            context: CallContext {
                settings: Arc::new(settings),
                detector: Arc::new(detector),
                estimator: Arc::new(estimator),
                cache: None,
            },
            metrics: None,
        }
    }

    /// Build providers, detector and estimator from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let orchestrator = Self::new(
            MonitorSettings::from_config(config),
            create_enabled_providers(config)?,
            BrandDetector::from_config(config),
            RankEstimator::new(&config.ranking),
        );

        Ok(match config.monitor.cache_bucket_seconds {
            0 => orchestrator,
            secs => orchestrator.with_cache(Arc::new(ResponseCache::new(Duration::from_secs(secs)))),
        })
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.context.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.context.settings
    }

    pub fn providers(&self) -> &[SharedProvider] {
        &self.providers
    }

    pub fn metrics(&self) -> Option<&SharedMetrics> {
        self.metrics.as_ref()
    }

    /// Query every provider concurrently and assemble the report.
    ///
    /// Never fails: provider failures, timeouts and panics each become a
    /// failed entry. Entries follow the configured provider order.
    #[instrument(skip_all, fields(query_id = %query.id))]
    pub async fn run(&self, query: &Query) -> QueryReport {
        let started = Instant::now();

        if let Some(cache) = &self.context.cache {
            let purged = cache.purge_stale(Utc::now());
            if purged > 0 {
                debug!(purged, "Dropped stale cache entries");
            }
        }

        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let context = self.context.clone();
                let provider = Arc::clone(provider);
                let text = query.text.clone();
                tokio::spawn(async move { context.call(provider, text).await })
            })
            .collect();

        let results: Vec<ProviderResult> = join_all(handles)
            .await
            .into_iter()
            .zip(&self.providers)
            .map(|(joined, provider)| {
                joined.unwrap_or_else(|e| {
                    let kind = provider.kind();
                    warn!(provider = %kind, error = %e, "Provider task aborted");
                    ProviderResult::failed(
                        kind,
                        provider.model(),
                        started.elapsed().as_millis() as u64,
                        ProviderError::with_provider(
                            ProviderErrorKind::Unknown,
                            format!("provider task failed: {}", e),
                            kind.as_str(),
                        ),
                    )
                })
            })
            .collect();

        if let Some(metrics) = &self.metrics {
            for result in &results {
                metrics.record_result(result);
            }
        }

        let report =
            QueryReport::assemble(query.clone(), &self.context.settings.target_brand, results);
        info!(
            brand_found = report.brand_found(),
            matches = report.total_matches(),
            best_rank = ?report.best_rank(),
            failed = report.failed_providers().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query complete"
        );
        report
    }

    /// Lazily run `queries`, at most `max_concurrent_queries` at a time.
    /// Reports come out in submission order.
    pub fn stream<I>(&self, queries: I) -> impl Stream<Item = QueryReport>
    where
        I: IntoIterator<Item = Query>,
    {
        stream::iter(queries)
            .map(move |query| async move { self.run(&query).await })
            .buffered(self.context.settings.max_concurrent_queries)
    }

    pub async fn run_batch<I>(&self, queries: I) -> Vec<QueryReport>
    where
        I: IntoIterator<Item = Query>,
    {
        self.stream(queries).collect().await
    }

    /// Run a batch and persist each report as it completes.
    ///
    /// A report that fails to persist is recorded in the outcome and the
    /// batch carries on.
    #[instrument(skip_all, fields(queries = queries.len()))]
    pub async fn monitor(&self, queries: Vec<Query>, sink: Option<&ResultSink>) -> BatchOutcome {
        let started = Instant::now();
        let mut outcome = BatchOutcome::default();

        let mut reports = std::pin::pin!(self.stream(queries));
        while let Some(report) = reports.next().await {
            if let Some(sink) = sink {
                match sink.persist(&report).await {
                    Ok(receipt) => outcome.rows_persisted += receipt.rows_written,
                    Err(error) => {
                        warn!(query_id = %report.query().id, error = %error, "Report not persisted");
                        outcome.persistence_failures.push(PersistFailure {
                            query_id: report.query().id,
                            query: report.query().text.clone(),
                            error,
                        });
                    }
                }
            }
            outcome.reports.push(report);
        }

        outcome.summary =
            BatchSummary::from_reports(&outcome.reports, started.elapsed().as_millis() as u64);
        info!(
            total = outcome.summary.total_queries,
            mentions = outcome.summary.brand_mentions_found,
            rows = outcome.rows_persisted,
            persist_failures = outcome.persistence_failures.len(),
            "Batch complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::ai::provider::{LlmProvider, ProviderReply, TokenUsage};
    use crate::ai::create_shared_metrics;
    use crate::config::BrandConfig;
    use crate::storage::{MemoryStore, RetryPolicy};
    use crate::types::{MatchConfidence, ProviderKind, RankMethod};

    enum Behavior {
        Answer(&'static str),
        Fail(ProviderErrorKind),
        Hang,
        Panic,
    }

    struct MockProvider {
        kind: ProviderKind,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn shared(kind: ProviderKind, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(&self, prompt: &str) -> std::result::Result<ProviderReply, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("slow") {
                tokio::time::sleep(Duration::from_millis(60)).await;
            }
            match &self.behavior {
                Behavior::Answer(text) => Ok(ProviderReply {
                    text: text.to_string(),
                    usage: TokenUsage::new(100, 200),
                }),
                Behavior::Fail(kind) => Err(ProviderError::with_provider(
                    *kind,
                    "mock failure",
                    self.kind.as_str(),
                )),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(ProviderError::new(ProviderErrorKind::Unknown, "unreachable"))
                }
                Behavior::Panic => panic!("adapter bug"),
            }
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn settings(timeout: Duration) -> MonitorSettings {
        MonitorSettings {
            target_brand: "DataTobiz".to_string(),
            per_provider_timeout: timeout,
            max_concurrent_queries: 4,
            enable_ranking_detection: true,
            enable_cost_tracking: true,
        }
    }

    fn orchestrator(settings: MonitorSettings, providers: Vec<SharedProvider>) -> Orchestrator {
        Orchestrator::new(
            settings,
            providers,
            BrandDetector::new(&["DataTobiz".to_string()], &BrandConfig::default()),
            RankEstimator::default(),
        )
    }

    const LISTED: &str = "1. CompetitorA\n2. DataTobiz\n3. CompetitorB";

    #[tokio::test]
    async fn test_results_follow_configured_order() {
        let providers: Vec<SharedProvider> = vec![
            MockProvider::shared(ProviderKind::Gemini, Behavior::Answer(LISTED)),
            MockProvider::shared(ProviderKind::Openai, Behavior::Answer("slow answer")),
            MockProvider::shared(ProviderKind::Perplexity, Behavior::Answer("nothing here")),
        ];
        let orch = orchestrator(settings(Duration::from_secs(5)), providers);

        let report = orch.run(&Query::new("slow query")).await;
        let order: Vec<_> = report.results().iter().map(|r| r.provider).collect();
        assert_eq!(
            order,
            vec![ProviderKind::Gemini, ProviderKind::Openai, ProviderKind::Perplexity]
        );

        let gemini = report.result_for(ProviderKind::Gemini).unwrap();
        assert_eq!(gemini.matches().len(), 1);
        assert_eq!(gemini.matches()[0].confidence, MatchConfidence::Exact);
        let rank = gemini.rank().unwrap();
        assert_eq!(rank.position, Some(2));
        assert_eq!(rank.method, RankMethod::ListIndex);
        assert!(gemini.cost_usd() > 0.0);

        assert!(!report.result_for(ProviderKind::Perplexity).unwrap().brand_found());
        assert_eq!(report.target_brand(), "DataTobiz");
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_provider() {
        let providers: Vec<SharedProvider> = vec![
            MockProvider::shared(ProviderKind::Openai, Behavior::Answer("DataTobiz")),
            MockProvider::shared(ProviderKind::Gemini, Behavior::Hang),
        ];
        let orch = orchestrator(settings(Duration::from_millis(50)), providers);

        let started = Instant::now();
        let report = orch.run(&Query::new("q")).await;
        assert!(started.elapsed() < Duration::from_secs(5));

        assert!(report.results()[0].brand_found());
        let timed_out = &report.results()[1];
        assert!(!timed_out.is_success());
        assert!(timed_out.matches().is_empty());
        assert_eq!(timed_out.error().map(|e| e.kind), Some(ProviderErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_failures_and_panics_become_failed_entries() {
        let providers: Vec<SharedProvider> = vec![
            MockProvider::shared(ProviderKind::Openai, Behavior::Fail(ProviderErrorKind::Auth)),
            MockProvider::shared(ProviderKind::Perplexity, Behavior::Panic),
            MockProvider::shared(ProviderKind::Gemini, Behavior::Answer("DataTobiz rocks")),
        ];
        let metrics = create_shared_metrics("test");
        let orch = orchestrator(settings(Duration::from_secs(5)), providers)
            .with_metrics(metrics.clone());

        let report = orch.run(&Query::new("q")).await;
        assert_eq!(report.results().len(), 3);

        let auth = &report.results()[0];
        assert_eq!(auth.error().map(|e| e.kind), Some(ProviderErrorKind::Auth));
        assert!(auth.matches().is_empty());

        let panicked = &report.results()[1];
        assert_eq!(panicked.provider, ProviderKind::Perplexity);
        assert_eq!(panicked.error().map(|e| e.kind), Some(ProviderErrorKind::Unknown));
        assert_eq!(panicked.model, "mock-model");

        assert!(report.results()[2].brand_found());
        assert_eq!(report.failed_providers().count(), 2);

        let summary = metrics.snapshot();
        assert_eq!(summary.api_calls, 3);
        assert_eq!(summary.failures, 2);
    }

    #[tokio::test]
    async fn test_ranking_can_be_disabled() {
        let providers: Vec<SharedProvider> =
            vec![MockProvider::shared(ProviderKind::Openai, Behavior::Answer(LISTED))];
        let mut settings = settings(Duration::from_secs(5));
        settings.enable_ranking_detection = false;
        settings.enable_cost_tracking = false;
        let orch = orchestrator(settings, providers);

        let report = orch.run(&Query::new("q")).await;
        let result = &report.results()[0];
        assert!(result.brand_found());
        assert!(result.rank().is_none());
        assert_eq!(result.cost_usd(), 0.0);
    }

    #[tokio::test]
    async fn test_stream_preserves_submission_order() {
        let providers: Vec<SharedProvider> =
            vec![MockProvider::shared(ProviderKind::Openai, Behavior::Answer("DataTobiz"))];
        let orch = orchestrator(settings(Duration::from_secs(5)), providers);

        let queries = vec![
            Query::new("slow one"),
            Query::new("fast two"),
            Query::new("slow three"),
            Query::new("fast four"),
        ];
        let expected: Vec<_> = queries.iter().map(|q| q.id).collect();

        let reports = orch.run_batch(queries).await;
        let ids: Vec<_> = reports.iter().map(|r| r.query().id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_cache_reuses_successful_answers() {
        let provider = MockProvider::shared(ProviderKind::Openai, Behavior::Answer("DataTobiz"));
        let failing =
            MockProvider::shared(ProviderKind::Gemini, Behavior::Fail(ProviderErrorKind::RateLimit));
        let orch = orchestrator(
            settings(Duration::from_secs(5)),
            vec![provider.clone(), failing.clone()],
        )
        .with_cache(Arc::new(ResponseCache::new(Duration::from_secs(3600))));

        let first = orch.run(&Query::new("same text")).await;
        let second = orch.run(&Query::new("same text")).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
        assert!(first.results()[0].cost_usd() > 0.0);
        assert_eq!(second.results()[0].cost_usd(), 0.0);
        assert!(second.results()[0].brand_found());
    }

    #[tokio::test]
    async fn test_run_drops_entries_from_past_buckets() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(3600)));
        let stale = ProviderResult::succeeded(
            ProviderKind::Openai,
            "m",
            10,
            "old answer",
            TokenUsage::default(),
        );
        cache.insert_at("yesterday", &stale, Utc::now() - chrono::Duration::hours(24));
        assert_eq!(cache.len(), 1);

        let orch = orchestrator(
            settings(Duration::from_secs(5)),
            vec![MockProvider::shared(ProviderKind::Openai, Behavior::Answer("DataTobiz"))],
        )
        .with_cache(Arc::clone(&cache));

        orch.run(&Query::new("today")).await;

        assert_eq!(cache.len(), 1);
        assert!(cache.get("today", ProviderKind::Openai).is_some());
    }

    #[tokio::test]
    async fn test_monitor_persists_each_report() {
        let providers: Vec<SharedProvider> = vec![
            MockProvider::shared(ProviderKind::Openai, Behavior::Answer(LISTED)),
            MockProvider::shared(ProviderKind::Gemini, Behavior::Answer("no brand")),
        ];
        let orch = orchestrator(settings(Duration::from_secs(5)), providers);
        let store = Arc::new(MemoryStore::new());
        let sink = ResultSink::new(store.clone(), "Results", RetryPolicy::immediate(1));

        let outcome = orch
            .monitor(vec![Query::new("a"), Query::new("b")], Some(&sink))
            .await;

        assert!(outcome.fully_persisted());
        assert_eq!(outcome.rows_persisted, 4);
        assert_eq!(store.row_count("Results"), 4);
        assert_eq!(outcome.summary.total_queries, 2);
        assert_eq!(outcome.summary.brand_mentions_found, 2);
        assert_eq!(outcome.summary.brand_detection_rate, 1.0);
    }

    #[tokio::test]
    async fn test_monitor_without_sink() {
        let providers: Vec<SharedProvider> =
            vec![MockProvider::shared(ProviderKind::Openai, Behavior::Answer("none"))];
        let orch = orchestrator(settings(Duration::from_secs(5)), providers);

        let outcome = orch.monitor(vec![Query::new("a")], None).await;
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.rows_persisted, 0);
        assert_eq!(outcome.summary.brand_detection_rate, 0.0);
    }
}
