//! Batch results and roll-up statistics.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{PersistenceError, QueryReport};

/// Roll-up statistics for one batch of queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_queries: usize,
    /// Queries where at least one provider mentioned the brand
    pub brand_mentions_found: usize,
    /// `brand_mentions_found / total_queries`, 0.0 for an empty batch
    pub brand_detection_rate: f64,
    pub execution_time_ms: u64,
    /// Failed provider calls across all queries
    pub provider_failures: usize,
    pub total_cost_usd: f64,
}

impl BatchSummary {
    pub fn from_reports(reports: &[QueryReport], execution_time_ms: u64) -> Self {
        let total_queries = reports.len();
        let brand_mentions_found = reports.iter().filter(|r| r.brand_found()).count();
        let brand_detection_rate = if total_queries == 0 {
            0.0
        } else {
            brand_mentions_found as f64 / total_queries as f64
        };

        Self {
            total_queries,
            brand_mentions_found,
            brand_detection_rate,
            execution_time_ms,
            provider_failures: reports.iter().map(|r| r.failed_providers().count()).sum(),
            total_cost_usd: reports.iter().map(QueryReport::total_cost_usd).sum(),
        }
    }
}

/// A report whose persistence failed after retries (or permanently)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistFailure {
    pub query_id: Uuid,
    pub query: String,
    pub error: PersistenceError,
}

/// Everything produced by one batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub reports: Vec<QueryReport>,
    pub summary: BatchSummary,
    /// Reports that could not be stored; the batch continued past each
    pub persistence_failures: Vec<PersistFailure>,
    /// Rows appended to the store across the batch
    pub rows_persisted: usize,
}

impl BatchOutcome {
    pub fn fully_persisted(&self) -> bool {
        self.persistence_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::TokenUsage;
    use crate::types::{
        BrandMatch, MatchConfidence, MentionSentiment, ProviderError, ProviderErrorKind,
        ProviderKind, ProviderResult, Query,
    };

    fn hit() -> ProviderResult {
        ProviderResult::succeeded(ProviderKind::Openai, "m", 1, "DataTobiz", TokenUsage::default())
            .with_cost(0.01)
            .with_analysis(
                vec![BrandMatch {
                    start: 0,
                    end: 9,
                    text: "DataTobiz".to_string(),
                    variation: "DataTobiz".to_string(),
                    confidence: MatchConfidence::Exact,
                    sentiment: MentionSentiment::Neutral,
                }],
                None,
            )
    }

    fn failure() -> ProviderResult {
        ProviderResult::failed(
            ProviderKind::Gemini,
            "gemini-pro",
            1,
            ProviderError::new(ProviderErrorKind::Timeout, "slow"),
        )
    }

    #[test]
    fn test_summary_counts() {
        let reports = vec![
            QueryReport::assemble(Query::new("a"), "DataTobiz", vec![hit(), failure()]),
            QueryReport::assemble(Query::new("b"), "DataTobiz", vec![failure()]),
        ];
        let summary = BatchSummary::from_reports(&reports, 1200);

        assert_eq!(summary.total_queries, 2);
        assert_eq!(summary.brand_mentions_found, 1);
        assert!((summary.brand_detection_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(summary.provider_failures, 2);
        assert!((summary.total_cost_usd - 0.01).abs() < 1e-9);
        assert_eq!(summary.execution_time_ms, 1200);
    }

    #[test]
    fn test_empty_batch() {
        let summary = BatchSummary::from_reports(&[], 0);
        assert_eq!(summary.total_queries, 0);
        assert_eq!(summary.brand_detection_rate, 0.0);
    }
}
