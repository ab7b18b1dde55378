//! Monitoring Data Model
//!
//! `Query` → per-provider `ProviderResult` → aggregated `QueryReport`.
//!
//! A failed provider call is a distinct `ProviderOutcome` variant, so a
//! failed result cannot hold matches or a rank estimate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProviderKind;
use super::error::ProviderError;
use crate::ai::provider::TokenUsage;

// =============================================================================
// Query
// =============================================================================

/// A search string submitted for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub text: String,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
        }
    }
}

// =============================================================================
// Brand Matches
// =============================================================================

/// How a brand mention was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    /// Case-insensitive whole-word match of a configured variation
    Exact,
    /// Matched after collapsing punctuation/whitespace or within edit tolerance
    Fuzzy,
    /// Near miss corroborated by brand context keywords nearby
    Contextual,
}

impl MatchConfidence {
    /// Numeric weight used when summarizing detection confidence
    pub fn weight(&self) -> f32 {
        match self {
            Self::Exact => 1.0,
            Self::Fuzzy => 0.7,
            Self::Contextual => 0.4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Contextual => "contextual",
        }
    }
}

/// Tone of the text surrounding a mention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionSentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
    Mixed,
}

/// A detected brand occurrence. Offsets are byte offsets into the response text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandMatch {
    pub start: usize,
    pub end: usize,
    /// Text exactly as it appears in the response
    pub text: String,
    /// Configured variation this occurrence was matched against
    pub variation: String,
    pub confidence: MatchConfidence,
    #[serde(default)]
    pub sentiment: MentionSentiment,
}

// =============================================================================
// Rank Estimates
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankMethod {
    /// Index of the enumerated list item holding the first mention
    ListIndex,
    /// Explicit ordinal ("#2", "ranked third") in the mentioning sentence
    OrdinalPhrase,
    /// Index of the paragraph holding the first mention
    ParagraphOrder,
    /// Mentions exist but no usable position could be inferred
    NoneFound,
}

impl RankMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListIndex => "list-index",
            Self::OrdinalPhrase => "ordinal-phrase",
            Self::ParagraphOrder => "paragraph-order",
            Self::NoneFound => "none-found",
        }
    }
}

impl std::str::FromStr for RankMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list-index" => Ok(Self::ListIndex),
            "ordinal-phrase" => Ok(Self::OrdinalPhrase),
            "paragraph-order" => Ok(Self::ParagraphOrder),
            "none-found" => Ok(Self::NoneFound),
            other => Err(format!("Unknown rank method: {}", other)),
        }
    }
}

/// Best-effort position of the brand inside one response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEstimate {
    /// 1-based position, `None` when nothing usable was found
    pub position: Option<u32>,
    pub method: RankMethod,
}

impl RankEstimate {
    pub fn at(position: u32, method: RankMethod) -> Self {
        Self {
            position: Some(position),
            method,
        }
    }

    pub fn unranked() -> Self {
        Self {
            position: None,
            method: RankMethod::NoneFound,
        }
    }
}

// =============================================================================
// Provider Results
// =============================================================================

/// Normalized body of a successful provider call plus its analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub matches: Vec<BrandMatch>,
    #[serde(default)]
    pub rank: Option<RankEstimate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProviderOutcome {
    Success(ProviderResponse),
    Failure { error: ProviderError },
}

/// One provider's answer to one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: ProviderKind,
    pub model: String,
    pub latency_ms: u64,
    pub outcome: ProviderOutcome,
}

impl ProviderResult {
    pub fn succeeded(
        provider: ProviderKind,
        model: impl Into<String>,
        latency_ms: u64,
        text: impl Into<String>,
        usage: TokenUsage,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            latency_ms,
            outcome: ProviderOutcome::Success(ProviderResponse {
                text: text.into(),
                usage,
                cost_usd: 0.0,
                matches: Vec::new(),
                rank: None,
            }),
        }
    }

    pub fn failed(
        provider: ProviderKind,
        model: impl Into<String>,
        latency_ms: u64,
        error: ProviderError,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            latency_ms,
            outcome: ProviderOutcome::Failure { error },
        }
    }

    /// Attach detection results. No-op for failed results.
    pub fn with_analysis(mut self, matches: Vec<BrandMatch>, rank: Option<RankEstimate>) -> Self {
        if let ProviderOutcome::Success(response) = &mut self.outcome {
            // A rank without a match is meaningless
            response.rank = if matches.is_empty() { None } else { rank };
            response.matches = matches;
        }
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        if let ProviderOutcome::Success(response) = &mut self.outcome {
            response.cost_usd = cost_usd;
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProviderOutcome::Success(_))
    }

    pub fn response(&self) -> Option<&ProviderResponse> {
        match &self.outcome {
            ProviderOutcome::Success(response) => Some(response),
            ProviderOutcome::Failure { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.response().map(|r| r.text.as_str())
    }

    pub fn matches(&self) -> &[BrandMatch] {
        self.response().map(|r| r.matches.as_slice()).unwrap_or(&[])
    }

    pub fn rank(&self) -> Option<&RankEstimate> {
        self.response().and_then(|r| r.rank.as_ref())
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match &self.outcome {
            ProviderOutcome::Failure { error } => Some(error),
            ProviderOutcome::Success(_) => None,
        }
    }

    pub fn brand_found(&self) -> bool {
        !self.matches().is_empty()
    }

    pub fn cost_usd(&self) -> f64 {
        self.response().map(|r| r.cost_usd).unwrap_or(0.0)
    }
}

// =============================================================================
// Query Report
// =============================================================================

/// Immutable aggregate of one query across all configured providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    query: Query,
    target_brand: String,
    results: Vec<ProviderResult>,
    timestamp: DateTime<Utc>,
}

impl QueryReport {
    /// Assemble a report stamped with the current time.
    ///
    /// `results` must already be in configured provider order.
    pub fn assemble(query: Query, target_brand: impl Into<String>, results: Vec<ProviderResult>) -> Self {
        Self::with_timestamp(query, target_brand, results, Utc::now())
    }

    pub fn with_timestamp(
        query: Query,
        target_brand: impl Into<String>,
        results: Vec<ProviderResult>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            query,
            target_brand: target_brand.into(),
            results,
            timestamp,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn target_brand(&self) -> &str {
        &self.target_brand
    }

    pub fn results(&self) -> &[ProviderResult] {
        &self.results
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn result_for(&self, provider: ProviderKind) -> Option<&ProviderResult> {
        self.results.iter().find(|r| r.provider == provider)
    }

    pub fn brand_found(&self) -> bool {
        self.results.iter().any(ProviderResult::brand_found)
    }

    pub fn total_matches(&self) -> usize {
        self.results.iter().map(|r| r.matches().len()).sum()
    }

    /// Lowest (best) rank position across all providers
    pub fn best_rank(&self) -> Option<u32> {
        self.results
            .iter()
            .filter_map(|r| r.rank().and_then(|rank| rank.position))
            .min()
    }

    pub fn successful_providers(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_providers(&self) -> impl Iterator<Item = &ProviderResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Share of successful providers that mentioned the brand, weighted by
    /// the strongest match tier each one produced. 0.0 when nothing succeeded.
    pub fn detection_confidence(&self) -> f32 {
        let successful = self.successful_providers();
        if successful == 0 {
            return 0.0;
        }
        let weighted: f32 = self
            .results
            .iter()
            .filter_map(|r| r.matches().iter().map(|m| m.confidence).min())
            .map(|c| c.weight())
            .sum();
        weighted / successful as f32
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.results.iter().map(ProviderResult::cost_usd).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderErrorKind;

    fn exact_match(start: usize) -> BrandMatch {
        BrandMatch {
            start,
            end: start + 9,
            text: "DataTobiz".to_string(),
            variation: "DataTobiz".to_string(),
            confidence: MatchConfidence::Exact,
            sentiment: MentionSentiment::Neutral,
        }
    }

    #[test]
    fn test_failed_result_ignores_analysis() {
        let failed = ProviderResult::failed(
            ProviderKind::Gemini,
            "gemini-pro",
            12,
            ProviderError::new(ProviderErrorKind::Auth, "bad key"),
        )
        .with_analysis(vec![exact_match(0)], Some(RankEstimate::at(1, RankMethod::ListIndex)));

        assert!(!failed.is_success());
        assert!(failed.matches().is_empty());
        assert!(failed.rank().is_none());
        assert_eq!(failed.error().map(|e| e.kind), Some(ProviderErrorKind::Auth));
    }

    #[test]
    fn test_rank_dropped_without_matches() {
        let result = ProviderResult::succeeded(
            ProviderKind::Openai,
            "gpt-3.5-turbo",
            5,
            "nothing here",
            TokenUsage::default(),
        )
        .with_analysis(Vec::new(), Some(RankEstimate::at(1, RankMethod::ParagraphOrder)));
        assert!(result.rank().is_none());
    }

    #[test]
    fn test_report_aggregates() {
        let hit = ProviderResult::succeeded(
            ProviderKind::Openai,
            "gpt-3.5-turbo",
            5,
            "DataTobiz",
            TokenUsage::default(),
        )
        .with_analysis(vec![exact_match(0)], Some(RankEstimate::at(3, RankMethod::ListIndex)));
        let miss = ProviderResult::succeeded(
            ProviderKind::Perplexity,
            "sonar",
            7,
            "no brand",
            TokenUsage::default(),
        );
        let report = QueryReport::assemble(Query::new("best data firms"), "DataTobiz", vec![hit, miss]);

        assert!(report.brand_found());
        assert_eq!(report.total_matches(), 1);
        assert_eq!(report.best_rank(), Some(3));
        assert_eq!(report.successful_providers(), 2);
        assert!((report.detection_confidence() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rank_method_strings() {
        for method in [
            RankMethod::ListIndex,
            RankMethod::OrdinalPhrase,
            RankMethod::ParagraphOrder,
            RankMethod::NoneFound,
        ] {
            assert_eq!(method.as_str().parse::<RankMethod>(), Ok(method));
        }
    }
}
