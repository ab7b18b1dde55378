pub mod error;
pub mod report;

pub use error::{
    ErrorClassifier, MonitorError, PersistenceError, PersistenceErrorKind, ProviderError,
    ProviderErrorKind, Result, ResultExt,
};
pub use report::{
    BrandMatch, MatchConfidence, MentionSentiment, ProviderOutcome, ProviderResponse,
    ProviderResult, Query, QueryReport, RankEstimate, RankMethod,
};

// =============================================================================
// Provider Identifiers
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

/// Recognized LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Openai,
    Perplexity,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Openai, Self::Perplexity, Self::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Perplexity => "perplexity",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable consulted when no API key is configured
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Openai => "OPENAI_API_KEY",
            Self::Perplexity => "PERPLEXITY_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "perplexity" => Ok(Self::Perplexity),
            "gemini" => Ok(Self::Gemini),
            _ => Err(format!(
                "Unknown provider: {}. Supported: openai, perplexity, gemini",
                s
            )),
        }
    }
}
