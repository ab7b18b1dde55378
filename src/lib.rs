//! BrandPulse - Brand Mention Monitoring for LLM Search
//!
//! Sends search-style queries to several LLM providers at once, finds where
//! the target brand is mentioned in each answer, estimates its rank, and
//! appends one row per provider answer to a spreadsheet.
//!
//! ## Quick Start
//!
//! ```ignore
//! use brandpulse::{Config, ConfigLoader, Orchestrator, Query, ResultSink};
//!
//! let config = ConfigLoader::load(None)?;
//! let orchestrator = Orchestrator::from_config(&config)?;
//! let sink = ResultSink::from_config(&config.storage)?;
//!
//! let report = orchestrator.run(&Query::new("best data analytics consultancies")).await;
//! sink.persist(&report).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider adapters (OpenAI, Perplexity, Gemini), timeouts, usage metrics
//! - [`detect`]: exact, fuzzy and contextual brand detection
//! - [`rank`]: list, ordinal and paragraph rank heuristics
//! - [`monitor`]: concurrent fan-out, batching and response caching
//! - [`storage`]: row stores (Google Sheets, SQLite, memory) and the retrying sink
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod detect;
pub mod monitor;
pub mod rank;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, StorageBackend};

// Error Types
pub use types::error::{MonitorError, PersistenceError, ProviderError, Result, ResultExt};

// Data Model
pub use types::{
    BrandMatch, MatchConfidence, ProviderKind, ProviderResult, Query, QueryReport, RankEstimate,
    RankMethod,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use detect::BrandDetector;
pub use monitor::{BatchOutcome, BatchSummary, MonitorSettings, Orchestrator, ResponseCache};
pub use rank::RankEstimator;
pub use storage::{PersistReceipt, ResultSink, RetryPolicy, RowStore, SharedStore};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    LlmProvider, MetricsCollector, SharedMetrics, SharedProvider, create_enabled_providers,
    with_timeout,
};
