//! Monitoring runs: provider fan-out, response caching and batch roll-ups.

pub mod cache;
pub mod orchestrator;
pub mod summary;

pub use cache::ResponseCache;
pub use orchestrator::{MonitorSettings, Orchestrator};
pub use summary::{BatchOutcome, BatchSummary, PersistFailure};
