//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Error Families
//!
//! - **ProviderError**: one LLM provider failed one query. Always recovered
//!   into a failed `ProviderResult`, never propagated past the orchestrator.
//! - **PersistenceError**: the result store rejected a write. Transient errors
//!   are retried inside the sink; permanent ones reach the caller.
//! - **MonitorError**: everything else (config, IO, storage plumbing).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Provider Errors
// =============================================================================

/// Failure classification for a single provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The call did not finish within the per-provider timeout
    Timeout,
    /// Credentials missing, invalid, or lacking permission
    Auth,
    /// Provider throttled the request or the quota is exhausted
    RateLimit,
    /// The provider answered but the body could not be understood
    MalformedResponse,
    /// Anything else (network, 5xx, panics in adapter code)
    Unknown,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::MalformedResponse => "malformed_response",
            Self::Unknown => "unknown",
        }
    }

    /// Recommended wait before the caller re-submits the query
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(30),
            Self::Timeout => Duration::from_secs(5),
            Self::Unknown => Duration::from_secs(2),
            _ => Duration::from_millis(500),
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(Self::Timeout),
            "auth" => Ok(Self::Auth),
            "rate_limit" => Ok(Self::RateLimit),
            "malformed_response" => Ok(Self::MalformedResponse),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("Unknown provider error kind: {}", other)),
        }
    }
}

/// Classified provider failure with context and retry hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (from `Retry-After`, if any)
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.kind, self.message)
        } else {
            write!(f, "[{}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        kind: ProviderErrorKind,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    pub fn timeout(provider: impl Into<String>, duration: Duration) -> Self {
        Self::with_provider(
            ProviderErrorKind::Timeout,
            format!("no response within {:?}", duration),
            provider,
        )
    }

    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_provider(ProviderErrorKind::MalformedResponse, message, provider)
    }

    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn recommended_delay(&self) -> Duration {
        self.retry_after
            .unwrap_or_else(|| self.kind.recommended_delay())
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps transport-level failures onto `ProviderErrorKind`
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify HTTP status code directly
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> ProviderError {
        match status {
            429 => ProviderError::with_provider(ProviderErrorKind::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => ProviderError::with_provider(ProviderErrorKind::Auth, message, provider),
            408 | 504 => ProviderError::with_provider(ProviderErrorKind::Timeout, message, provider),
            _ => ProviderError::with_provider(ProviderErrorKind::Unknown, message, provider),
        }
    }

    /// Classify a reqwest transport error
    pub fn classify_transport(err: &reqwest::Error, provider: &str) -> ProviderError {
        if err.is_timeout() {
            ProviderError::with_provider(ProviderErrorKind::Timeout, err.to_string(), provider)
        } else if err.is_decode() {
            ProviderError::malformed(provider, err.to_string())
        } else if let Some(status) = err.status() {
            Self::classify_http_status(status.as_u16(), &err.to_string(), provider)
        } else {
            ProviderError::with_provider(ProviderErrorKind::Unknown, err.to_string(), provider)
        }
    }

    /// Classify a provider message when no status code is available
    pub fn classify_message(message: &str, provider: &str) -> ProviderError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("quota")
            || lower.contains("resource_exhausted")
        {
            return ProviderError::with_provider(ProviderErrorKind::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30));
        }

        if lower.contains("api key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
            || lower.contains("unauthenticated")
        {
            return ProviderError::with_provider(ProviderErrorKind::Auth, message, provider);
        }

        if lower.contains("timed out") || lower.contains("deadline exceeded") {
            return ProviderError::with_provider(ProviderErrorKind::Timeout, message, provider);
        }

        ProviderError::with_provider(ProviderErrorKind::Unknown, message, provider)
    }
}

// =============================================================================
// Persistence Errors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceErrorKind {
    /// Store temporarily unavailable; safe to retry
    Transient,
    /// Invalid credentials, missing store, rejected payload; retrying won't help
    Permanent,
}

/// Failure to append a report to the result store
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind:?} persistence error: {message}")]
pub struct PersistenceError {
    pub kind: PersistenceErrorKind,
    pub message: String,
    /// Write attempts made before giving up
    pub attempts: u32,
}

impl PersistenceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: PersistenceErrorKind::Transient,
            message: message.into(),
            attempts: 0,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: PersistenceErrorKind::Permanent,
            message: message.into(),
            attempts: 0,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == PersistenceErrorKind::Transient
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Map an HTTP status from a remote store onto a persistence error
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let message = format!("store returned HTTP {}: {}", status, body);
        match status {
            408 | 429 | 500..=599 => Self::transient(message),
            _ => Self::permanent(message),
        }
    }
}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_http_status(status.as_u16(), &err.to_string()),
            None if err.is_decode() => Self::permanent(err.to_string()),
            // Connect/timeout/body errors without a status are network-level
            None => Self::transient(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::transient(err.to_string())
            }
            _ => Self::permanent(err.to_string()),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum MonitorError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Row format error: {0}")]
    RowFormat(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ProviderError> for MonitorError {
    fn from(err: ProviderError) -> Self {
        MonitorError::Provider(err)
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| MonitorError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| MonitorError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
