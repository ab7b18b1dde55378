//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Defaults target the DataTobiz brand.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{detection, provider, ranking, sink};
use crate::types::{MonitorError, ProviderKind, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Target brand and detection vocabulary
    pub brand: BrandConfig,

    /// Orchestration settings
    pub monitor: MonitorConfig,

    /// Per-provider credentials and model settings
    pub providers: ProvidersConfig,

    /// Rank estimation settings
    pub ranking: RankingConfig,

    /// Result store settings
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            brand: BrandConfig::default(),
            monitor: MonitorConfig::default(),
            providers: ProvidersConfig::default(),
            ranking: RankingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `MonitorError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.brand.target_brand.trim().is_empty() {
            return Err(MonitorError::config("brand.target_brand must not be empty"));
        }

        if self.monitor.enabled_providers.is_empty() {
            return Err(MonitorError::config(
                "monitor.enabled_providers must name at least one provider",
            ));
        }

        for (idx, kind) in self.monitor.enabled_providers.iter().enumerate() {
            if self.monitor.enabled_providers[..idx].contains(kind) {
                return Err(MonitorError::Config(format!(
                    "monitor.enabled_providers lists '{}' more than once",
                    kind
                )));
            }
        }

        let timeout = self.monitor.per_provider_timeout_seconds;
        if !timeout.is_finite() || timeout <= 0.0 || timeout > provider::MAX_TIMEOUT_SECS {
            return Err(MonitorError::Config(format!(
                "monitor.per_provider_timeout_seconds must be in (0, {}], got {}",
                provider::MAX_TIMEOUT_SECS,
                timeout
            )));
        }

        if self.monitor.max_concurrent_queries == 0 {
            return Err(MonitorError::config(
                "monitor.max_concurrent_queries must be greater than 0",
            ));
        }

        for kind in &self.monitor.enabled_providers {
            let settings = self.providers.get(*kind);
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(MonitorError::Config(format!(
                    "providers.{}.temperature must be between 0.0 and 2.0, got {}",
                    kind, settings.temperature
                )));
            }
        }

        if self.ranking.max_position == 0 {
            return Err(MonitorError::config(
                "ranking.max_position must be greater than 0",
            ));
        }

        if self.storage.worksheet_name.trim().is_empty() {
            return Err(MonitorError::config(
                "storage.worksheet_name must not be empty",
            ));
        }

        Ok(())
    }

    /// Detection variations with the target brand itself always included
    pub fn effective_variations(&self) -> Vec<String> {
        let mut variations: Vec<String> = Vec::with_capacity(self.brand.brand_variations.len() + 1);
        let target = self.brand.target_brand.trim().to_string();
        if !target.is_empty() {
            variations.push(target);
        }
        for variation in &self.brand.brand_variations {
            let trimmed = variation.trim();
            if !trimmed.is_empty() && !variations.iter().any(|v| v == trimmed) {
                variations.push(trimmed.to_string());
            }
        }
        variations
    }
}

// =============================================================================
// Brand Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandConfig {
    pub target_brand: String,

    /// Alternate spellings treated as the same brand
    pub brand_variations: Vec<String>,

    /// Words that corroborate a near-miss spelling as a brand mention
    pub context_keywords: Vec<String>,

    pub positive_keywords: Vec<String>,

    pub negative_keywords: Vec<String>,

    /// Bytes on either side of a mention scanned for keywords
    pub context_window: usize,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            target_brand: "DataTobiz".to_string(),
            brand_variations: to_strings(&[
                "DataTobiz",
                "Data Tobiz",
                "data tobiz",
                "DATATOBIZ",
                "DataToBiz",
                "Data-Tobiz",
                "datatobiz.com",
            ]),
            context_keywords: to_strings(&[
                "company",
                "firm",
                "agency",
                "services",
                "solutions",
                "consulting",
                "provider",
                "platform",
            ]),
            positive_keywords: to_strings(&[
                "excellent",
                "outstanding",
                "innovative",
                "reliable",
                "powerful",
                "comprehensive",
                "award-winning",
                "recognized",
                "trusted",
                "proven",
            ]),
            negative_keywords: to_strings(&[
                "poor",
                "bad",
                "disappointing",
                "limited",
                "lacking",
                "outdated",
                "problematic",
                "difficult",
                "complex",
                "unreliable",
            ]),
            context_window: detection::DEFAULT_CONTEXT_WINDOW,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// =============================================================================
// Monitor Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Providers queried on every run, in report order
    pub enabled_providers: Vec<ProviderKind>,

    pub per_provider_timeout_seconds: f64,

    /// Queries in flight at once during a batch
    pub max_concurrent_queries: usize,

    pub enable_ranking_detection: bool,

    pub enable_cost_tracking: bool,

    /// Response cache bucket width; 0 disables caching
    pub cache_bucket_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled_providers: ProviderKind::ALL.to_vec(),
            per_provider_timeout_seconds: provider::DEFAULT_TIMEOUT_SECS,
            max_concurrent_queries: provider::DEFAULT_MAX_CONCURRENT_QUERIES,
            enable_ranking_detection: true,
            enable_cost_tracking: true,
            cache_bucket_seconds: 0,
        }
    }
}

impl MonitorConfig {
    /// Timeout as a `Duration`, capped at `MAX_TIMEOUT_SECS` for unvalidated values
    pub fn per_provider_timeout(&self) -> Duration {
        let max = Duration::from_secs_f64(provider::MAX_TIMEOUT_SECS);
        Duration::try_from_secs_f64(self.per_provider_timeout_seconds).map_or(max, |d| d.min(max))
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderSettings,
    pub perplexity: ProviderSettings,
    pub gemini: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderSettings::with_model("gpt-3.5-turbo"),
            perplexity: ProviderSettings::with_model("sonar"),
            gemini: ProviderSettings::with_model("gemini-pro"),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Openai => &self.openai,
            ProviderKind::Perplexity => &self.perplexity,
            ProviderKind::Gemini => &self.gemini,
        }
    }
}

/// Settings for one provider
///
/// API keys are never serialized to output and are redacted in debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for proxies and tests)
    pub api_base: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl ProviderSettings {
    fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Self::default()
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            api_key: None,
            api_base: None,
            temperature: provider::DEFAULT_TEMPERATURE,
            max_tokens: provider::DEFAULT_MAX_TOKENS,
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

// =============================================================================
// Ranking Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub max_position: u32,
    pub enable_list_detection: bool,
    pub enable_ordinal_detection: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_position: ranking::DEFAULT_MAX_POSITION,
            enable_list_detection: true,
            enable_ordinal_detection: true,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    GoogleSheets,
    Sqlite,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::GoogleSheets => write!(f, "google-sheets"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Google Sheets spreadsheet id (falls back to GOOGLE_SHEETS_SPREADSHEET_ID)
    pub spreadsheet_id: Option<String>,

    /// OAuth2 bearer token (falls back to GOOGLE_SHEETS_ACCESS_TOKEN)
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// Sheets API base URL (for proxies and tests)
    pub api_base: Option<String>,

    pub worksheet_name: String,

    /// Database file for the sqlite backend
    pub sqlite_path: PathBuf,

    /// Retries after the first failed write
    pub retry_limit: usize,

    pub retry_base_delay_ms: u64,

    pub retry_max_delay_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            spreadsheet_id: None,
            access_token: None,
            api_base: None,
            worksheet_name: sink::DEFAULT_WORKSHEET.to_string(),
            sqlite_path: PathBuf::from(".brandpulse/results.db"),
            retry_limit: sink::DEFAULT_RETRY_LIMIT,
            retry_base_delay_ms: sink::BASE_DELAY_MS,
            retry_max_delay_secs: sink::MAX_DELAY_SECS,
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("worksheet_name", &self.worksheet_name)
            .field("sqlite_path", &self.sqlite_path)
            .field("retry_limit", &self.retry_limit)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_secs", &self.retry_max_delay_secs)
            .finish()
    }
}
