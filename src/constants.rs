//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Provider adapter constants
pub mod provider {
    /// Default per-provider timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: f64 = 60.0;

    /// Upper bound accepted for the per-provider timeout (seconds)
    pub const MAX_TIMEOUT_SECS: f64 = 3600.0;

    /// Default completion budget per request
    pub const DEFAULT_MAX_TOKENS: usize = 1000;

    /// Default sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.1;

    /// Default number of queries processed concurrently in a batch
    pub const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 4;

    /// System prompt sent to chat-style providers
    pub const SYSTEM_PROMPT: &str = "You are a helpful search assistant. Answer the query with \
        concrete, named recommendations. When listing companies, products or services, use a \
        numbered list ordered from most to least relevant.";
}

/// Brand detection constants
pub mod detection {
    /// Bytes on either side of a mention scanned for context keywords
    pub const DEFAULT_CONTEXT_WINDOW: usize = 200;

    /// Collapsed keys shorter than this must match exactly
    pub const MIN_FUZZY_KEY_LEN: usize = 5;

    /// Collapsed keys at least this long tolerate two edits instead of one
    pub const LONG_KEY_LEN: usize = 10;

    /// Extra words a fuzzy window may span beyond the variation's own word count
    pub const EXTRA_WINDOW_TOKENS: usize = 1;
}

/// Rank estimation constants
pub mod ranking {
    /// Positions above this are reported as unranked
    pub const DEFAULT_MAX_POSITION: u32 = 20;

    /// Minimum marker lines before text counts as a list
    pub const MIN_LIST_ITEMS: usize = 2;
}

/// Result sink constants
pub mod sink {
    /// Default retries after the first failed write
    pub const DEFAULT_RETRY_LIMIT: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Default worksheet name
    pub const DEFAULT_WORKSHEET: &str = "Brand_Monitoring_New";
}

/// Per-provider pricing in USD per 1K tokens (input, output)
pub mod pricing {
    pub const OPENAI_INPUT_PER_1K: f64 = 0.0005;
    pub const OPENAI_OUTPUT_PER_1K: f64 = 0.0015;

    pub const PERPLEXITY_INPUT_PER_1K: f64 = 0.001;
    pub const PERPLEXITY_OUTPUT_PER_1K: f64 = 0.001;

    pub const GEMINI_INPUT_PER_1K: f64 = 0.000125;
    pub const GEMINI_OUTPUT_PER_1K: f64 = 0.000375;
}

/// HTTP/Network constants
pub mod network {
    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

    /// Timeout for health-check probes (seconds)
    pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;
}
