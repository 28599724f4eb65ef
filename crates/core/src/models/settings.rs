use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default benchmark: an S&P 500 tracking ETF, quoted by every provider.
pub const DEFAULT_BENCHMARK: &str = "SPY";

/// Client-side limits applied to quote API calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum requests in flight at once
    pub max_concurrent: usize,
    /// Maximum requests started per minute
    pub requests_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            requests_per_minute: 30,
        }
    }
}

/// User-configurable settings, stored inside the encrypted journal file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Display currency label (e.g., "USD"). Quotes are used as returned.
    pub currency: String,

    /// Symbol of the index (or index ETF) used for benchmark comparison
    pub benchmark_symbol: String,

    /// Keys: provider name ("alphavantage", "openai"). Values: API key.
    pub api_keys: HashMap<String, String>,

    pub quote_rate_limit: RateLimitSettings,

    /// Account equity used for position sizing, if the user set one
    #[serde(default)]
    pub account_size: Option<f64>,

    /// Percent of the account risked per trade when sizing (e.g., 1.0 = 1%)
    pub default_risk_pct: f64,

    /// Chat model used for narrative feedback
    #[serde(default)]
    pub feedback_model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            benchmark_symbol: DEFAULT_BENCHMARK.to_string(),
            api_keys: HashMap::new(),
            quote_rate_limit: RateLimitSettings::default(),
            account_size: None,
            default_risk_pct: 1.0,
            feedback_model: None,
        }
    }
}
