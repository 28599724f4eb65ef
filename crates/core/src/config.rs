use crate::errors::CoreError;
use crate::models::settings::{RateLimitSettings, Settings};

/// Process-level configuration read from the environment (and `.env`).
///
/// Everything here is optional; present values override the settings
/// stored in the journal file when passed to `TradeJournal::with_config`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalConfig {
    pub alphavantage_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub benchmark_symbol: Option<String>,
    pub quote_max_concurrent: Option<usize>,
    pub quote_requests_per_minute: Option<u32>,
}

impl JournalConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            alphavantage_api_key: get("ALPHAVANTAGE_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL"),
            benchmark_symbol: get("BENCHMARK_SYMBOL").map(|s| s.to_uppercase()),
            quote_max_concurrent: parse_positive("QUOTE_MAX_CONCURRENT", get("QUOTE_MAX_CONCURRENT"))?,
            quote_requests_per_minute: parse_positive("QUOTE_REQUESTS_PER_MINUTE", get("QUOTE_REQUESTS_PER_MINUTE"))?,
        })
    }

    /// Overlay the configured values onto journal settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(key) = &self.alphavantage_api_key {
            settings.api_keys.insert("alphavantage".to_string(), key.clone());
        }
        if let Some(key) = &self.openai_api_key {
            settings.api_keys.insert("openai".to_string(), key.clone());
        }
        if let Some(model) = &self.openai_model {
            settings.feedback_model = Some(model.clone());
        }
        if let Some(symbol) = &self.benchmark_symbol {
            settings.benchmark_symbol = symbol.clone();
        }
        let RateLimitSettings {
            max_concurrent,
            requests_per_minute,
        } = &mut settings.quote_rate_limit;
        if let Some(n) = self.quote_max_concurrent {
            *max_concurrent = n;
        }
        if let Some(rpm) = self.quote_requests_per_minute {
            *requests_per_minute = rpm;
        }
    }
}

fn parse_positive<T>(key: &str, value: Option<String>) -> Result<Option<T>, CoreError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value {
        None => Ok(None),
        Some(raw) => match raw.parse::<T>() {
            Ok(n) if n > T::default() => Ok(Some(n)),
            _ => Err(CoreError::Config(format!("{key} must be a positive integer (got '{raw}')"))),
        },
    }
}
