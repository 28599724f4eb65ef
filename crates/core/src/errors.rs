use thiserror::Error;

/// Unified error type for the trade-journal-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage / File ──────────────────────────────────────────────
    #[error("Invalid journal file: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported journal file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: wrong password or corrupted file")]
    Decryption,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("CSV error: {0}")]
    Csv(String),

    // ── Quotes / Network ────────────────────────────────────────────
    #[error("Quote API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No quote provider configured")]
    NoProvider,

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Price not available for {symbol} on {date}")]
    PriceNotAvailable { symbol: String, date: String },

    // ── Narrative feedback ──────────────────────────────────────────
    #[error("Feedback provider not configured (set an OpenAI API key)")]
    FeedbackUnavailable,

    #[error("Feedback error ({provider}): {message}")]
    Feedback { provider: String, message: String },

    // ── Journal logic ───────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Trade not found: {0}")]
    TradeNotFound(String),

    #[error("Exit not found: {0}")]
    ExitNotFound(String),

    #[error("Purchase not found: {0}")]
    PurchaseNotFound(String),

    #[error("Screenshot not found: {0}")]
    ScreenshotNotFound(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        CoreError::Csv(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL; quote APIs take the key as a query param.
        CoreError::Network(redact_query(&e.to_string()))
    }
}

impl From<aes_gcm::Error> for CoreError {
    fn from(_: aes_gcm::Error) -> Self {
        CoreError::Decryption
    }
}

/// Strip everything after the first `?` so API keys never reach logs.
pub(crate) fn redact_query(msg: &str) -> String {
    match msg.find('?') {
        Some(idx) => format!("{}?<query redacted>", &msg[..idx]),
        None => msg.to_string(),
    }
}
