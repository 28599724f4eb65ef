// ═══════════════════════════════════════════════════════════════════
// Shared test doubles: quote providers, feedback provider, helpers
// ═══════════════════════════════════════════════════════════════════

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trade_journal_core::errors::CoreError;
use trade_journal_core::models::price::PricePoint;
use trade_journal_core::models::settings::RateLimitSettings;
use trade_journal_core::providers::registry::QuoteProviderRegistry;
use trade_journal_core::providers::traits::QuoteProvider;
use trade_journal_core::services::feedback_service::FeedbackProvider;
use trade_journal_core::services::price_service::PriceService;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

/// Limits high enough that tests never wait on the request spacing.
pub fn fast_limits() -> RateLimitSettings {
    RateLimitSettings {
        max_concurrent: 4,
        requests_per_minute: 60_000,
    }
}

// ── Quote providers ─────────────────────────────────────────────────

/// Serves prices from a fixed (symbol, date) table and counts calls.
pub struct MockQuoteProvider {
    prices: HashMap<(String, NaiveDate), f64>,
    calls: Arc<AtomicUsize>,
}

impl MockQuoteProvider {
    pub fn new(prices: &[(&str, NaiveDate, f64)]) -> Self {
        Self {
            prices: prices
                .iter()
                .map(|(s, d, p)| ((s.to_string(), *d), *p))
                .collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle to the call counter, readable after the provider is boxed.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn not_available(symbol: &str, date: &str) -> CoreError {
        CoreError::PriceNotAvailable {
            symbol: symbol.to_string(),
            date: date.to_string(),
        }
    }
}

#[async_trait]
impl QuoteProvider for MockQuoteProvider {
    fn name(&self) -> &str {
        "MockQuotes"
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .max_by_key(|((_, d), _)| *d)
            .map(|(_, p)| *p)
            .ok_or_else(|| Self::not_available(symbol, "current"))
    }

    async fn get_historical_price(&self, symbol: &str, date: NaiveDate) -> Result<f64, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .get(&(symbol.to_string(), date))
            .copied()
            .ok_or_else(|| Self::not_available(symbol, &date.to_string()))
    }

    async fn get_price_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut points: Vec<PricePoint> = self
            .prices
            .iter()
            .filter(|((s, d), _)| s == symbol && *d >= from && *d <= to)
            .map(|((_, d), p)| PricePoint { date: *d, price: *p })
            .collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

/// Always fails; used to exercise provider fallback.
pub struct FailingQuoteProvider;

#[async_trait]
impl QuoteProvider for FailingQuoteProvider {
    fn name(&self) -> &str {
        "FailingQuotes"
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64, CoreError> {
        Err(CoreError::Api {
            provider: "FailingQuotes".into(),
            message: format!("Simulated failure for {symbol}"),
        })
    }

    async fn get_historical_price(&self, symbol: &str, _date: NaiveDate) -> Result<f64, CoreError> {
        Err(CoreError::Api {
            provider: "FailingQuotes".into(),
            message: format!("Simulated failure for {symbol}"),
        })
    }

    async fn get_price_range(
        &self,
        _symbol: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        Err(CoreError::Api {
            provider: "FailingQuotes".into(),
            message: "Simulated failure".into(),
        })
    }
}

pub fn registry_with(provider: impl QuoteProvider + 'static) -> QuoteProviderRegistry {
    let mut registry = QuoteProviderRegistry::new();
    registry.register(Box::new(provider));
    registry
}

pub fn price_service_with(provider: impl QuoteProvider + 'static) -> PriceService {
    PriceService::with_rate_limit(registry_with(provider), &fast_limits())
}

// ── Feedback provider ───────────────────────────────────────────────

/// Echoes a canned reply and records every prompt it receives.
pub struct MockFeedbackProvider {
    reply: String,
    prompts: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl MockFeedbackProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Arc<parking_lot::Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl FeedbackProvider for MockFeedbackProvider {
    fn name(&self) -> &str {
        "MockCoach"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}
