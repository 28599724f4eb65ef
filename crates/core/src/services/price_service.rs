use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::price::{PriceCache, PricePoint};
use crate::models::settings::RateLimitSettings;
use crate::providers::registry::QuoteProviderRegistry;
use crate::providers::traits::QuoteProvider;
use crate::services::rate_limiter::RateLimiter;

/// Days of slack allowed at either end of a cached range (weekends, holidays).
const RANGE_TOLERANCE_DAYS: i64 = 3;

/// Fetches quotes through the provider registry, with caching.
///
/// Cache strategy:
/// - **Past dates**: fetched once, cached forever.
/// - **Today**: fetched at most once per day unless explicitly refreshed.
///
/// Every outbound call waits on the `RateLimiter` first.
pub struct PriceService {
    registry: QuoteProviderRegistry,
    limiter: RateLimiter,
}

impl PriceService {
    pub fn new(registry: QuoteProviderRegistry) -> Self {
        Self {
            registry,
            limiter: RateLimiter::default(),
        }
    }

    pub fn with_rate_limit(registry: QuoteProviderRegistry, limits: &RateLimitSettings) -> Self {
        Self {
            registry,
            limiter: RateLimiter::from_settings(limits),
        }
    }

    pub fn has_providers(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Price of `symbol` on `date`: cache first, then providers in order.
    pub async fn get_price(
        &self,
        cache: &mut PriceCache,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<f64, CoreError> {
        let today = chrono::Utc::now().date_naive();

        if let Some(price) = cache.get_price(symbol, date) {
            if date < today || cache.is_today_fresh(symbol, today) {
                tracing::debug!(symbol, %date, "price cache hit");
                return Ok(price);
            }
        }

        let price = self.fetch_price(symbol, date, today).await?;

        cache.set_price(symbol, date, price);
        if date >= today {
            cache.mark_updated_today(symbol, today);
        }
        Ok(price)
    }

    /// Like `get_price`, but a provider failure falls back to the latest
    /// cached close on or before `date`. Lets valuations run offline.
    pub async fn get_price_or_cached(
        &self,
        cache: &mut PriceCache,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<f64, CoreError> {
        match self.get_price(cache, symbol, date).await {
            Ok(price) => Ok(price),
            Err(e) => match cache.get_price_on_or_before(symbol, date) {
                Some(point) => {
                    tracing::warn!(symbol, %date, stale_from = %point.date, error = %e, "using stale cached price");
                    Ok(point.price)
                }
                None => Err(e),
            },
        }
    }

    /// Daily closes for a range. Served from cache when the cached points
    /// reach both ends of the range (within a few days). Non-finite and
    /// non-positive closes from a provider are dropped, never cached.
    pub async fn get_price_range(
        &self,
        cache: &mut PriceCache,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        if from > to {
            return Err(CoreError::ValidationError(format!(
                "'from' date ({from}) must not be after 'to' date ({to})"
            )));
        }

        let cached = cache.get_price_range(symbol, from, to);
        if let (Some(first), Some(last)) = (cached.first(), cached.last()) {
            if cached.len() >= 2
                && (first.date - from).num_days() <= RANGE_TOLERANCE_DAYS
                && (to - last.date).num_days() <= RANGE_TOLERANCE_DAYS
            {
                return Ok(cached);
            }
        }

        let providers = self.registry.providers();
        if providers.is_empty() {
            return Err(CoreError::NoProvider);
        }

        let mut last_error = None;
        for provider in providers {
            let _guard = self.limiter.acquire().await?;
            match provider.get_price_range(symbol, from, to).await {
                Ok(mut points) => {
                    let received = points.len();
                    points.retain(|p| p.price.is_finite() && p.price > 0.0);
                    if points.len() < received {
                        tracing::warn!(
                            provider = provider.name(),
                            symbol,
                            dropped = received - points.len(),
                            "discarding invalid prices in range"
                        );
                    }
                    cache.set_prices(symbol, &points);
                    return Ok(points);
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), symbol, error = %e, "range fetch failed, trying next provider");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::NoProvider))
    }

    /// Try each provider in order until one returns a usable price.
    async fn fetch_price(&self, symbol: &str, date: NaiveDate, today: NaiveDate) -> Result<f64, CoreError> {
        let providers = self.registry.providers();
        if providers.is_empty() {
            return Err(CoreError::NoProvider);
        }

        let mut last_error = None;
        for provider in providers {
            let _guard = self.limiter.acquire().await?;
            match Self::fetch_from(provider, symbol, date, today).await {
                Ok(price) if price.is_finite() && price > 0.0 => return Ok(price),
                Ok(price) => {
                    last_error = Some(CoreError::Api {
                        provider: provider.name().to_string(),
                        message: format!("Invalid price for {symbol}: {price}"),
                    });
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), symbol, %date, error = %e, "quote fetch failed, trying next provider");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::NoProvider))
    }

    async fn fetch_from(
        provider: &dyn QuoteProvider,
        symbol: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<f64, CoreError> {
        if date >= today {
            provider.get_current_price(symbol).await
        } else {
            provider.get_historical_price(symbol, date).await
        }
    }
}
