use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::price::PricePoint;

/// A source of stock and index quotes.
///
/// Prices are returned in the instrument's native currency. Each provider
/// is swappable: `QuoteProviderRegistry` tries them in order.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name (for logs and errors).
    fn name(&self) -> &str;

    /// Latest available price.
    async fn get_current_price(&self, symbol: &str) -> Result<f64, CoreError>;

    /// Closing price on `date`, or the nearest trading day if the
    /// market was closed.
    async fn get_historical_price(&self, symbol: &str, date: NaiveDate) -> Result<f64, CoreError>;

    /// Daily closes for `from..=to`, sorted by date.
    async fn get_price_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError>;
}
