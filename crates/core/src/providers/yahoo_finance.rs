use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use time::OffsetDateTime;

use super::traits::QuoteProvider;
use crate::errors::CoreError;
use crate::models::price::PricePoint;

const PROVIDER: &str = "Yahoo Finance";

/// Yahoo Finance quotes for equities, ETFs and indices (e.g. `^GSPC`).
///
/// No API key; wraps the public chart endpoints through `yahoo_finance_api`.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| api_error(format!(
            "Failed to create connector: {e}"
        )))?;
        Ok(Self { connector })
    }

    /// Midnight UTC of `date` as a `time` datetime, as the connector expects.
    fn midnight_utc(date: NaiveDate) -> Result<OffsetDateTime, CoreError> {
        let month = time::Month::try_from(date.month() as u8)
            .map_err(|e| api_error(format!("Invalid month in {date}: {e}")))?;
        let day = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
            .map_err(|e| api_error(format!("Invalid date {date}: {e}")))?;
        Ok(day.midnight().assume_utc())
    }

    fn quote_date(timestamp: i64) -> Option<NaiveDate> {
        chrono::DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
    }

    async fn history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to_exclusive: NaiveDate,
    ) -> Result<Vec<yahoo_finance_api::Quote>, CoreError> {
        let start = Self::midnight_utc(from)?;
        let end = Self::midnight_utc(to_exclusive)?;
        let resp = self
            .connector
            .get_quote_history(symbol, start, end)
            .await
            .map_err(|e| api_error(format!("History request for {symbol} failed: {e}")))?;
        resp.quotes()
            .map_err(|e| api_error(format!("Unreadable history for {symbol}: {e}")))
    }
}

fn api_error(message: String) -> CoreError {
    CoreError::Api {
        provider: PROVIDER.into(),
        message,
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64, CoreError> {
        let resp = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| api_error(format!("Latest quote for {symbol} failed: {e}")))?;
        let quote = resp
            .last_quote()
            .map_err(|e| api_error(format!("No quote data for {symbol}: {e}")))?;
        Ok(quote.close)
    }

    async fn get_historical_price(&self, symbol: &str, date: NaiveDate) -> Result<f64, CoreError> {
        // Look back a few days so weekends and holidays resolve to the prior close.
        let quotes = self
            .history(symbol, date - Duration::days(4), date + Duration::days(1))
            .await?;

        quotes
            .iter()
            .filter_map(|q| Self::quote_date(q.timestamp as i64).map(|d| (d, q.close)))
            .filter(|(d, _)| *d <= date)
            .max_by_key(|(d, _)| *d)
            .map(|(_, close)| close)
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
                date: date.to_string(),
            })
    }

    async fn get_price_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let quotes = self.history(symbol, from, to + Duration::days(1)).await?;

        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let date = Self::quote_date(q.timestamp as i64)?;
                (date >= from && date <= to).then_some(PricePoint {
                    date,
                    price: q.close,
                })
            })
            .collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}
