use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::traits::QuoteProvider;
use crate::errors::CoreError;
use crate::models::price::PricePoint;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

/// Alpha Vantage quotes (fallback behind Yahoo Finance).
///
/// Needs an API key. The free tier allows 25 requests a day, and the
/// compact daily series only covers the last 100 sessions, so prices
/// are cached aggressively by `PriceService`.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, api_key }
    }

    async fn fetch_daily_series(&self, symbol: &str) -> Result<HashMap<String, DailyBar>, CoreError> {
        let resp: TimeSeriesResponse = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", &symbol.to_uppercase()),
                ("outputsize", "compact"),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| api_error(format!("Unreadable time series for {symbol}: {e}")))?;

        if let Some(note) = resp.note.or(resp.information) {
            return Err(CoreError::RateLimited(format!("{PROVIDER}: {note}")));
        }

        resp.time_series
            .ok_or_else(|| api_error(format!("No time series for {symbol}")))
    }

    /// Parse the series into sorted points, skipping malformed rows.
    fn to_points(series: &HashMap<String, DailyBar>) -> Vec<PricePoint> {
        let mut points: Vec<PricePoint> = series
            .iter()
            .filter_map(|(day, bar)| {
                let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
                let price = bar.close.parse().ok()?;
                Some(PricePoint { date, price })
            })
            .collect();
        points.sort_by_key(|p| p.date);
        points
    }
}

fn api_error(message: String) -> CoreError {
    CoreError::Api {
        provider: PROVIDER.into(),
        message,
    }
}

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}

#[derive(Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyBar>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Deserialize)]
struct DailyBar {
    #[serde(rename = "4. close")]
    close: String,
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64, CoreError> {
        let resp: GlobalQuoteResponse = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", &symbol.to_uppercase()),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| api_error(format!("Unreadable quote for {symbol}: {e}")))?;

        if let Some(note) = resp.note {
            return Err(CoreError::RateLimited(format!("{PROVIDER}: {note}")));
        }

        let raw = resp
            .global_quote
            .and_then(|q| q.price)
            .ok_or_else(|| api_error(format!("No quote data for {symbol}")))?;

        raw.parse()
            .map_err(|e| api_error(format!("Invalid price '{raw}' for {symbol}: {e}")))
    }

    async fn get_historical_price(&self, symbol: &str, date: NaiveDate) -> Result<f64, CoreError> {
        let points = Self::to_points(&self.fetch_daily_series(symbol).await?);
        points
            .iter()
            .rev()
            .find(|p| p.date <= date)
            .map(|p| p.price)
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
        let points = Self::to_points(&self.fetch_daily_series(symbol).await?);
        Ok(points
            .into_iter()
            .filter(|p| p.date >= from && p.date <= to)
            .collect())
    }
}
