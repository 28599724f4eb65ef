use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A closing price on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Local cache of quotes, keyed by uppercased symbol.
///
/// Stored inside the encrypted journal so valuations work offline.
/// Past closes never change, so they are fetched once; today's quote
/// is refreshed at most once per day (tracked in `last_updated`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceCache {
    /// symbol → price points sorted by date
    pub entries: HashMap<String, Vec<PricePoint>>,

    /// symbol → day on which today's quote was last fetched
    pub last_updated: HashMap<String, NaiveDate>,

    /// Bumped on every mutation; not persisted.
    #[serde(skip)]
    revision: u64,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_price(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        let points = self.entries.get(&symbol.to_uppercase())?;
        points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| points[idx].price)
    }

    /// Most recent cached close on or before `date`.
    /// Used to value on weekends and holidays without another request.
    pub fn get_price_on_or_before(&self, symbol: &str, date: NaiveDate) -> Option<PricePoint> {
        let points = self.entries.get(&symbol.to_uppercase())?;
        match points.binary_search_by_key(&date, |p| p.date) {
            Ok(idx) => Some(points[idx]),
            Err(0) => None,
            Err(idx) => Some(points[idx - 1]),
        }
    }

    /// Insert or overwrite the price for `date`, keeping points sorted.
    pub fn set_price(&mut self, symbol: &str, date: NaiveDate, price: f64) {
        let points = self.entries.entry(symbol.to_uppercase()).or_default();
        match points.binary_search_by_key(&date, |p| p.date) {
            Ok(idx) if points[idx].price == price => return,
            Ok(idx) => points[idx].price = price,
            Err(idx) => points.insert(idx, PricePoint { date, price }),
        }
        self.revision += 1;
    }

    pub fn set_prices(&mut self, symbol: &str, points: &[PricePoint]) {
        for point in points {
            self.set_price(symbol, point.date, point.price);
        }
    }

    pub fn is_today_fresh(&self, symbol: &str, today: NaiveDate) -> bool {
        self.last_updated
            .get(&symbol.to_uppercase())
            .is_some_and(|&d| d == today)
    }

    pub fn mark_updated_today(&mut self, symbol: &str, today: NaiveDate) {
        if self.last_updated.insert(symbol.to_uppercase(), today) != Some(today) {
            self.revision += 1;
        }
    }

    /// Counter that changes whenever the cache is modified. Lets callers
    /// detect unsaved changes without comparing contents.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn total_entries(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    pub fn symbol_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop every point dated before `before`. Returns how many were removed.
    pub fn prune_before(&mut self, before: NaiveDate) -> usize {
        let mut removed = 0;
        for points in self.entries.values_mut() {
            let split = points
                .binary_search_by_key(&before, |p| p.date)
                .unwrap_or_else(|pos| pos);
            removed += split;
            points.drain(..split);
        }
        self.entries.retain(|_, v| !v.is_empty());
        let entries = &self.entries;
        let markers = self.last_updated.len();
        self.last_updated
            .retain(|symbol, updated| entries.contains_key(symbol) && *updated >= before);
        if removed > 0 || self.last_updated.len() != markers {
            self.revision += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_updated.clear();
        self.revision += 1;
    }

    /// Cached points with `from <= date <= to`.
    pub fn get_price_range(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Vec<PricePoint> {
        let Some(points) = self.entries.get(&symbol.to_uppercase()) else {
            return Vec::new();
        };
        let start = points.partition_point(|p| p.date < from);
        let end = points.partition_point(|p| p.date <= to);
        if start >= end {
            return Vec::new();
        }
        points[start..end].to_vec()
    }
}
