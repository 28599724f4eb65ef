use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A long-term stock purchase (a lot), valued against a benchmark.
///
/// Unlike a `Trade`, a purchase has no exits: it is held until removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPurchase {
    pub id: Uuid,

    /// Ticker symbol, uppercased
    pub symbol: String,

    /// Optional company name for display
    #[serde(default)]
    pub name: Option<String>,

    pub purchase_date: NaiveDate,

    /// Price paid per share
    pub price: f64,

    pub quantity: f64,

    #[serde(default)]
    pub fees: f64,

    #[serde(default)]
    pub notes: Option<String>,
}

impl StockPurchase {
    pub fn new(symbol: impl Into<String>, purchase_date: NaiveDate, price: f64, quantity: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into().trim().to_uppercase(),
            name: None,
            purchase_date,
            price,
            quantity,
            fees: 0.0,
            notes: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_fees(mut self, fees: f64) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Purchase price × quantity + fees.
    pub fn cost_basis(&self) -> f64 {
        self.price * self.quantity + self.fees
    }
}
