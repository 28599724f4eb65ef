use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quantities at or below this are treated as zero (fully exited).
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    /// Bought first, profits when price rises
    Long,
    /// Sold first, profits when price falls
    Short,
}

impl TradeSide {
    /// Sign applied to price moves: +1 for long, -1 for short.
    pub fn direction(&self) -> f64 {
        match self {
            TradeSide::Long => 1.0,
            TradeSide::Short => -1.0,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Long => write!(f, "Long"),
            TradeSide::Short => write!(f, "Short"),
        }
    }
}

/// Lifecycle state derived from a trade's exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    /// No exits recorded yet
    Open,
    /// Some, but not all, of the quantity has been exited
    Partial,
    /// The whole quantity has been exited
    Closed,
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Open => write!(f, "Open"),
            TradeStatus::Partial => write!(f, "Partial"),
            TradeStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// Sort order for trade listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeSortOrder {
    /// Newest entry date first (default for display)
    EntryDateDesc,
    EntryDateAsc,
    SymbolAsc,
    SymbolDesc,
    /// Largest entry notional (price × quantity) first
    SizeDesc,
}

/// A reference to a chart screenshot attached to a trade.
/// Only the location is stored; the image itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: Uuid,
    /// File path or URL of the image
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

impl Screenshot {
    pub fn new(url: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            caption,
        }
    }
}

/// A partial or full disposal of a trade's quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub id: Uuid,
    pub date: NaiveDate,
    /// Price per unit received (long) or paid to cover (short)
    pub price: f64,
    /// Units disposed of (always positive)
    pub quantity: f64,
    /// Commission paid on this exit
    #[serde(default)]
    pub fees: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Exit {
    pub fn new(date: NaiveDate, price: f64, quantity: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            price,
            quantity,
            fees: 0.0,
            notes: None,
        }
    }

    pub fn with_fees(mut self, fees: f64) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A journaled trade: one entry plus any number of exits.
///
/// The entry fields are fixed at creation; everything derived
/// (status, remaining quantity, P&L) is computed by `PositionService`
/// from `exits`, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,

    /// Ticker symbol, uppercased
    pub symbol: String,

    pub side: TradeSide,

    pub entry_date: NaiveDate,

    /// Price per unit at entry
    pub entry_price: f64,

    /// Units entered (always positive)
    pub quantity: f64,

    /// Commission paid on entry
    #[serde(default)]
    pub fees: f64,

    /// Strategy / setup name (e.g., "Breakout", "Earnings gap")
    #[serde(default)]
    pub strategy: Option<String>,

    #[serde(default)]
    pub stop_loss: Option<f64>,

    #[serde(default)]
    pub take_profit: Option<f64>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub screenshots: Vec<Screenshot>,

    /// Exits, sorted by date
    #[serde(default)]
    pub exits: Vec<Exit>,
}

impl Trade {
    pub fn new(
        symbol: impl Into<String>,
        side: TradeSide,
        entry_date: NaiveDate,
        entry_price: f64,
        quantity: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into().trim().to_uppercase(),
            side,
            entry_date,
            entry_price,
            quantity,
            fees: 0.0,
            strategy: None,
            stop_loss: None,
            take_profit: None,
            notes: None,
            screenshots: Vec::new(),
            exits: Vec::new(),
        }
    }

    pub fn long(symbol: impl Into<String>, entry_date: NaiveDate, entry_price: f64, quantity: f64) -> Self {
        Self::new(symbol, TradeSide::Long, entry_date, entry_price, quantity)
    }

    pub fn short(symbol: impl Into<String>, entry_date: NaiveDate, entry_price: f64, quantity: f64) -> Self {
        Self::new(symbol, TradeSide::Short, entry_date, entry_price, quantity)
    }

    pub fn with_fees(mut self, fees: f64) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_stop_loss(mut self, stop: f64) -> Self {
        self.stop_loss = Some(stop);
        self
    }

    pub fn with_take_profit(mut self, target: f64) -> Self {
        self.take_profit = Some(target);
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Entry notional: entry price × quantity (fees excluded).
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }

    pub fn last_exit_date(&self) -> Option<NaiveDate> {
        self.exits.last().map(|e| e.date)
    }
}

/// Partial update for an existing trade. `None` fields are left unchanged.
///
/// For the optional trade fields (`stop_loss`, `take_profit`, `strategy`),
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct TradeUpdate {
    pub symbol: Option<String>,
    pub side: Option<TradeSide>,
    pub entry_date: Option<NaiveDate>,
    pub entry_price: Option<f64>,
    pub quantity: Option<f64>,
    pub fees: Option<f64>,
    pub strategy: Option<Option<String>>,
    pub stop_loss: Option<Option<f64>>,
    pub take_profit: Option<Option<f64>>,
}
