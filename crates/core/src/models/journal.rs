use serde::{Deserialize, Serialize};

use super::price::PriceCache;
use super::purchase::StockPurchase;
use super::settings::Settings;
use super::trade::Trade;

/// The persisted container. Everything in here is serialized,
/// encrypted, and written to the portable `.tjnl` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    /// Journaled trades, sorted by entry date (oldest first)
    pub trades: Vec<Trade>,

    /// Long-term stock purchases, sorted by purchase date (oldest first)
    #[serde(default)]
    pub purchases: Vec<StockPurchase>,

    pub settings: Settings,

    /// Quotes fetched so far, kept for offline valuation
    pub price_cache: PriceCache,

    /// Removed trades that can still be restored
    #[serde(default)]
    pub trash: Vec<Trade>,
}
