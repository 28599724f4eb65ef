use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::models::purchase::StockPurchase;
use crate::models::trade::Trade;
use crate::services::position_service::PositionService;

/// CSV and JSON export/import of journal collections.
pub struct ExportService {
    positions: PositionService,
}

#[derive(Serialize)]
struct TradeRow<'a> {
    id: String,
    symbol: &'a str,
    side: String,
    entry_date: NaiveDate,
    entry_price: f64,
    quantity: f64,
    fees: f64,
    strategy: Option<&'a str>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    status: String,
    remaining_quantity: f64,
    average_exit_price: Option<f64>,
    realized_pnl: f64,
    notes: Option<&'a str>,
}

#[derive(Serialize)]
struct ExitRow<'a> {
    trade_id: String,
    symbol: &'a str,
    exit_id: String,
    date: NaiveDate,
    price: f64,
    quantity: f64,
    fees: f64,
    net_pnl: f64,
    notes: Option<&'a str>,
}

/// One purchase per row: `symbol,name,date,price,quantity,fees,notes`.
#[derive(Serialize, Deserialize)]
struct PurchaseRow {
    symbol: String,
    name: Option<String>,
    date: NaiveDate,
    price: f64,
    quantity: f64,
    #[serde(default)]
    fees: Option<f64>,
    notes: Option<String>,
}

impl ExportService {
    pub fn new() -> Self {
        Self {
            positions: PositionService::new(),
        }
    }

    /// One row per trade with its derived status and realized P&L.
    pub fn trades_to_csv(&self, trades: &[Trade]) -> Result<String, CoreError> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        for trade in trades {
            writer.serialize(TradeRow {
                id: trade.id.to_string(),
                symbol: &trade.symbol,
                side: trade.side.to_string(),
                entry_date: trade.entry_date,
                entry_price: trade.entry_price,
                quantity: trade.quantity,
                fees: trade.fees,
                strategy: trade.strategy.as_deref(),
                stop_loss: trade.stop_loss,
                take_profit: trade.take_profit,
                status: self.positions.status(trade).to_string(),
                remaining_quantity: self.positions.remaining_quantity(trade),
                average_exit_price: self.positions.average_exit_price(trade),
                realized_pnl: self.positions.realized_pnl(trade),
                notes: trade.notes.as_deref(),
            })?;
        }
        finish(writer)
    }

    /// One row per exit across all trades.
    pub fn exits_to_csv(&self, trades: &[Trade]) -> Result<String, CoreError> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        for trade in trades {
            for exit in &trade.exits {
                let result = self.positions.exit_result(trade, exit);
                writer.serialize(ExitRow {
                    trade_id: trade.id.to_string(),
                    symbol: &trade.symbol,
                    exit_id: exit.id.to_string(),
                    date: exit.date,
                    price: exit.price,
                    quantity: exit.quantity,
                    fees: exit.fees,
                    net_pnl: result.net_pnl,
                    notes: exit.notes.as_deref(),
                })?;
            }
        }
        finish(writer)
    }

    pub fn purchases_to_csv(&self, purchases: &[StockPurchase]) -> Result<String, CoreError> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        for p in purchases {
            writer.serialize(PurchaseRow {
                symbol: p.symbol.clone(),
                name: p.name.clone(),
                date: p.purchase_date,
                price: p.price,
                quantity: p.quantity,
                fees: Some(p.fees),
                notes: p.notes.clone(),
            })?;
        }
        finish(writer)
    }

    /// Parse purchases from CSV with a header row. Fails on the first bad
    /// row, reporting its line number; nothing is returned partially.
    pub fn purchases_from_csv(&self, data: &str) -> Result<Vec<StockPurchase>, CoreError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let mut purchases = Vec::new();
        for (idx, row) in reader.deserialize::<PurchaseRow>().enumerate() {
            let row = row.map_err(|e| CoreError::Csv(format!("row {}: {e}", idx + 2)))?;
            let mut purchase = StockPurchase::new(row.symbol, row.date, row.price, row.quantity);
            purchase.name = row.name.filter(|n| !n.is_empty());
            purchase.fees = row.fees.unwrap_or(0.0);
            purchase.notes = row.notes.filter(|n| !n.is_empty());
            purchases.push(purchase);
        }
        Ok(purchases)
    }

    pub fn trades_to_json(&self, trades: &[Trade]) -> Result<String, CoreError> {
        serde_json::to_string_pretty(trades)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize trades: {e}")))
    }

    pub fn trades_from_json(&self, json: &str) -> Result<Vec<Trade>, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn purchases_to_json(&self, purchases: &[StockPurchase]) -> Result<String, CoreError> {
        serde_json::to_string_pretty(purchases)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize purchases: {e}")))
    }

    pub fn purchases_from_json(&self, json: &str) -> Result<Vec<StockPurchase>, CoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ExportService {
    fn default() -> Self {
        Self::new()
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, CoreError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CoreError::Csv(e.to_string()))
}
