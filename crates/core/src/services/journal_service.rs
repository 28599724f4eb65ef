use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::journal::Journal;
use crate::models::purchase::StockPurchase;
use crate::models::trade::{Exit, Screenshot, Trade, TradeSide, TradeUpdate, QUANTITY_EPSILON};
use crate::services::position_service::PositionService;

/// Manages journal entries: trades (with their exits and attachments) and
/// stock purchases. Validates every mutation and keeps both collections
/// sorted by date.
///
/// Pure business logic, no I/O.
pub struct JournalService {
    positions: PositionService,
}

impl JournalService {
    pub fn new() -> Self {
        Self {
            positions: PositionService::new(),
        }
    }

    // ── Trades ──────────────────────────────────────────────────────

    /// Add a trade. Exits it already carries (imports, undo) are replayed
    /// in date order through the same checks as `add_exit`.
    pub fn add_trade(&self, journal: &mut Journal, mut trade: Trade) -> Result<(), CoreError> {
        if journal.trades.iter().any(|t| t.id == trade.id) {
            return Err(CoreError::ValidationError(format!("Trade {} already exists", trade.id)));
        }
        trade.symbol = trade.symbol.trim().to_uppercase();
        self.validate_trade(&trade)?;

        let mut carried = std::mem::take(&mut trade.exits);
        carried.sort_by_key(|e| e.date);
        for exit in carried {
            self.positions.add_exit(&mut trade, exit)?;
        }

        Self::insert_trade(&mut journal.trades, trade);
        Ok(())
    }

    /// Apply a partial update. Quantity may not drop below what has already
    /// been exited, and the entry may not move after the first exit.
    pub fn update_trade(&self, journal: &mut Journal, trade_id: Uuid, update: TradeUpdate) -> Result<(), CoreError> {
        let idx = Self::trade_index(journal, trade_id)?;
        let mut updated = journal.trades[idx].clone();

        if let Some(symbol) = update.symbol {
            updated.symbol = symbol.trim().to_uppercase();
        }
        if let Some(side) = update.side {
            updated.side = side;
        }
        if let Some(date) = update.entry_date {
            updated.entry_date = date;
        }
        if let Some(price) = update.entry_price {
            updated.entry_price = price;
        }
        if let Some(quantity) = update.quantity {
            updated.quantity = quantity;
        }
        if let Some(fees) = update.fees {
            updated.fees = fees;
        }
        if let Some(strategy) = update.strategy {
            updated.strategy = strategy;
        }
        if let Some(stop) = update.stop_loss {
            updated.stop_loss = stop;
        }
        if let Some(target) = update.take_profit {
            updated.take_profit = target;
        }

        self.validate_trade(&updated)?;

        let exited = self.positions.exited_quantity(&updated);
        if updated.quantity + QUANTITY_EPSILON < exited {
            return Err(CoreError::ValidationError(format!(
                "Quantity {} is less than the {} already exited",
                updated.quantity, exited
            )));
        }
        if let Some(first_exit) = updated.exits.first() {
            if updated.entry_date > first_exit.date {
                return Err(CoreError::ValidationError(format!(
                    "Entry date {} is after the first exit on {}",
                    updated.entry_date, first_exit.date
                )));
            }
        }

        // Commit only after every check passed; the original stays untouched on error.
        journal.trades.remove(idx);
        Self::insert_trade(&mut journal.trades, updated);
        Ok(())
    }

    pub fn remove_trade(&self, journal: &mut Journal, trade_id: Uuid) -> Result<Trade, CoreError> {
        let idx = Self::trade_index(journal, trade_id)?;
        Ok(journal.trades.remove(idx))
    }

    pub fn set_trade_notes(&self, journal: &mut Journal, trade_id: Uuid, notes: Option<String>) -> Result<(), CoreError> {
        self.trade_mut(journal, trade_id)?.notes = notes.filter(|n| !n.trim().is_empty());
        Ok(())
    }

    pub fn set_strategy(&self, journal: &mut Journal, trade_id: Uuid, strategy: Option<String>) -> Result<(), CoreError> {
        self.trade_mut(journal, trade_id)?.strategy =
            strategy.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(())
    }

    pub fn add_screenshot(&self, journal: &mut Journal, trade_id: Uuid, screenshot: Screenshot) -> Result<(), CoreError> {
        if screenshot.url.trim().is_empty() {
            return Err(CoreError::ValidationError("Screenshot location must not be empty".into()));
        }
        self.trade_mut(journal, trade_id)?.screenshots.push(screenshot);
        Ok(())
    }

    pub fn remove_screenshot(&self, journal: &mut Journal, trade_id: Uuid, screenshot_id: Uuid) -> Result<Screenshot, CoreError> {
        let trade = self.trade_mut(journal, trade_id)?;
        let idx = trade
            .screenshots
            .iter()
            .position(|s| s.id == screenshot_id)
            .ok_or_else(|| CoreError::ScreenshotNotFound(screenshot_id.to_string()))?;
        Ok(trade.screenshots.remove(idx))
    }

    // ── Exits ───────────────────────────────────────────────────────

    pub fn add_exit(&self, journal: &mut Journal, trade_id: Uuid, exit: Exit) -> Result<(), CoreError> {
        let trade = self.trade_mut(journal, trade_id)?;
        self.positions.add_exit(trade, exit)
    }

    pub fn update_exit(
        &self,
        journal: &mut Journal,
        trade_id: Uuid,
        exit_id: Uuid,
        date: NaiveDate,
        price: f64,
        quantity: f64,
        fees: f64,
    ) -> Result<(), CoreError> {
        let trade = self.trade_mut(journal, trade_id)?;
        self.positions.update_exit(trade, exit_id, date, price, quantity, fees)
    }

    pub fn remove_exit(&self, journal: &mut Journal, trade_id: Uuid, exit_id: Uuid) -> Result<Exit, CoreError> {
        let trade = self.trade_mut(journal, trade_id)?;
        self.positions.remove_exit(trade, exit_id)
    }

    // ── Purchases ───────────────────────────────────────────────────

    pub fn add_purchase(&self, journal: &mut Journal, mut purchase: StockPurchase) -> Result<(), CoreError> {
        if journal.purchases.iter().any(|p| p.id == purchase.id) {
            return Err(CoreError::ValidationError(format!("Purchase {} already exists", purchase.id)));
        }
        purchase.symbol = purchase.symbol.trim().to_uppercase();
        self.validate_purchase(&purchase)?;
        Self::insert_purchase(&mut journal.purchases, purchase);
        Ok(())
    }

    /// Replace a purchase's fields, keeping its id.
    pub fn update_purchase(&self, journal: &mut Journal, purchase_id: Uuid, mut purchase: StockPurchase) -> Result<(), CoreError> {
        let idx = Self::purchase_index(journal, purchase_id)?;
        purchase.id = purchase_id;
        purchase.symbol = purchase.symbol.trim().to_uppercase();
        self.validate_purchase(&purchase)?;
        journal.purchases.remove(idx);
        Self::insert_purchase(&mut journal.purchases, purchase);
        Ok(())
    }

    pub fn remove_purchase(&self, journal: &mut Journal, purchase_id: Uuid) -> Result<StockPurchase, CoreError> {
        let idx = Self::purchase_index(journal, purchase_id)?;
        Ok(journal.purchases.remove(idx))
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Rules:
    /// - symbol present, entry price and quantity positive, fees not negative
    /// - stop-loss on the losing side of entry, take-profit on the winning side
    /// - entry date at most one day ahead (timezone slack)
    fn validate_trade(&self, trade: &Trade) -> Result<(), CoreError> {
        validate_symbol(&trade.symbol)?;
        validate_positive("Entry price", trade.entry_price)?;
        validate_positive("Quantity", trade.quantity)?;
        validate_fees(trade.fees)?;
        validate_not_future(trade.entry_date)?;

        if let Some(stop) = trade.stop_loss {
            validate_positive("Stop-loss", stop)?;
            let wrong_side = match trade.side {
                TradeSide::Long => stop >= trade.entry_price,
                TradeSide::Short => stop <= trade.entry_price,
            };
            if wrong_side {
                return Err(CoreError::ValidationError(format!(
                    "Stop-loss {} is on the wrong side of the {} entry at {}",
                    stop, trade.side, trade.entry_price
                )));
            }
        }

        if let Some(target) = trade.take_profit {
            validate_positive("Take-profit", target)?;
            let wrong_side = match trade.side {
                TradeSide::Long => target <= trade.entry_price,
                TradeSide::Short => target >= trade.entry_price,
            };
            if wrong_side {
                return Err(CoreError::ValidationError(format!(
                    "Take-profit {} is on the wrong side of the {} entry at {}",
                    target, trade.side, trade.entry_price
                )));
            }
        }
        Ok(())
    }

    fn validate_purchase(&self, purchase: &StockPurchase) -> Result<(), CoreError> {
        validate_symbol(&purchase.symbol)?;
        validate_positive("Purchase price", purchase.price)?;
        validate_positive("Quantity", purchase.quantity)?;
        validate_fees(purchase.fees)?;
        validate_not_future(purchase.purchase_date)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn trade_index(journal: &Journal, trade_id: Uuid) -> Result<usize, CoreError> {
        journal
            .trades
            .iter()
            .position(|t| t.id == trade_id)
            .ok_or_else(|| CoreError::TradeNotFound(trade_id.to_string()))
    }

    fn trade_mut<'a>(&self, journal: &'a mut Journal, trade_id: Uuid) -> Result<&'a mut Trade, CoreError> {
        journal
            .trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or_else(|| CoreError::TradeNotFound(trade_id.to_string()))
    }

    fn purchase_index(journal: &Journal, purchase_id: Uuid) -> Result<usize, CoreError> {
        journal
            .purchases
            .iter()
            .position(|p| p.id == purchase_id)
            .ok_or_else(|| CoreError::PurchaseNotFound(purchase_id.to_string()))
    }

    fn insert_trade(trades: &mut Vec<Trade>, trade: Trade) {
        let pos = trades.partition_point(|t| t.entry_date <= trade.entry_date);
        trades.insert(pos, trade);
    }

    fn insert_purchase(purchases: &mut Vec<StockPurchase>, purchase: StockPurchase) {
        let pos = purchases.partition_point(|p| p.purchase_date <= purchase.purchase_date);
        purchases.insert(pos, purchase);
    }
}

impl Default for JournalService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_symbol(symbol: &str) -> Result<(), CoreError> {
    if symbol.trim().is_empty() {
        return Err(CoreError::ValidationError("Symbol must not be empty".into()));
    }
    if symbol.len() > 16 || symbol.chars().any(char::is_whitespace) {
        return Err(CoreError::ValidationError(format!("Invalid symbol '{symbol}'")));
    }
    Ok(())
}

fn validate_positive(field: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::ValidationError(format!("{field} must be positive (got {value})")));
    }
    Ok(())
}

fn validate_fees(fees: f64) -> Result<(), CoreError> {
    if !fees.is_finite() || fees < 0.0 {
        return Err(CoreError::ValidationError(format!("Fees must not be negative (got {fees})")));
    }
    Ok(())
}

fn validate_not_future(date: NaiveDate) -> Result<(), CoreError> {
    let today = Utc::now().date_naive();
    if let Some(tomorrow) = today.succ_opt() {
        if date > tomorrow {
            return Err(CoreError::ValidationError(format!("Date {date} is in the future")));
        }
    }
    Ok(())
}
