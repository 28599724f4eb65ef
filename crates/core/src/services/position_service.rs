use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::analytics::{ExitResult, TradeMetrics};
use crate::models::trade::{Exit, Trade, TradeStatus, QUANTITY_EPSILON};

/// Exit accounting for a single trade: partial exits, remaining quantity,
/// weighted-average exit price, realized and unrealized P&L.
///
/// Pure arithmetic over the trade's own data. No I/O.
///
/// Fee model: entry fees are spread pro-rata over the quantity, so each
/// exit carries `fees × exit_qty / quantity` of them on top of its own fees.
pub struct PositionService;

impl PositionService {
    pub fn new() -> Self {
        Self
    }

    pub fn exited_quantity(&self, trade: &Trade) -> f64 {
        trade.exits.iter().map(|e| e.quantity).sum()
    }

    /// Quantity still held. Residues within `QUANTITY_EPSILON` count as zero.
    pub fn remaining_quantity(&self, trade: &Trade) -> f64 {
        let remaining = trade.quantity - self.exited_quantity(trade);
        if remaining <= QUANTITY_EPSILON {
            0.0
        } else {
            remaining
        }
    }

    pub fn status(&self, trade: &Trade) -> TradeStatus {
        if trade.exits.is_empty() {
            TradeStatus::Open
        } else if self.remaining_quantity(trade) == 0.0 {
            TradeStatus::Closed
        } else {
            TradeStatus::Partial
        }
    }

    /// Σ(price × qty) / Σ qty over all exits.
    pub fn average_exit_price(&self, trade: &Trade) -> Option<f64> {
        let exited = self.exited_quantity(trade);
        if exited <= 0.0 {
            return None;
        }
        let notional: f64 = trade.exits.iter().map(|e| e.price * e.quantity).sum();
        Some(notional / exited)
    }

    /// Portion of the entry fees attributable to `quantity` units.
    pub fn entry_fee_share(&self, trade: &Trade, quantity: f64) -> f64 {
        if trade.quantity <= 0.0 {
            return 0.0;
        }
        trade.fees * quantity / trade.quantity
    }

    /// |entry − stop| × quantity, when a stop-loss is set.
    pub fn initial_risk(&self, trade: &Trade) -> Option<f64> {
        let stop = trade.stop_loss?;
        let risk = (trade.entry_price - stop).abs() * trade.quantity;
        (risk > 0.0).then_some(risk)
    }

    pub fn exit_result(&self, trade: &Trade, exit: &Exit) -> ExitResult {
        let gross_pnl = trade.side.direction() * (exit.price - trade.entry_price) * exit.quantity;
        let fees = exit.fees + self.entry_fee_share(trade, exit.quantity);
        let net_pnl = gross_pnl - fees;
        let entry_value = trade.entry_price * exit.quantity;
        let return_pct = if entry_value > 0.0 {
            net_pnl / entry_value * 100.0
        } else {
            0.0
        };
        let r_multiple = trade.stop_loss.and_then(|stop| {
            let risk = (trade.entry_price - stop).abs() * exit.quantity;
            (risk > 0.0).then(|| net_pnl / risk)
        });

        ExitResult {
            exit_id: exit.id,
            date: exit.date,
            quantity: exit.quantity,
            price: exit.price,
            gross_pnl,
            fees,
            net_pnl,
            return_pct,
            r_multiple,
        }
    }

    pub fn realized_pnl(&self, trade: &Trade) -> f64 {
        trade
            .exits
            .iter()
            .map(|e| self.exit_result(trade, e).net_pnl)
            .sum()
    }

    /// Mark-to-market P&L of the remaining quantity, net of its entry fee share.
    pub fn unrealized_pnl(&self, trade: &Trade, current_price: f64) -> f64 {
        let remaining = self.remaining_quantity(trade);
        if remaining == 0.0 {
            return 0.0;
        }
        trade.side.direction() * (current_price - trade.entry_price) * remaining
            - self.entry_fee_share(trade, remaining)
    }

    /// Full metrics for a trade. `current_price` enables unrealized P&L;
    /// `as_of` ends the holding period of trades that are still open.
    pub fn metrics(&self, trade: &Trade, current_price: Option<f64>, as_of: NaiveDate) -> TradeMetrics {
        let exits: Vec<ExitResult> = trade.exits.iter().map(|e| self.exit_result(trade, e)).collect();
        let exited_quantity = self.exited_quantity(trade);
        let remaining_quantity = self.remaining_quantity(trade);
        let status = self.status(trade);
        let realized_pnl: f64 = exits.iter().map(|e| e.net_pnl).sum();

        let exited_entry_value = trade.entry_price * exited_quantity;
        let realized_return_pct =
            (exited_entry_value > 0.0).then(|| realized_pnl / exited_entry_value * 100.0);

        let initial_risk = self.initial_risk(trade);
        let r_multiple = trade.stop_loss.and_then(|stop| {
            let risk = (trade.entry_price - stop).abs() * exited_quantity;
            (risk > 0.0).then(|| realized_pnl / risk)
        });

        let end = match (status, trade.last_exit_date()) {
            (TradeStatus::Closed, Some(last)) => last,
            _ => as_of,
        };
        let holding_days = (end - trade.entry_date).num_days().max(0);

        TradeMetrics {
            trade_id: trade.id,
            symbol: trade.symbol.clone(),
            side: trade.side,
            status,
            quantity: trade.quantity,
            exited_quantity,
            remaining_quantity,
            entry_price: trade.entry_price,
            average_exit_price: self.average_exit_price(trade),
            cost_basis: trade.entry_value() + trade.fees,
            realized_pnl,
            realized_return_pct,
            unrealized_pnl: current_price.map(|p| self.unrealized_pnl(trade, p)),
            initial_risk,
            r_multiple,
            holding_days,
            exits,
        }
    }

    // ── Exit mutations ──────────────────────────────────────────────

    /// Record an exit. Rejects exits that would dispose of more than is held.
    pub fn add_exit(&self, trade: &mut Trade, exit: Exit) -> Result<(), CoreError> {
        self.validate_exit(trade, &exit)?;
        Self::insert_sorted(&mut trade.exits, exit);
        Ok(())
    }

    /// Replace an exit's fields, revalidating against the trade's other exits.
    /// An exit whose date is unchanged keeps its place among same-day exits.
    pub fn update_exit(
        &self,
        trade: &mut Trade,
        exit_id: Uuid,
        date: NaiveDate,
        price: f64,
        quantity: f64,
        fees: f64,
    ) -> Result<(), CoreError> {
        let idx = Self::position_of(trade, exit_id)?;
        let old = trade.exits.remove(idx);

        let updated = Exit {
            id: old.id,
            date,
            price,
            quantity,
            fees,
            notes: old.notes.clone(),
        };

        if let Err(e) = self.validate_exit(trade, &updated) {
            trade.exits.insert(idx, old);
            return Err(e);
        }

        if updated.date == old.date {
            trade.exits.insert(idx, updated);
        } else {
            Self::insert_sorted(&mut trade.exits, updated);
        }
        Ok(())
    }

    pub fn remove_exit(&self, trade: &mut Trade, exit_id: Uuid) -> Result<Exit, CoreError> {
        let idx = Self::position_of(trade, exit_id)?;
        Ok(trade.exits.remove(idx))
    }

    pub fn set_exit_notes(&self, trade: &mut Trade, exit_id: Uuid, notes: Option<String>) -> Result<(), CoreError> {
        let idx = Self::position_of(trade, exit_id)?;
        trade.exits[idx].notes = notes;
        Ok(())
    }

    fn validate_exit(&self, trade: &Trade, exit: &Exit) -> Result<(), CoreError> {
        if !exit.quantity.is_finite() || exit.quantity <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Exit quantity must be positive (got {})",
                exit.quantity
            )));
        }
        if !exit.price.is_finite() || exit.price <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Exit price must be positive (got {})",
                exit.price
            )));
        }
        if !exit.fees.is_finite() || exit.fees < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Exit fees must not be negative (got {})",
                exit.fees
            )));
        }
        if exit.date < trade.entry_date {
            return Err(CoreError::ValidationError(format!(
                "Exit date {} is before the entry date {}",
                exit.date, trade.entry_date
            )));
        }

        let remaining = self.remaining_quantity(trade);
        if remaining == 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Trade {} {} is already closed",
                trade.side, trade.symbol
            )));
        }
        if exit.quantity > remaining + QUANTITY_EPSILON {
            return Err(CoreError::ValidationError(format!(
                "Cannot exit {} {}: only {} remaining",
                exit.quantity, trade.symbol, remaining
            )));
        }
        Ok(())
    }

    fn position_of(trade: &Trade, exit_id: Uuid) -> Result<usize, CoreError> {
        trade
            .exits
            .iter()
            .position(|e| e.id == exit_id)
            .ok_or_else(|| CoreError::ExitNotFound(exit_id.to_string()))
    }

    /// Insert after any exits on the same date, keeping date order stable.
    fn insert_sorted(exits: &mut Vec<Exit>, exit: Exit) {
        let pos = exits.partition_point(|e| e.date <= exit.date);
        exits.insert(pos, exit);
    }
}

impl Default for PositionService {
    fn default() -> Self {
        Self::new()
    }
}
