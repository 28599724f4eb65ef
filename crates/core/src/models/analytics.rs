use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trade::{TradeSide, TradeStatus};

/// Realized outcome of a single exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitResult {
    pub exit_id: Uuid,
    pub date: NaiveDate,
    pub quantity: f64,
    pub price: f64,

    /// direction × (exit price − entry price) × quantity
    pub gross_pnl: f64,

    /// Exit fees plus this exit's pro-rata share of entry fees
    pub fees: f64,

    /// gross_pnl − fees
    pub net_pnl: f64,

    /// net_pnl / (entry price × quantity) × 100
    pub return_pct: f64,

    /// net_pnl in units of initial risk; `None` without a stop-loss
    pub r_multiple: Option<f64>,
}

/// Everything computed about one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMetrics {
    pub trade_id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub status: TradeStatus,

    pub quantity: f64,
    pub exited_quantity: f64,
    pub remaining_quantity: f64,

    pub entry_price: f64,
    /// Quantity-weighted average of all exit prices
    pub average_exit_price: Option<f64>,

    /// entry price × quantity + entry fees
    pub cost_basis: f64,

    pub realized_pnl: f64,
    /// net realized P&L relative to the entry value of the exited quantity
    pub realized_return_pct: Option<f64>,

    /// Mark-to-market P&L of the remaining quantity, if a price was supplied
    pub unrealized_pnl: Option<f64>,

    /// |entry − stop| × quantity
    pub initial_risk: Option<f64>,
    pub r_multiple: Option<f64>,

    /// Days from entry to the last exit (closed) or to the as-of date
    pub holding_days: i64,

    pub exits: Vec<ExitResult>,
}

/// Valuation of all lots of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingValuation {
    pub symbol: String,
    pub name: Option<String>,
    pub quantity: f64,
    pub lots: usize,

    /// Σ (price × quantity + fees) across lots
    pub cost_basis: f64,
    pub average_cost: f64,

    pub current_price: f64,
    pub current_value: f64,

    pub gain_loss: f64,
    pub return_pct: f64,
    pub allocation_pct: f64,

    /// Benchmark return over the same lots' holding periods
    pub benchmark_return_pct: Option<f64>,
}

/// What the same money would have done in the benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub symbol: String,

    /// Value today of investing each lot's cost basis in the benchmark
    /// on that lot's purchase date
    pub benchmark_value: f64,
    pub benchmark_return_pct: f64,

    /// portfolio return % − benchmark return %
    pub excess_return_pct: f64,
}

/// Portfolio of stock purchases, valued at a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub as_of_date: NaiveDate,
    pub currency: String,

    pub total_cost_basis: f64,
    pub total_value: f64,
    pub total_gain_loss: f64,
    pub total_return_pct: f64,

    /// Sorted by allocation, largest first
    pub holdings: Vec<HoldingValuation>,

    /// `None` when there is nothing to compare or a benchmark quote is missing
    pub benchmark: Option<BenchmarkComparison>,
}

/// An open or partially exited trade marked to market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPositionValuation {
    pub trade_id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub remaining_quantity: f64,
    pub entry_price: f64,
    pub current_price: f64,
    /// current price × remaining quantity
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_return_pct: f64,
    /// Distance from current price to the stop, as % of current price
    pub distance_to_stop_pct: Option<f64>,
}

/// Aggregate statistics for one strategy tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub strategy: String,
    pub trades: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate_pct: f64,
    pub net_pnl: f64,
    pub average_pnl: f64,
}

/// Journal-wide performance statistics over realized results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalStats {
    pub total_trades: usize,
    pub open_trades: usize,
    pub partial_trades: usize,
    pub closed_trades: usize,

    /// Trades with at least one exit and positive / negative realized P&L
    pub winners: usize,
    pub losers: usize,
    pub win_rate_pct: f64,

    pub gross_profit: f64,
    /// Sum of losing trades' P&L, as a positive number
    pub gross_loss: f64,
    pub net_pnl: f64,

    /// gross profit / gross loss; `None` when there are no losses
    pub profit_factor: Option<f64>,

    pub average_win: f64,
    /// Average losing trade, as a positive number
    pub average_loss: f64,

    /// Net realized P&L per closed trade (0 with no closed trades)
    pub expectancy: f64,

    pub largest_win: f64,
    /// Worst losing trade, as a negative number (0 without losses)
    pub largest_loss: f64,

    pub average_r_multiple: Option<f64>,
    pub average_holding_days: Option<f64>,

    /// Sorted by net P&L, best first
    pub by_strategy: Vec<StrategyStats>,
}
