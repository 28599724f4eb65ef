use std::collections::HashMap;

use crate::models::analytics::{JournalStats, StrategyStats};
use crate::models::trade::{Trade, TradeStatus};
use crate::services::position_service::PositionService;

/// Label used for trades without a strategy.
pub const UNSPECIFIED_STRATEGY: &str = "Unspecified";

/// Journal-wide performance statistics over realized P&L.
///
/// A trade counts toward win/loss figures once it has at least one exit;
/// its result is the sum of its exits' net P&L. Break-even trades count
/// as neither winners nor losers. Expectancy spreads the net realized P&L
/// (partial trades included) over the closed trades.
pub struct StatsService {
    positions: PositionService,
}

#[derive(Default)]
struct StrategyAccumulator {
    trades: usize,
    winners: usize,
    losers: usize,
    net_pnl: f64,
}

impl StatsService {
    pub fn new() -> Self {
        Self {
            positions: PositionService::new(),
        }
    }

    pub fn compute(&self, trades: &[Trade]) -> JournalStats {
        let mut open_trades = 0;
        let mut partial_trades = 0;
        let mut closed_trades = 0;

        let mut realized: Vec<f64> = Vec::new();
        let mut r_multiples: Vec<f64> = Vec::new();
        let mut holding_days: Vec<i64> = Vec::new();
        let mut strategies: HashMap<String, StrategyAccumulator> = HashMap::new();

        for trade in trades {
            let status = self.positions.status(trade);
            match status {
                TradeStatus::Open => open_trades += 1,
                TradeStatus::Partial => partial_trades += 1,
                TradeStatus::Closed => closed_trades += 1,
            }
            if status == TradeStatus::Open {
                continue;
            }

            let pnl = self.positions.realized_pnl(trade);
            realized.push(pnl);

            if let Some(risk_per_unit) = trade.stop_loss.map(|s| (trade.entry_price - s).abs()) {
                let risked = risk_per_unit * self.positions.exited_quantity(trade);
                if risked > 0.0 {
                    r_multiples.push(pnl / risked);
                }
            }

            if status == TradeStatus::Closed {
                if let Some(last) = trade.last_exit_date() {
                    holding_days.push((last - trade.entry_date).num_days().max(0));
                }
            }

            let name = trade
                .strategy
                .clone()
                .unwrap_or_else(|| UNSPECIFIED_STRATEGY.to_string());
            let acc = strategies.entry(name).or_default();
            acc.trades += 1;
            acc.net_pnl += pnl;
            if pnl > 0.0 {
                acc.winners += 1;
            } else if pnl < 0.0 {
                acc.losers += 1;
            }
        }

        let wins: Vec<f64> = realized.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = realized.iter().copied().filter(|p| *p < 0.0).collect();

        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = -losses.iter().sum::<f64>();
        let net_pnl: f64 = realized.iter().sum();

        let mut by_strategy: Vec<StrategyStats> = strategies
            .into_iter()
            .map(|(strategy, acc)| StrategyStats {
                strategy,
                trades: acc.trades,
                winners: acc.winners,
                losers: acc.losers,
                win_rate_pct: ratio_pct(acc.winners, acc.trades),
                net_pnl: acc.net_pnl,
                average_pnl: acc.net_pnl / acc.trades as f64,
            })
            .collect();
        by_strategy.sort_by(|a, b| {
            b.net_pnl
                .total_cmp(&a.net_pnl)
                .then_with(|| a.strategy.cmp(&b.strategy))
        });

        JournalStats {
            total_trades: trades.len(),
            open_trades,
            partial_trades,
            closed_trades,
            winners: wins.len(),
            losers: losses.len(),
            win_rate_pct: ratio_pct(wins.len(), realized.len()),
            gross_profit,
            gross_loss,
            net_pnl,
            profit_factor: (gross_loss > 0.0).then(|| gross_profit / gross_loss),
            average_win: mean(&wins).unwrap_or(0.0),
            average_loss: mean(&losses).map(|l| -l).unwrap_or(0.0),
            expectancy: if closed_trades == 0 { 0.0 } else { net_pnl / closed_trades as f64 },
            largest_win: wins.iter().copied().fold(0.0, f64::max),
            largest_loss: losses.iter().copied().fold(0.0, f64::min),
            average_r_multiple: mean(&r_multiples),
            average_holding_days: mean(&holding_days.iter().map(|d| *d as f64).collect::<Vec<_>>()),
            by_strategy,
        }
    }
}

impl Default for StatsService {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn ratio_pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
