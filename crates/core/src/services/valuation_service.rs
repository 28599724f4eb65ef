use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::errors::CoreError;
use crate::models::analytics::{BenchmarkComparison, HoldingValuation, OpenPositionValuation, PortfolioValuation};
use crate::models::journal::Journal;
use crate::models::price::PriceCache;
use crate::models::purchase::StockPurchase;
use crate::models::trade::{TradeSide, TradeStatus};
use crate::services::position_service::PositionService;
use crate::services::price_service::PriceService;

/// Values the purchase portfolio and open trades at market prices.
///
/// Cost basis is what was actually paid (price × quantity + fees).
/// The benchmark comparison answers: had each lot's cost basis bought the
/// benchmark on the same day instead, what would it be worth now?
pub struct ValuationService {
    positions: PositionService,
}

impl ValuationService {
    pub fn new() -> Self {
        Self {
            positions: PositionService::new(),
        }
    }

    /// Value every purchase dated on or before `as_of`.
    ///
    /// A missing quote for a held symbol is an error; a missing benchmark
    /// quote only drops the comparison.
    pub async fn value_portfolio(
        &self,
        journal: &Journal,
        price_service: &PriceService,
        cache: &mut PriceCache,
        as_of: NaiveDate,
    ) -> Result<PortfolioValuation, CoreError> {
        let currency = journal.settings.currency.clone();
        let benchmark_symbol = journal.settings.benchmark_symbol.clone();

        let mut lots_by_symbol: BTreeMap<&str, Vec<&StockPurchase>> = BTreeMap::new();
        for purchase in journal.purchases.iter().filter(|p| p.purchase_date <= as_of) {
            lots_by_symbol.entry(purchase.symbol.as_str()).or_default().push(purchase);
        }

        if lots_by_symbol.is_empty() {
            return Ok(PortfolioValuation {
                as_of_date: as_of,
                currency,
                total_cost_basis: 0.0,
                total_value: 0.0,
                total_gain_loss: 0.0,
                total_return_pct: 0.0,
                holdings: Vec::new(),
                benchmark: None,
            });
        }

        // Benchmark price at as_of; None disables the comparison.
        let benchmark_now = self.benchmark_price(price_service, cache, &benchmark_symbol, as_of).await;

        let mut holdings = Vec::with_capacity(lots_by_symbol.len());
        let mut total_cost_basis = 0.0;
        let mut total_value = 0.0;
        let mut benchmark_value = benchmark_now.map(|_| 0.0);

        for (symbol, lots) in lots_by_symbol {
            let current_price = price_service.get_price_or_cached(cache, symbol, as_of).await?;

            let quantity: f64 = lots.iter().map(|p| p.quantity).sum();
            let cost_basis: f64 = lots.iter().map(|p| p.cost_basis()).sum();
            let current_value = quantity * current_price;
            let gain_loss = current_value - cost_basis;

            let mut holding_benchmark = None;
            if let Some(now) = benchmark_now {
                match self.benchmark_lots_value(price_service, cache, &benchmark_symbol, &lots, now).await {
                    Some(value) => {
                        holding_benchmark = Some(pct_change(cost_basis, value));
                        benchmark_value = benchmark_value.map(|v| v + value);
                    }
                    None => benchmark_value = None,
                }
            }

            total_cost_basis += cost_basis;
            total_value += current_value;

            holdings.push(HoldingValuation {
                symbol: symbol.to_string(),
                name: lots.iter().find_map(|p| p.name.clone()),
                quantity,
                lots: lots.len(),
                cost_basis,
                average_cost: cost_basis / quantity,
                current_price,
                current_value,
                gain_loss,
                return_pct: pct_change(cost_basis, current_value),
                allocation_pct: 0.0, // filled once the total is known
                benchmark_return_pct: holding_benchmark,
            });
        }

        for holding in &mut holdings {
            holding.allocation_pct = if total_value > 0.0 {
                holding.current_value / total_value * 100.0
            } else {
                0.0
            };
        }
        holdings.sort_by(|a, b| b.allocation_pct.total_cmp(&a.allocation_pct));

        let total_gain_loss = total_value - total_cost_basis;
        let total_return_pct = pct_change(total_cost_basis, total_value);

        let benchmark = benchmark_value.map(|value| {
            let benchmark_return_pct = pct_change(total_cost_basis, value);
            BenchmarkComparison {
                symbol: benchmark_symbol.clone(),
                benchmark_value: value,
                benchmark_return_pct,
                excess_return_pct: total_return_pct - benchmark_return_pct,
            }
        });

        tracing::debug!(%as_of, holdings = holdings.len(), total_value, "portfolio valued");

        Ok(PortfolioValuation {
            as_of_date: as_of,
            currency,
            total_cost_basis,
            total_value,
            total_gain_loss,
            total_return_pct,
            holdings,
            benchmark,
        })
    }

    /// Mark open and partially exited trades to market at `as_of`.
    /// Trades whose quote cannot be obtained are skipped with a warning.
    pub async fn value_open_positions(
        &self,
        journal: &Journal,
        price_service: &PriceService,
        cache: &mut PriceCache,
        as_of: NaiveDate,
    ) -> Vec<OpenPositionValuation> {
        let mut open = Vec::new();

        for trade in journal.trades.iter().filter(|t| t.entry_date <= as_of) {
            if self.positions.status(trade) == TradeStatus::Closed {
                continue;
            }
            let current_price = match price_service.get_price_or_cached(cache, &trade.symbol, as_of).await {
                Ok(price) => price,
                Err(e) => {
                    tracing::warn!(symbol = %trade.symbol, error = %e, "no quote for open position");
                    continue;
                }
            };

            let remaining_quantity = self.positions.remaining_quantity(trade);
            let unrealized_pnl = self.positions.unrealized_pnl(trade, current_price);
            let remaining_entry_value = trade.entry_price * remaining_quantity;
            let distance_to_stop_pct = trade.stop_loss.map(|stop| {
                let distance = match trade.side {
                    TradeSide::Long => current_price - stop,
                    TradeSide::Short => stop - current_price,
                };
                distance / current_price * 100.0
            });

            open.push(OpenPositionValuation {
                trade_id: trade.id,
                symbol: trade.symbol.clone(),
                side: trade.side,
                remaining_quantity,
                entry_price: trade.entry_price,
                current_price,
                market_value: current_price * remaining_quantity,
                unrealized_pnl,
                unrealized_return_pct: if remaining_entry_value > 0.0 {
                    unrealized_pnl / remaining_entry_value * 100.0
                } else {
                    0.0
                },
                distance_to_stop_pct,
            });
        }

        open
    }

    async fn benchmark_price(
        &self,
        price_service: &PriceService,
        cache: &mut PriceCache,
        symbol: &str,
        date: NaiveDate,
    ) -> Option<f64> {
        match price_service.get_price_or_cached(cache, symbol, date).await {
            Ok(price) => Some(price),
            Err(e) => {
                tracing::warn!(symbol, %date, error = %e, "benchmark quote unavailable, skipping comparison");
                None
            }
        }
    }

    /// Σ cost_i × benchmark(now) / benchmark(purchase date_i), or `None`
    /// if any lot's benchmark quote is missing.
    async fn benchmark_lots_value(
        &self,
        price_service: &PriceService,
        cache: &mut PriceCache,
        symbol: &str,
        lots: &[&StockPurchase],
        benchmark_now: f64,
    ) -> Option<f64> {
        let mut value = 0.0;
        for lot in lots {
            let then = self.benchmark_price(price_service, cache, symbol, lot.purchase_date).await?;
            value += lot.cost_basis() * benchmark_now / then;
        }
        Some(value)
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}

/// (to − from) / from × 100, or 0 when `from` is not positive.
fn pct_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}
