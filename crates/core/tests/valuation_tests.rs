// ═══════════════════════════════════════════════════════════════════
// Quote & Valuation Tests: PriceService, ValuationService
// ═══════════════════════════════════════════════════════════════════

mod common;

use std::sync::atomic::Ordering;

use common::{assert_close, d, fast_limits, price_service_with, FailingQuoteProvider, MockQuoteProvider};
use trade_journal_core::errors::CoreError;
use trade_journal_core::models::journal::Journal;
use trade_journal_core::models::price::PriceCache;
use trade_journal_core::models::purchase::StockPurchase;
use trade_journal_core::models::trade::{Exit, Trade};
use trade_journal_core::providers::registry::QuoteProviderRegistry;
use trade_journal_core::services::price_service::PriceService;
use trade_journal_core::services::valuation_service::ValuationService;

fn market() -> MockQuoteProvider {
    MockQuoteProvider::new(&[
        ("AAPL", d(2025, 3, 3), 130.0),
        ("MSFT", d(2025, 3, 3), 250.0),
        ("SPY", d(2025, 1, 2), 400.0),
        ("SPY", d(2025, 2, 3), 420.0),
        ("SPY", d(2025, 3, 3), 440.0),
    ])
}

/// AAPL bought twice, MSFT once (with fees).
fn portfolio() -> Journal {
    let mut journal = Journal::default();
    journal.purchases = vec![
        StockPurchase::new("AAPL", d(2025, 1, 2), 100.0, 10.0).with_name("Apple Inc."),
        StockPurchase::new("MSFT", d(2025, 1, 2), 200.0, 2.0).with_fees(10.0),
        StockPurchase::new("AAPL", d(2025, 2, 3), 120.0, 5.0),
    ];
    journal
}

// ═══════════════════════════════════════════════════════════════════
// PriceService
// ═══════════════════════════════════════════════════════════════════

mod price_service {
    use super::*;

    #[tokio::test]
    async fn historical_price_is_cached() {
        let provider = market();
        let calls = provider.call_counter();
        let svc = price_service_with(provider);
        let mut cache = PriceCache::new();

        let first = svc.get_price(&mut cache, "AAPL", d(2025, 3, 3)).await.unwrap();
        let second = svc.get_price(&mut cache, "AAPL", d(2025, 3, 3)).await.unwrap();

        assert_eq!(first, 130.0);
        assert_eq!(second, 130.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_price("AAPL", d(2025, 3, 3)), Some(130.0));
    }

    #[tokio::test]
    async fn falls_back_to_next_provider() {
        let mut registry = QuoteProviderRegistry::new();
        registry.register(Box::new(FailingQuoteProvider));
        registry.register(Box::new(market()));
        let svc = PriceService::with_rate_limit(registry, &fast_limits());
        let mut cache = PriceCache::new();

        let price = svc.get_price(&mut cache, "MSFT", d(2025, 3, 3)).await.unwrap();
        assert_eq!(price, 250.0);
    }

    #[tokio::test]
    async fn no_providers() {
        let svc = PriceService::with_rate_limit(QuoteProviderRegistry::new(), &fast_limits());
        let mut cache = PriceCache::new();
        let result = svc.get_price(&mut cache, "AAPL", d(2025, 3, 3)).await;
        assert!(matches!(result, Err(CoreError::NoProvider)));
        assert!(!svc.has_providers());
    }

    #[tokio::test]
    async fn rejects_non_positive_quotes() {
        let svc = price_service_with(MockQuoteProvider::new(&[("BAD", d(2025, 3, 3), 0.0)]));
        let mut cache = PriceCache::new();
        let result = svc.get_price(&mut cache, "BAD", d(2025, 3, 3)).await;
        assert!(matches!(result, Err(CoreError::Api { .. })));
        assert_eq!(cache.total_entries(), 0);
    }

    #[tokio::test]
    async fn stale_cache_used_when_providers_fail() {
        let svc = price_service_with(FailingQuoteProvider);
        let mut cache = PriceCache::new();
        cache.set_price("AAPL", d(2025, 2, 28), 128.0);

        let price = svc.get_price_or_cached(&mut cache, "AAPL", d(2025, 3, 3)).await.unwrap();
        assert_eq!(price, 128.0);

        let missing = svc.get_price_or_cached(&mut cache, "MSFT", d(2025, 3, 3)).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn range_served_from_cache_second_time() {
        let provider = market();
        let calls = provider.call_counter();
        let svc = price_service_with(provider);
        let mut cache = PriceCache::new();

        let points = svc.get_price_range(&mut cache, "SPY", d(2025, 1, 1), d(2025, 3, 4)).await.unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, d(2025, 1, 2));

        let again = svc.get_price_range(&mut cache, "SPY", d(2025, 1, 1), d(2025, 3, 4)).await.unwrap();
        assert_eq!(again, points);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn range_drops_invalid_points() {
        let svc = price_service_with(MockQuoteProvider::new(&[
            ("SPY", d(2025, 1, 2), 0.0),
            ("SPY", d(2025, 1, 3), f64::NAN),
            ("SPY", d(2025, 1, 6), 590.0),
        ]));
        let mut cache = PriceCache::new();

        let points = svc.get_price_range(&mut cache, "SPY", d(2025, 1, 2), d(2025, 1, 6)).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, 590.0);
        assert_eq!(cache.total_entries(), 1);
        assert_eq!(cache.get_price("SPY", d(2025, 1, 2)), None);

        // not served from cache: the provider's zero is rejected again
        let result = svc.get_price(&mut cache, "SPY", d(2025, 1, 2)).await;
        assert!(matches!(result, Err(CoreError::Api { .. })));
    }

    #[tokio::test]
    async fn range_rejects_reversed_dates() {
        let svc = price_service_with(market());
        let mut cache = PriceCache::new();
        let result = svc.get_price_range(&mut cache, "SPY", d(2025, 3, 1), d(2025, 1, 1)).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Portfolio valuation vs. benchmark
// ═══════════════════════════════════════════════════════════════════

mod portfolio_valuation {
    use super::*;

    #[tokio::test]
    async fn values_holdings_and_totals() {
        let journal = portfolio();
        let svc = price_service_with(market());
        let mut cache = PriceCache::new();

        let v = ValuationService::new()
            .value_portfolio(&journal, &svc, &mut cache, d(2025, 3, 3))
            .await
            .unwrap();

        assert_eq!(v.currency, "USD");
        assert_eq!(v.holdings.len(), 2);

        let aapl = &v.holdings[0];
        assert_eq!(aapl.symbol, "AAPL");
        assert_eq!(aapl.name.as_deref(), Some("Apple Inc."));
        assert_eq!(aapl.lots, 2);
        assert_close(aapl.quantity, 15.0);
        assert_close(aapl.cost_basis, 1600.0);
        assert_close(aapl.average_cost, 1600.0 / 15.0);
        assert_close(aapl.current_value, 1950.0);
        assert_close(aapl.gain_loss, 350.0);
        assert_close(aapl.return_pct, 21.875);
        assert_close(aapl.allocation_pct, 1950.0 / 2450.0 * 100.0);

        let msft = &v.holdings[1];
        assert_close(msft.cost_basis, 410.0);
        assert_close(msft.current_value, 500.0);

        assert_close(v.total_cost_basis, 2010.0);
        assert_close(v.total_value, 2450.0);
        assert_close(v.total_gain_loss, 440.0);
        assert_close(v.total_return_pct, 440.0 / 2010.0 * 100.0);
    }

    #[tokio::test]
    async fn benchmark_invests_each_lot_on_its_date() {
        let journal = portfolio();
        let svc = price_service_with(market());
        let mut cache = PriceCache::new();

        let v = ValuationService::new()
            .value_portfolio(&journal, &svc, &mut cache, d(2025, 3, 3))
            .await
            .unwrap();
        let bench = v.benchmark.expect("benchmark comparison");

        let aapl_bench = 1000.0 * 440.0 / 400.0 + 600.0 * 440.0 / 420.0;
        let msft_bench = 410.0 * 440.0 / 400.0;
        let expected_value = aapl_bench + msft_bench;
        let expected_pct = (expected_value - 2010.0) / 2010.0 * 100.0;

        assert_eq!(bench.symbol, "SPY");
        assert_close(bench.benchmark_value, expected_value);
        assert_close(bench.benchmark_return_pct, expected_pct);
        assert_close(bench.excess_return_pct, v.total_return_pct - expected_pct);

        assert_close(
            v.holdings[0].benchmark_return_pct.unwrap(),
            (aapl_bench - 1600.0) / 1600.0 * 100.0,
        );
        assert_close(v.holdings[1].benchmark_return_pct.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn missing_benchmark_quote_drops_comparison_only() {
        let journal = portfolio();
        // No SPY close on or before the first purchase date
        let svc = price_service_with(MockQuoteProvider::new(&[
            ("AAPL", d(2025, 3, 3), 130.0),
            ("MSFT", d(2025, 3, 3), 250.0),
            ("SPY", d(2025, 2, 3), 420.0),
            ("SPY", d(2025, 3, 3), 440.0),
        ]));
        let mut cache = PriceCache::new();

        let v = ValuationService::new()
            .value_portfolio(&journal, &svc, &mut cache, d(2025, 3, 3))
            .await
            .unwrap();

        assert!(v.benchmark.is_none());
        assert!(v.holdings.iter().all(|h| h.benchmark_return_pct.is_none()));
        assert_close(v.total_value, 2450.0);
    }

    #[tokio::test]
    async fn missing_holding_quote_is_an_error() {
        let journal = portfolio();
        let svc = price_service_with(MockQuoteProvider::new(&[("AAPL", d(2025, 3, 3), 130.0)]));
        let mut cache = PriceCache::new();

        let result = ValuationService::new()
            .value_portfolio(&journal, &svc, &mut cache, d(2025, 3, 3))
            .await;
        assert!(matches!(result, Err(CoreError::PriceNotAvailable { .. })));
    }

    #[tokio::test]
    async fn purchases_after_as_of_are_ignored() {
        let journal = portfolio();
        let svc = price_service_with(MockQuoteProvider::new(&[
            ("AAPL", d(2025, 1, 31), 110.0),
            ("MSFT", d(2025, 1, 31), 210.0),
            ("SPY", d(2025, 1, 2), 400.0),
            ("SPY", d(2025, 1, 31), 410.0),
        ]));
        let mut cache = PriceCache::new();

        let v = ValuationService::new()
            .value_portfolio(&journal, &svc, &mut cache, d(2025, 1, 31))
            .await
            .unwrap();

        let aapl = v.holdings.iter().find(|h| h.symbol == "AAPL").unwrap();
        assert_eq!(aapl.lots, 1);
        assert_close(aapl.quantity, 10.0);
        assert_close(v.total_cost_basis, 1410.0);
    }

    #[tokio::test]
    async fn empty_portfolio() {
        let svc = price_service_with(market());
        let mut cache = PriceCache::new();
        let v = ValuationService::new()
            .value_portfolio(&Journal::default(), &svc, &mut cache, d(2025, 3, 3))
            .await
            .unwrap();

        assert!(v.holdings.is_empty());
        assert!(v.benchmark.is_none());
        assert_eq!(v.total_value, 0.0);
        assert_eq!(v.total_return_pct, 0.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Open positions
// ═══════════════════════════════════════════════════════════════════

mod open_positions {
    use super::*;

    #[tokio::test]
    async fn marks_open_and_partial_trades() {
        let mut journal = Journal::default();

        let mut partial = Trade::long("AAPL", d(2025, 2, 10), 120.0, 10.0).with_stop_loss(110.0);
        partial.exits.push(Exit::new(d(2025, 2, 20), 125.0, 4.0));
        let partial_id = partial.id;

        let mut closed = Trade::long("MSFT", d(2025, 2, 10), 240.0, 1.0);
        closed.exits.push(Exit::new(d(2025, 2, 20), 245.0, 1.0));

        let no_quote = Trade::short("ZZZZ", d(2025, 2, 10), 10.0, 100.0);

        journal.trades = vec![partial, closed, no_quote];

        let svc = price_service_with(market());
        let mut cache = PriceCache::new();
        let open = ValuationService::new()
            .value_open_positions(&journal, &svc, &mut cache, d(2025, 3, 3))
            .await;

        assert_eq!(open.len(), 1);
        let p = &open[0];
        assert_eq!(p.trade_id, partial_id);
        assert_close(p.remaining_quantity, 6.0);
        assert_close(p.current_price, 130.0);
        assert_close(p.market_value, 780.0);
        assert_close(p.unrealized_pnl, 60.0);
        assert_close(p.unrealized_return_pct, 60.0 / 720.0 * 100.0);
        assert_close(p.distance_to_stop_pct.unwrap(), 20.0 / 130.0 * 100.0);
    }
}
