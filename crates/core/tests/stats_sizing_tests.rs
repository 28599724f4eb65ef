// ═══════════════════════════════════════════════════════════════════
// Stats & Sizing Tests: StatsService, SizingService
// ═══════════════════════════════════════════════════════════════════

mod common;

use common::{assert_close, d};
use trade_journal_core::errors::CoreError;
use trade_journal_core::models::settings::Settings;
use trade_journal_core::models::trade::{Exit, Trade};
use trade_journal_core::services::sizing_service::SizingService;
use trade_journal_core::services::stats_service::{StatsService, UNSPECIFIED_STRATEGY};

fn with_exit(mut trade: Trade, exit: Exit) -> Trade {
    trade.exits.push(exit);
    trade
}

/// Winner (+100, 2R), loser (−50), partial short (−5, −0.5R),
/// an open trade and a break-even scalp.
fn sample_trades() -> Vec<Trade> {
    vec![
        with_exit(
            Trade::long("AAA", d(2025, 1, 2), 100.0, 10.0)
                .with_stop_loss(95.0)
                .with_strategy("Breakout"),
            Exit::new(d(2025, 1, 12), 110.0, 10.0),
        ),
        with_exit(
            Trade::long("BBB", d(2025, 1, 5), 50.0, 10.0).with_strategy("Breakout"),
            Exit::new(d(2025, 1, 9), 45.0, 10.0),
        ),
        with_exit(
            Trade::short("CCC", d(2025, 1, 10), 20.0, 10.0).with_stop_loss(22.0),
            Exit::new(d(2025, 1, 11), 21.0, 5.0),
        ),
        Trade::long("DDD", d(2025, 1, 14), 30.0, 10.0),
        with_exit(
            Trade::long("EEE", d(2025, 1, 15), 10.0, 1.0).with_strategy("Scalp"),
            Exit::new(d(2025, 1, 17), 10.0, 1.0),
        ),
    ]
}

// ═══════════════════════════════════════════════════════════════════
// StatsService
// ═══════════════════════════════════════════════════════════════════

mod stats {
    use super::*;

    #[test]
    fn counts_by_status() {
        let s = StatsService::new().compute(&sample_trades());
        assert_eq!(s.total_trades, 5);
        assert_eq!(s.open_trades, 1);
        assert_eq!(s.partial_trades, 1);
        assert_eq!(s.closed_trades, 3);
    }

    #[test]
    fn win_loss_figures() {
        let s = StatsService::new().compute(&sample_trades());
        assert_eq!(s.winners, 1);
        assert_eq!(s.losers, 2);
        // break-even counts in the denominator but neither side
        assert_close(s.win_rate_pct, 25.0);
        assert_close(s.gross_profit, 100.0);
        assert_close(s.gross_loss, 55.0);
        assert_close(s.net_pnl, 45.0);
        assert_close(s.profit_factor.unwrap(), 100.0 / 55.0);
        assert_close(s.average_win, 100.0);
        assert_close(s.average_loss, 27.5);
        assert_close(s.expectancy, 15.0);
        assert_close(s.largest_win, 100.0);
        assert_close(s.largest_loss, -50.0);
    }

    #[test]
    fn r_multiples_and_holding_days() {
        let s = StatsService::new().compute(&sample_trades());
        assert_close(s.average_r_multiple.unwrap(), 0.75);
        // closed only: 10, 4 and 2 days
        assert_close(s.average_holding_days.unwrap(), 16.0 / 3.0);
    }

    #[test]
    fn strategy_breakdown_sorted_by_net() {
        let s = StatsService::new().compute(&sample_trades());
        let names: Vec<_> = s.by_strategy.iter().map(|b| b.strategy.as_str()).collect();
        assert_eq!(names, vec!["Breakout", "Scalp", UNSPECIFIED_STRATEGY]);

        let breakout = &s.by_strategy[0];
        assert_eq!(breakout.trades, 2);
        assert_eq!(breakout.winners, 1);
        assert_eq!(breakout.losers, 1);
        assert_close(breakout.win_rate_pct, 50.0);
        assert_close(breakout.net_pnl, 50.0);
        assert_close(breakout.average_pnl, 25.0);
    }

    #[test]
    fn expectancy_is_net_over_closed_trades() {
        let trades = vec![
            with_exit(
                Trade::long("AAA", d(2025, 1, 2), 100.0, 10.0),
                Exit::new(d(2025, 1, 6), 110.0, 10.0),
            ),
            with_exit(
                Trade::long("BBB", d(2025, 1, 3), 50.0, 10.0),
                Exit::new(d(2025, 1, 7), 60.0, 5.0),
            ),
        ];
        let s = StatsService::new().compute(&trades);
        assert_eq!(s.closed_trades, 1);
        assert_close(s.net_pnl, 150.0);
        assert_close(s.expectancy, 150.0);
    }

    #[test]
    fn partials_only_have_no_expectancy() {
        let trades = vec![with_exit(
            Trade::long("AAA", d(2025, 1, 2), 100.0, 10.0),
            Exit::new(d(2025, 1, 6), 110.0, 5.0),
        )];
        let s = StatsService::new().compute(&trades);
        assert_close(s.net_pnl, 50.0);
        assert_eq!(s.expectancy, 0.0);
    }

    #[test]
    fn no_losses_means_no_profit_factor() {
        let trades = vec![with_exit(
            Trade::long("AAA", d(2025, 1, 2), 100.0, 1.0),
            Exit::new(d(2025, 1, 3), 101.0, 1.0),
        )];
        let s = StatsService::new().compute(&trades);
        assert_eq!(s.profit_factor, None);
        assert_eq!(s.largest_loss, 0.0);
    }

    #[test]
    fn empty_journal() {
        let s = StatsService::new().compute(&[]);
        assert_eq!(s.total_trades, 0);
        assert_eq!(s.win_rate_pct, 0.0);
        assert_eq!(s.expectancy, 0.0);
        assert_eq!(s.average_r_multiple, None);
        assert_eq!(s.average_holding_days, None);
        assert!(s.by_strategy.is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// SizingService
// ═══════════════════════════════════════════════════════════════════

mod sizing {
    use super::*;

    #[test]
    fn fixed_fractional_size() {
        let p = SizingService::new().position_size(10_000.0, 1.0, 50.0, 48.0).unwrap();
        assert_close(p.risk_budget, 100.0);
        assert_close(p.risk_per_share, 2.0);
        assert_eq!(p.shares, 50.0);
        assert_close(p.total_risk, 100.0);
        assert_close(p.position_value, 2500.0);
        assert_close(p.pct_of_account, 25.0);
    }

    #[test]
    fn short_side_uses_absolute_distance() {
        let p = SizingService::new().position_size(10_000.0, 2.0, 50.0, 54.0).unwrap();
        assert_eq!(p.shares, 50.0);
    }

    #[test]
    fn rounds_down_to_whole_shares() {
        let p = SizingService::new().position_size(10_000.0, 1.0, 50.0, 47.0).unwrap();
        // 100 / 3 = 33.3
        assert_eq!(p.shares, 33.0);
        assert!(p.total_risk <= p.risk_budget);
    }

    #[test]
    fn budget_too_small_for_one_share() {
        let p = SizingService::new().position_size(1_000.0, 1.0, 100.0, 80.0).unwrap();
        assert_eq!(p.shares, 0.0);
        assert_eq!(p.position_value, 0.0);
    }

    #[test]
    fn validation() {
        let svc = SizingService::new();
        for (account, risk, entry, stop) in [
            (0.0, 1.0, 50.0, 48.0),
            (10_000.0, 0.0, 50.0, 48.0),
            (10_000.0, 101.0, 50.0, 48.0),
            (10_000.0, 1.0, 50.0, 50.0),
            (10_000.0, 1.0, f64::NAN, 48.0),
        ] {
            assert!(matches!(
                svc.position_size(account, risk, entry, stop),
                Err(CoreError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn size_for_trade_uses_settings() {
        let settings = Settings {
            account_size: Some(20_000.0),
            default_risk_pct: 0.5,
            ..Settings::default()
        };
        let trade = Trade::long("AAPL", d(2025, 1, 2), 100.0, 1.0).with_stop_loss(98.0);
        let p = SizingService::new().size_for_trade(&settings, &trade).unwrap();
        assert_eq!(p.shares, 50.0);
    }

    #[test]
    fn size_for_trade_needs_account_and_stop() {
        let svc = SizingService::new();
        let with_stop = Trade::long("AAPL", d(2025, 1, 2), 100.0, 1.0).with_stop_loss(98.0);
        assert!(svc.size_for_trade(&Settings::default(), &with_stop).is_err());

        let settings = Settings {
            account_size: Some(20_000.0),
            ..Settings::default()
        };
        let no_stop = Trade::long("AAPL", d(2025, 1, 2), 100.0, 1.0);
        assert!(svc.size_for_trade(&settings, &no_stop).is_err());
    }
}
