//! Trade execution and fill simulation.
//!
//! Implements entry sizing with slippage and commission, exit-condition
//! evaluation with stop-loss priority, and settlement of exits into
//! closed trades.

use chrono::NaiveDate;

use super::bar::Bar;
use super::error::SimError;
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, ExitReason, Position};
use super::signal::{Side, Signal};
use super::simulator::SimulationConfig;

const BPS_PER_UNIT: f64 = 10_000.0;

/// Round a fill price to cents.
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Entry fill: longs pay up, shorts receive less.
pub fn apply_entry_slippage(market_price: f64, side: Side, slippage_bps: f64) -> f64 {
    let slip = slippage_bps / BPS_PER_UNIT;
    let price = match side {
        Side::Long => market_price * (1.0 + slip),
        Side::Short => market_price * (1.0 - slip),
    };
    round_price(price)
}

/// Exit fill: longs sell lower, shorts cover higher.
pub fn apply_exit_slippage(market_price: f64, side: Side, slippage_bps: f64) -> f64 {
    let slip = slippage_bps / BPS_PER_UNIT;
    let price = match side {
        Side::Long => market_price * (1.0 - slip),
        Side::Short => market_price * (1.0 + slip),
    };
    round_price(price)
}

/// Whole-share order size for an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSize {
    pub shares: u64,
    pub budget: f64,
    /// The budget was cut down to the cash on hand.
    pub cash_limited: bool,
}

/// `floor(min(requested, max_notional, cash - commission) / price)`.
pub fn size_order(
    requested_notional: f64,
    max_position_notional: f64,
    cash: f64,
    commission: f64,
    entry_price: f64,
) -> OrderSize {
    let available = (cash - commission).max(0.0);
    let wanted = requested_notional.min(max_position_notional);
    let budget = wanted.min(available);
    let shares = if entry_price > 0.0 {
        (budget / entry_price).floor().max(0.0) as u64
    } else {
        0
    };
    OrderSize {
        shares,
        budget,
        cash_limited: available < wanted,
    }
}

/// Result of a successful entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFill {
    pub shares: u64,
    pub execution_price: f64,
    pub cost: f64,
    pub commission: f64,
    pub cash_limited: bool,
}

/// Open a position for `signal` at `bar.open`.
///
/// Debits `shares · price + commission` for both sides; short notional is
/// held as escrow until the cover.
pub fn enter_position(
    portfolio: &mut Portfolio,
    signal: &Signal,
    bar: &Bar,
    config: &SimulationConfig,
) -> Result<EntryFill, SimError> {
    let execution_price = apply_entry_slippage(bar.open, signal.side, config.slippage_bps);
    if !execution_price.is_finite() || execution_price <= 0.0 {
        return Err(SimError::InvalidSignal {
            symbol: signal.symbol.clone(),
            date: signal.date,
            reason: format!("non-positive entry price {execution_price}"),
        });
    }

    let commission = config.commission_per_trade;
    let size = size_order(
        signal.target_notional,
        config.max_position_notional,
        portfolio.cash,
        commission,
        execution_price,
    );

    if size.shares == 0 {
        return Err(SimError::InsufficientCapital {
            symbol: signal.symbol.clone(),
            date: bar.date,
            required: execution_price + commission,
            available: portfolio.cash,
        });
    }

    let cost = size.shares as f64 * execution_price;
    portfolio.cash -= cost + commission;

    portfolio.add_position(Position {
        symbol: signal.symbol.clone(),
        side: signal.side,
        shares: size.shares,
        entry_price: execution_price,
        entry_date: bar.date,
        entry_commission: commission,
        stop_loss_price: signal.stop_loss_price,
        target_price: signal.target_price,
        current_price: execution_price,
        last_marked: bar.date,
        unrealized_pnl: 0.0,
        max_favorable_excursion: 0.0,
        max_adverse_excursion: 0.0,
    });

    Ok(EntryFill {
        shares: size.shares,
        execution_price,
        cost,
        commission,
        cash_limited: size.cash_limited,
    })
}

/// Decide whether `position` exits on `bar`, and at which reference level.
///
/// Stop-loss wins over target on the same bar; the time exit is only checked
/// when neither level was touched and fills at the close.
pub fn evaluate_exit(
    position: &Position,
    bar: &Bar,
    max_hold_days: i64,
) -> Option<(ExitReason, f64)> {
    if let Some(stop) = position.stop_hit(bar) {
        return Some((ExitReason::StopLoss, stop));
    }
    if let Some(target) = position.target_hit(bar) {
        return Some((ExitReason::Target, target));
    }
    if position.age_days(bar.date) >= max_hold_days {
        return Some((ExitReason::TimeExit, bar.close));
    }
    None
}

/// Close the position in `symbol` at `reference_price` (before slippage).
///
/// Returns the recorded trade, or `None` if no such position is open.
pub fn settle_exit(
    portfolio: &mut Portfolio,
    symbol: &str,
    reference_price: f64,
    reason: ExitReason,
    exit_date: NaiveDate,
    config: &SimulationConfig,
) -> Option<ClosedTrade> {
    let position = portfolio.remove_position(symbol)?;

    let exit_price = apply_exit_slippage(reference_price, position.side, config.slippage_bps);
    let exit_commission = config.commission_per_trade;
    let gross_pnl = position.unrealized_pnl(exit_price);
    let commission = position.entry_commission + exit_commission;
    let net_pnl = gross_pnl - commission;
    let entry_notional = position.entry_notional();

    // Longs receive the sale proceeds; shorts get the escrow back plus the
    // price difference. Both reduce to notional + gross.
    portfolio.cash += entry_notional + gross_pnl - exit_commission;

    let return_pct = if entry_notional > 0.0 {
        net_pnl / entry_notional * 100.0
    } else {
        0.0
    };

    let trade = ClosedTrade {
        symbol: position.symbol,
        side: position.side,
        shares: position.shares,
        entry_date: position.entry_date,
        entry_price: position.entry_price,
        exit_date,
        exit_price,
        exit_reason: reason,
        gross_pnl,
        commission,
        net_pnl,
        return_pct,
        hold_time_days: (exit_date - position.entry_date).num_days(),
        max_favorable_excursion: position.max_favorable_excursion,
        max_adverse_excursion: position.max_adverse_excursion,
    };

    portfolio.record_trade(trade.clone());
    Some(trade)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn make_config() -> SimulationConfig {
        SimulationConfig {
            commission_per_trade: 1.0,
            slippage_bps: 10.0,
            max_positions: 5,
            max_position_notional: 10_000.0,
            max_hold_days: 5,
            risk_free_rate: 0.0,
        }
    }

    fn frictionless() -> SimulationConfig {
        SimulationConfig {
            commission_per_trade: 0.0,
            slippage_bps: 0.0,
            ..make_config()
        }
    }

    fn make_bar(d: u32, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "AAPL".into(),
            date: day(d),
            open,
            high,
            low,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn round_price_to_cents() {
        assert!((round_price(100.126) - 100.13).abs() < 1e-12);
        assert!((round_price(99.994) - 99.99).abs() < 1e-12);
    }

    #[test]
    fn entry_slippage_works_against_trader() {
        assert!((apply_entry_slippage(100.0, Side::Long, 10.0) - 100.10).abs() < 1e-12);
        assert!((apply_entry_slippage(100.0, Side::Short, 10.0) - 99.90).abs() < 1e-12);
    }

    #[test]
    fn exit_slippage_works_against_trader() {
        assert!((apply_exit_slippage(100.0, Side::Long, 10.0) - 99.90).abs() < 1e-12);
        assert!((apply_exit_slippage(100.0, Side::Short, 10.0) - 100.10).abs() < 1e-12);
    }

    #[test]
    fn size_order_takes_smallest_budget() {
        let size = size_order(5_000.0, 10_000.0, 100_000.0, 1.0, 100.0);
        assert_eq!(size.shares, 50);
        assert!(!size.cash_limited);

        let capped = size_order(50_000.0, 10_000.0, 100_000.0, 1.0, 100.0);
        assert_eq!(capped.shares, 100);
        assert!(!capped.cash_limited);
    }

    #[test]
    fn size_order_shrinks_to_cash() {
        let size = size_order(10_000.0, 10_000.0, 2_501.0, 1.0, 100.0);
        assert_eq!(size.shares, 25);
        assert!(size.cash_limited);
    }

    #[test]
    fn size_order_zero_when_cash_below_commission() {
        let size = size_order(10_000.0, 10_000.0, 0.5, 1.0, 100.0);
        assert_eq!(size.shares, 0);
    }

    #[test]
    fn enter_long_debits_cost_and_commission() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = make_config();
        let signal = Signal::new("AAPL", day(2), Side::Long, 5_000.0).with_stop_loss(95.0);
        let bar = make_bar(2, 100.0, 102.0, 98.0, 101.0);

        let fill = enter_position(&mut portfolio, &signal, &bar, &config).unwrap();

        assert!((fill.execution_price - 100.10).abs() < 1e-12);
        assert_eq!(fill.shares, 49);
        assert!((fill.cost - 49.0 * 100.10).abs() < 1e-9);
        assert!((portfolio.cash - (100_000.0 - fill.cost - 1.0)).abs() < 1e-9);

        let pos = portfolio.get_position("AAPL").unwrap();
        assert!(pos.is_long());
        assert_eq!(pos.stop_loss_price, Some(95.0));
        assert_eq!(pos.entry_date, day(2));
        assert!((pos.entry_commission - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn enter_short_escrows_notional() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = make_config();
        let signal = Signal::new("AAPL", day(2), Side::Short, 5_000.0);
        let bar = make_bar(2, 100.0, 102.0, 98.0, 101.0);

        let fill = enter_position(&mut portfolio, &signal, &bar, &config).unwrap();

        assert!((fill.execution_price - 99.90).abs() < 1e-12);
        assert!((portfolio.cash - (100_000.0 - fill.cost - 1.0)).abs() < 1e-9);
        assert!(portfolio.get_position("AAPL").unwrap().is_short());
    }

    #[test]
    fn enter_with_insufficient_capital_leaves_state_untouched() {
        let mut portfolio = Portfolio::new(50.0);
        let config = make_config();
        let signal = Signal::new("AAPL", day(2), Side::Long, 5_000.0);
        let bar = make_bar(2, 100.0, 102.0, 98.0, 101.0);

        let err = enter_position(&mut portfolio, &signal, &bar, &config).unwrap_err();
        assert!(matches!(err, SimError::InsufficientCapital { .. }));
        assert!(!portfolio.has_position("AAPL"));
        assert!((portfolio.cash - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_beats_target_on_same_bar() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = frictionless();
        let signal = Signal::new("AAPL", day(2), Side::Long, 10_000.0)
            .with_stop_loss(95.0)
            .with_target(105.0);
        enter_position(&mut portfolio, &signal, &make_bar(2, 100.0, 100.0, 100.0, 100.0), &config)
            .unwrap();
        let pos = portfolio.get_position("AAPL").unwrap();

        let wide = make_bar(3, 100.0, 110.0, 94.0, 100.0);
        assert_eq!(evaluate_exit(pos, &wide, 5), Some((ExitReason::StopLoss, 95.0)));
    }

    #[test]
    fn target_fires_when_stop_untouched() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = frictionless();
        let signal = Signal::new("AAPL", day(2), Side::Long, 10_000.0)
            .with_stop_loss(95.0)
            .with_target(105.0);
        enter_position(&mut portfolio, &signal, &make_bar(2, 100.0, 100.0, 100.0, 100.0), &config)
            .unwrap();
        let pos = portfolio.get_position("AAPL").unwrap();

        let up = make_bar(3, 100.0, 106.0, 99.0, 104.0);
        assert_eq!(evaluate_exit(pos, &up, 5), Some((ExitReason::Target, 105.0)));
    }

    #[test]
    fn time_exit_after_max_hold() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = frictionless();
        let signal = Signal::new("AAPL", day(2), Side::Long, 10_000.0);
        enter_position(&mut portfolio, &signal, &make_bar(2, 100.0, 100.0, 100.0, 100.0), &config)
            .unwrap();
        let pos = portfolio.get_position("AAPL").unwrap();

        assert_eq!(evaluate_exit(pos, &make_bar(4, 100.0, 101.0, 99.0, 100.5), 3), None);
        assert_eq!(
            evaluate_exit(pos, &make_bar(5, 100.0, 101.0, 99.0, 100.5), 3),
            Some((ExitReason::TimeExit, 100.5))
        );
    }

    #[test]
    fn settle_long_round_trip() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = SimulationConfig {
            slippage_bps: 0.0,
            ..make_config()
        };
        let signal = Signal::new("AAPL", day(2), Side::Long, 10_000.0);
        enter_position(&mut portfolio, &signal, &make_bar(2, 100.0, 100.0, 100.0, 100.0), &config)
            .unwrap();

        let trade = settle_exit(&mut portfolio, "AAPL", 110.0, ExitReason::TimeExit, day(3), &config)
            .unwrap();

        assert_eq!(trade.shares, 100);
        assert!((trade.gross_pnl - 1_000.0).abs() < 1e-9);
        assert!((trade.net_pnl - 998.0).abs() < 1e-9);
        assert!((trade.commission - 2.0).abs() < f64::EPSILON);
        assert_eq!(trade.hold_time_days, 1);
        assert!(!portfolio.has_position("AAPL"));
        assert!((portfolio.cash - (100_000.0 + 998.0)).abs() < 1e-9);
    }

    #[test]
    fn settle_short_profit_returns_escrow() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = frictionless();
        let signal = Signal::new("AAPL", day(2), Side::Short, 10_000.0);
        enter_position(&mut portfolio, &signal, &make_bar(2, 100.0, 100.0, 100.0, 100.0), &config)
            .unwrap();
        assert!((portfolio.cash - 90_000.0).abs() < 1e-9);

        let trade = settle_exit(&mut portfolio, "AAPL", 90.0, ExitReason::Target, day(3), &config)
            .unwrap();

        assert!((trade.gross_pnl - 1_000.0).abs() < 1e-9);
        assert!((portfolio.cash - 101_000.0).abs() < 1e-9);
    }

    #[test]
    fn settle_applies_exit_slippage() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = SimulationConfig {
            commission_per_trade: 0.0,
            slippage_bps: 100.0,
            ..make_config()
        };
        let signal = Signal::new("AAPL", day(2), Side::Long, 10_000.0);
        enter_position(&mut portfolio, &signal, &make_bar(2, 100.0, 100.0, 100.0, 100.0), &config)
            .unwrap();

        let trade = settle_exit(&mut portfolio, "AAPL", 95.0, ExitReason::StopLoss, day(3), &config)
            .unwrap();
        assert!((trade.exit_price - 94.05).abs() < 1e-12);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn settle_missing_position_is_none() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = make_config();
        assert!(
            settle_exit(&mut portfolio, "XYZ", 10.0, ExitReason::FinalClose, day(3), &config)
                .is_none()
        );
        assert!(portfolio.closed_trades.is_empty());
    }
}
