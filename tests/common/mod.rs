#![allow(dead_code)]

use chrono::NaiveDate;
use std::fs;
use std::path::Path;
pub use tradesim::adapters::memory_market_data::InMemoryMarketData;
pub use tradesim::domain::bar::Bar;
use tradesim::domain::equity_curve::EquityPoint;
use tradesim::domain::position::ClosedTrade;
use tradesim::domain::signal::{Side, Signal};
use tradesim::domain::simulator::{SimulationConfig, SimulationResult};
use tradesim::ports::market_data_port::MarketDataIndex;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn ohlc(symbol: &str, date_str: &str, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        date: parse_date(date_str),
        open,
        high,
        low,
        close,
        volume: 10_000,
    }
}

/// Bar with open = high = low = close.
pub fn make_bar(symbol: &str, date_str: &str, close: f64) -> Bar {
    ohlc(symbol, date_str, close, close, close, close)
}

pub fn market(bars: Vec<Bar>) -> InMemoryMarketData {
    InMemoryMarketData::new(bars)
}

pub fn long(symbol: &str, date_str: &str, notional: f64) -> Signal {
    Signal::new(symbol, parse_date(date_str), Side::Long, notional)
}

pub fn short(symbol: &str, date_str: &str, notional: f64) -> Signal {
    Signal::new(symbol, parse_date(date_str), Side::Short, notional)
}

pub fn sample_config() -> SimulationConfig {
    SimulationConfig {
        commission_per_trade: 1.0,
        slippage_bps: 2.0,
        max_positions: 20,
        max_position_notional: 100_000.0,
        max_hold_days: 5,
        risk_free_rate: 0.0,
    }
}

pub fn frictionless_config() -> SimulationConfig {
    SimulationConfig {
        commission_per_trade: 0.0,
        slippage_bps: 0.0,
        ..sample_config()
    }
}

pub fn equity_curve_from(values: &[f64]) -> Vec<EquityPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| EquityPoint {
            date: date(2024, 1, 1) + chrono::Duration::days(i as i64),
            cash: v,
            equity: v,
            open_position_count: 0,
        })
        .collect()
}

/// Recompute each snapshot's position value from the trade ledger and the
/// bars, and compare with `equity - cash`.
///
/// A trade is open in the snapshot of date `d` when `entry_date <= d <
/// exit_date`. A symbol without a bar on `d` is valued at its last close.
pub fn assert_equity_identity<M: MarketDataIndex>(result: &SimulationResult, market: &M) {
    for point in &result.equity_curve {
        let open: Vec<&ClosedTrade> = result
            .closed_trades
            .iter()
            .filter(|t| t.entry_date <= point.date && point.date < t.exit_date)
            .collect();
        assert_eq!(
            open.len(),
            point.open_position_count,
            "open position count on {}",
            point.date
        );

        let value: f64 = open
            .iter()
            .map(|t| {
                let close = last_close(market, &t.symbol, t.entry_date, point.date)
                    .unwrap_or(t.entry_price);
                let shares = t.shares as f64;
                match t.side {
                    Side::Long => shares * close,
                    Side::Short => shares * t.entry_price + shares * (t.entry_price - close),
                }
            })
            .sum();

        let diff = (point.equity - point.cash - value).abs();
        assert!(
            diff < 1e-6 * point.equity.abs().max(1.0),
            "equity identity broken on {}: equity {} cash {} positions {}",
            point.date,
            point.equity,
            point.cash,
            value
        );
    }
}

fn last_close<M: MarketDataIndex>(
    market: &M,
    symbol: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Option<f64> {
    market
        .trading_dates()
        .into_iter()
        .filter(|d| *d >= from && *d <= to)
        .filter_map(|d| market.get(symbol, d))
        .last()
        .map(|b| b.close)
}

pub fn write_bars_csv(dir: &Path, symbol: &str, bars: &[Bar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}

pub fn write_signals_csv(path: &Path, signals: &[Signal]) {
    let mut content =
        String::from("symbol,date,side,target_notional,stop_loss_price,target_price\n");
    for s in signals {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            s.symbol,
            s.date,
            s.side,
            s.target_notional,
            s.stop_loss_price.map(|p| p.to_string()).unwrap_or_default(),
            s.target_price.map(|p| p.to_string()).unwrap_or_default(),
        ));
    }
    fs::write(path, content).unwrap();
}
