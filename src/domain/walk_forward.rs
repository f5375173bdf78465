//! Walk-forward analysis over rolling train/test windows.
//!
//! Each test window is an independent simulation with its own portfolio, so
//! the windows run in parallel against the shared, read-only market data.

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use tracing::info;

use super::config_validation::validate_simulation_config;
use super::error::SimError;
use super::metrics::{Metrics, PerformanceAnalyzer};
use super::signal::Signal;
use super::simulator::{SimulationConfig, TradingSimulator};
use crate::ports::market_data_port::MarketDataIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkForwardConfig {
    pub train_days: i64,
    pub test_days: i64,
    pub step_days: i64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        WalkForwardConfig {
            train_days: 252,
            test_days: 63,
            step_days: 21,
        }
    }
}

/// Calendar-day window. Both periods are half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
}

/// Windows stepping forward from `start` while the test period still ends
/// on or before `end`. Generation stops at the first date outside chrono's
/// range, so absurd lengths give no windows instead of overflowing.
pub fn generate_windows(start: NaiveDate, end: NaiveDate, config: &WalkForwardConfig) -> Vec<Window> {
    let mut windows = Vec::new();
    if config.train_days < 1 || config.test_days < 1 || config.step_days < 1 {
        return windows;
    }

    let mut current = start;
    while let Some(window) = window_at(current, config) {
        if window.test_end > end {
            break;
        }
        windows.push(window);
        match shift(current, config.step_days) {
            Some(next) => current = next,
            None => break,
        }
    }
    windows
}

fn window_at(train_start: NaiveDate, config: &WalkForwardConfig) -> Option<Window> {
    let train_end = shift(train_start, config.train_days)?;
    let test_end = shift(train_end, config.test_days)?;
    Some(Window {
        train_start,
        train_end,
        test_start: train_end,
        test_end,
    })
}

fn shift(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowResult {
    pub index: usize,
    pub window: Window,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WalkForwardSummary {
    pub windows: usize,
    pub avg_return: f64,
    pub best_return: f64,
    pub worst_return: f64,
    pub avg_sharpe: f64,
    pub avg_win_rate: f64,
    pub worst_drawdown: f64,
    /// Fraction of windows with a positive total return.
    pub profitable_windows: f64,
}

impl WalkForwardSummary {
    pub fn from_results(results: &[WindowResult]) -> Self {
        if results.is_empty() {
            return WalkForwardSummary::default();
        }
        let n = results.len() as f64;
        let returns = results.iter().map(|r| r.metrics.total_return);

        WalkForwardSummary {
            windows: results.len(),
            avg_return: returns.clone().sum::<f64>() / n,
            best_return: returns.clone().fold(f64::NEG_INFINITY, f64::max),
            worst_return: returns.clone().fold(f64::INFINITY, f64::min),
            avg_sharpe: results.iter().map(|r| r.metrics.sharpe_ratio).sum::<f64>() / n,
            avg_win_rate: results.iter().map(|r| r.metrics.win_rate).sum::<f64>() / n,
            worst_drawdown: results
                .iter()
                .map(|r| r.metrics.max_drawdown)
                .fold(0.0, f64::min),
            profitable_windows: returns.filter(|r| *r > 0.0).count() as f64 / n,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardReport {
    pub results: Vec<WindowResult>,
    pub summary: WalkForwardSummary,
}

/// Simulate every test window of `[start, end]` in parallel.
///
/// Results come back in window order regardless of scheduling.
pub fn run_walk_forward<M>(
    signals: &[Signal],
    market_data: &M,
    initial_capital: f64,
    sim_config: &SimulationConfig,
    wf_config: &WalkForwardConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<WalkForwardReport, SimError>
where
    M: MarketDataIndex + Sync + ?Sized,
{
    validate_simulation_config(sim_config, initial_capital)?;
    for (key, value) in [
        ("train_days", wf_config.train_days),
        ("test_days", wf_config.test_days),
        ("step_days", wf_config.step_days),
    ] {
        if value < 1 {
            return Err(SimError::configuration(key, format!("{key} must be at least 1")));
        }
    }

    let windows = generate_windows(start, end, wf_config);
    info!(
        windows = windows.len(),
        train_days = wf_config.train_days,
        test_days = wf_config.test_days,
        step_days = wf_config.step_days,
        "starting walk-forward analysis"
    );

    let analyzer = PerformanceAnalyzer::new(sim_config.risk_free_rate);
    let results = windows
        .par_iter()
        .enumerate()
        .map(|(index, window)| {
            let simulator = TradingSimulator::new(sim_config.clone());
            let last_test_day = window.test_end - Duration::days(1);
            let result = simulator.run_window(
                signals,
                market_data,
                initial_capital,
                Some(window.test_start),
                Some(last_test_day),
            )?;
            let metrics = analyzer.calculate_metrics(&result, initial_capital);
            info!(
                window = index + 1,
                test_start = %window.test_start,
                test_end = %window.test_end,
                total_return = metrics.total_return,
                trades = metrics.total_trades,
                "window complete"
            );
            Ok(WindowResult {
                index,
                window: *window,
                metrics,
            })
        })
        .collect::<Result<Vec<_>, SimError>>()?;

    let summary = WalkForwardSummary::from_results(&results);
    Ok(WalkForwardReport { results, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_window_lengths() {
        let cfg = WalkForwardConfig::default();
        assert_eq!((cfg.train_days, cfg.test_days, cfg.step_days), (252, 63, 21));
    }

    #[test]
    fn generate_windows_steps_forward() {
        let cfg = WalkForwardConfig {
            train_days: 10,
            test_days: 5,
            step_days: 5,
        };
        let windows = generate_windows(date(2024, 1, 1), date(2024, 1, 31), &cfg);

        // starts on the 1st, 6th, 11th and 16th; the 21st would end on Feb 5
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].train_end, date(2024, 1, 11));
        assert_eq!(windows[0].test_start, date(2024, 1, 11));
        assert_eq!(windows[0].test_end, date(2024, 1, 16));
        assert_eq!(windows[3].train_start, date(2024, 1, 16));
        assert_eq!(windows[3].test_end, date(2024, 1, 31));
    }

    #[test]
    fn generate_windows_too_short_range() {
        let cfg = WalkForwardConfig::default();
        assert!(generate_windows(date(2024, 1, 1), date(2024, 6, 1), &cfg).is_empty());
    }

    #[test]
    fn generate_windows_rejects_zero_step() {
        let cfg = WalkForwardConfig {
            step_days: 0,
            ..WalkForwardConfig::default()
        };
        assert!(generate_windows(date(2020, 1, 1), date(2024, 1, 1), &cfg).is_empty());
    }

    #[test]
    fn generate_windows_huge_lengths_yield_nothing() {
        for cfg in [
            WalkForwardConfig {
                train_days: 100_000_000,
                ..WalkForwardConfig::default()
            },
            WalkForwardConfig {
                test_days: i64::MAX,
                ..WalkForwardConfig::default()
            },
        ] {
            assert!(generate_windows(date(2024, 1, 1), date(2024, 12, 31), &cfg).is_empty());
        }
    }

    #[test]
    fn generate_windows_stops_at_calendar_limit() {
        let cfg = WalkForwardConfig {
            train_days: 1,
            test_days: 1,
            step_days: 1_000_000_000,
        };
        let windows = generate_windows(date(2024, 1, 1), NaiveDate::MAX, &cfg);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].test_end, date(2024, 1, 3));
    }

    #[test]
    fn summary_of_no_windows_is_neutral() {
        let summary = WalkForwardSummary::from_results(&[]);
        assert_eq!(summary.windows, 0);
        assert_eq!(summary.avg_return, 0.0);
        assert_eq!(summary.profitable_windows, 0.0);
    }
}
