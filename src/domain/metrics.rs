//! Performance metrics and statistics.
//!
//! Every function here is pure: the same ledger and equity curve always give
//! the same numbers, and every metric falls back to a neutral value (0, or
//! the documented sentinel) when its inputs are too thin to compute it.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::equity_curve::EquityPoint;
use super::position::ClosedTrade;
use super::simulator::SimulationResult;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Deviations below this are treated as zero.
const ZERO_STDEV: f64 = 1e-12;

/// Default look-back for rolling statistics, one trading year.
pub const ROLLING_WINDOW: usize = 252;

/// Flat metrics record. Ratios and returns are fractions (0.05 = 5%), money
/// fields are in account currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub net_profit: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub trading_days: usize,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub var_95: f64,
    pub cvar_95: f64,
    pub positive_periods: f64,
    pub return_consistency: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate: f64,
    pub gross_pnl: f64,
    pub total_pnl: f64,
    pub total_commission: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    pub risk_reward_ratio: f64,
    pub expectancy: f64,
    pub consecutive_wins_max: usize,
    pub consecutive_losses_max: usize,
    pub avg_hold_time_days: f64,
    pub max_favorable_excursion: f64,
    pub max_adverse_excursion: f64,
    pub gain_efficiency: f64,
}

impl Metrics {
    /// Metric name → value, in name order.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("initial_capital", self.initial_capital),
            ("final_equity", self.final_equity),
            ("net_profit", self.net_profit),
            ("total_return", self.total_return),
            ("annualized_return", self.annualized_return),
            ("trading_days", self.trading_days as f64),
            ("volatility", self.volatility),
            ("sharpe_ratio", self.sharpe_ratio),
            ("sortino_ratio", self.sortino_ratio),
            ("calmar_ratio", self.calmar_ratio),
            ("max_drawdown", self.max_drawdown),
            ("max_drawdown_duration", self.max_drawdown_duration as f64),
            ("var_95", self.var_95),
            ("cvar_95", self.cvar_95),
            ("positive_periods", self.positive_periods),
            ("return_consistency", self.return_consistency),
            ("total_trades", self.total_trades as f64),
            ("winning_trades", self.winning_trades as f64),
            ("losing_trades", self.losing_trades as f64),
            ("breakeven_trades", self.breakeven_trades as f64),
            ("win_rate", self.win_rate),
            ("gross_pnl", self.gross_pnl),
            ("total_pnl", self.total_pnl),
            ("total_commission", self.total_commission),
            ("avg_win", self.avg_win),
            ("avg_loss", self.avg_loss),
            ("largest_win", self.largest_win),
            ("largest_loss", self.largest_loss),
            ("profit_factor", self.profit_factor),
            ("risk_reward_ratio", self.risk_reward_ratio),
            ("expectancy", self.expectancy),
            ("consecutive_wins_max", self.consecutive_wins_max as f64),
            ("consecutive_losses_max", self.consecutive_losses_max as f64),
            ("avg_hold_time_days", self.avg_hold_time_days),
            ("max_favorable_excursion", self.max_favorable_excursion),
            ("max_adverse_excursion", self.max_adverse_excursion),
            ("gain_efficiency", self.gain_efficiency),
        ])
    }
}

/// Stateless metrics engine parameterised by the annual risk-free rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceAnalyzer {
    risk_free_rate: f64,
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        PerformanceAnalyzer::new(0.02)
    }
}

impl PerformanceAnalyzer {
    pub fn new(risk_free_rate: f64) -> Self {
        PerformanceAnalyzer { risk_free_rate }
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn calculate_metrics(&self, result: &SimulationResult, initial_capital: f64) -> Metrics {
        let metrics = compute_metrics(
            &result.closed_trades,
            &result.equity_curve,
            result.final_equity,
            initial_capital,
            self.risk_free_rate,
        );
        debug!(
            trades = metrics.total_trades,
            total_return = metrics.total_return,
            sharpe = metrics.sharpe_ratio,
            "calculated metrics"
        );
        metrics
    }

    /// Rolling statistics at this analyzer's risk-free rate.
    pub fn rolling_metrics(&self, equity_curve: &[EquityPoint], window: usize) -> Vec<RollingPoint> {
        rolling_metrics(equity_curve, window, self.risk_free_rate)
    }
}

/// Compute every metric from the two run artifacts.
pub fn compute_metrics(
    trades: &[ClosedTrade],
    equity_curve: &[EquityPoint],
    final_equity: f64,
    initial_capital: f64,
    risk_free_rate: f64,
) -> Metrics {
    let returns = daily_returns(equity_curve);
    let trading_days = equity_curve.len();

    let total_return = total_return(final_equity, initial_capital);
    let annualized_return = annualized_return(total_return, trading_days);
    let (max_drawdown, max_drawdown_duration) = drawdown(equity_curve);
    let calmar_ratio = if max_drawdown < 0.0 {
        annualized_return / max_drawdown.abs()
    } else {
        0.0
    };
    let var_95 = percentile(&returns, 5.0);
    let return_stdev = sample_stdev(&returns);

    let trade_stats = TradeStats::from_trades(trades);

    Metrics {
        initial_capital,
        final_equity,
        net_profit: final_equity - initial_capital,
        total_return,
        annualized_return,
        trading_days,
        volatility: return_stdev * TRADING_DAYS_PER_YEAR.sqrt(),
        sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
        sortino_ratio: sortino_ratio(&returns),
        calmar_ratio,
        max_drawdown,
        max_drawdown_duration,
        var_95,
        cvar_95: cvar(&returns, var_95),
        positive_periods: positive_periods(&returns),
        return_consistency: if returns.is_empty() || return_stdev == 0.0 {
            1.0
        } else {
            1.0 / (1.0 + return_stdev)
        },
        total_trades: trades.len(),
        winning_trades: trade_stats.winning,
        losing_trades: trade_stats.losing,
        breakeven_trades: trade_stats.breakeven,
        win_rate: trade_stats.win_rate(),
        gross_pnl: trades.iter().map(|t| t.gross_pnl).sum(),
        total_pnl: trades.iter().map(|t| t.net_pnl).sum(),
        total_commission: trades.iter().map(|t| t.gross_pnl - t.net_pnl).sum(),
        avg_win: trade_stats.avg_win(),
        avg_loss: trade_stats.avg_loss(),
        largest_win: trade_stats.largest_win,
        largest_loss: trade_stats.largest_loss,
        profit_factor: trade_stats.profit_factor(),
        risk_reward_ratio: trade_stats.risk_reward_ratio(),
        expectancy: trade_stats.expectancy(),
        consecutive_wins_max: max_consecutive(trades, ClosedTrade::is_win),
        consecutive_losses_max: max_consecutive(trades, ClosedTrade::is_loss),
        avg_hold_time_days: if trades.is_empty() {
            0.0
        } else {
            trades.iter().map(|t| t.hold_time_days as f64).sum::<f64>() / trades.len() as f64
        },
        max_favorable_excursion: trades
            .iter()
            .map(|t| t.max_favorable_excursion)
            .fold(0.0, f64::max),
        max_adverse_excursion: trades
            .iter()
            .map(|t| t.max_adverse_excursion)
            .fold(0.0, f64::min),
        gain_efficiency: trade_stats.gain_efficiency,
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    winning: usize,
    losing: usize,
    breakeven: usize,
    total_wins: f64,
    total_losses: f64,
    largest_win: f64,
    largest_loss: f64,
    gain_efficiency: f64,
}

impl TradeStats {
    fn from_trades(trades: &[ClosedTrade]) -> Self {
        let mut stats = TradeStats::default();
        let mut winning_mfe = 0.0;

        for trade in trades {
            let pnl = trade.net_pnl;
            if pnl > 0.0 {
                stats.winning += 1;
                stats.total_wins += pnl;
                stats.largest_win = stats.largest_win.max(pnl);
                winning_mfe += trade.max_favorable_excursion;
            } else if pnl < 0.0 {
                stats.losing += 1;
                stats.total_losses += pnl;
                stats.largest_loss = stats.largest_loss.min(pnl);
            } else {
                stats.breakeven += 1;
            }
        }

        if winning_mfe > 0.0 {
            stats.gain_efficiency = stats.total_wins / winning_mfe;
        }
        stats
    }

    fn total(&self) -> usize {
        self.winning + self.losing + self.breakeven
    }

    fn win_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.winning as f64 / self.total() as f64
        }
    }

    fn avg_win(&self) -> f64 {
        if self.winning == 0 {
            0.0
        } else {
            self.total_wins / self.winning as f64
        }
    }

    /// Mean losing P&L; negative, or 0 without losses.
    fn avg_loss(&self) -> f64 {
        if self.losing == 0 {
            0.0
        } else {
            self.total_losses / self.losing as f64
        }
    }

    /// `+∞` when there are wins and no losses, 0 with nothing to compare.
    fn profit_factor(&self) -> f64 {
        if self.total_losses < 0.0 {
            self.total_wins / self.total_losses.abs()
        } else if self.total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn risk_reward_ratio(&self) -> f64 {
        let avg_loss = self.avg_loss();
        if avg_loss < 0.0 {
            (self.avg_win() / avg_loss).abs()
        } else {
            0.0
        }
    }

    fn expectancy(&self) -> f64 {
        let win_rate = self.win_rate();
        win_rate * self.avg_win() + (1.0 - win_rate) * self.avg_loss()
    }
}

pub fn total_return(final_equity: f64, initial_capital: f64) -> f64 {
    if initial_capital > 0.0 {
        final_equity / initial_capital - 1.0
    } else {
        0.0
    }
}

/// `(1 + total_return)^(252 / trading_days) − 1`; −1 once the account is wiped.
pub fn annualized_return(total_return: f64, trading_days: usize) -> f64 {
    if trading_days == 0 || !total_return.is_finite() {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS_PER_YEAR / trading_days as f64) - 1.0
}

/// Simple returns between consecutive equity points.
pub fn daily_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| w[1].equity / w[0].equity - 1.0)
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample (n − 1) standard deviation; 0 below two observations.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    let stdev = variance.sqrt();
    if stdev < ZERO_STDEV { 0.0 } else { stdev }
}

pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let stdev = sample_stdev(&excess);
    if stdev == 0.0 {
        return 0.0;
    }
    mean(&excess) / stdev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualised mean return over the annualised deviation of the losing days.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_dev = sample_stdev(&downside) * TRADING_DAYS_PER_YEAR.sqrt();
    if downside_dev == 0.0 {
        return 0.0;
    }
    mean(returns) * TRADING_DAYS_PER_YEAR / downside_dev
}

/// Deepest peak-to-trough fall (≤ 0) and the longest underwater run in
/// equity points.
pub fn drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    let mut run = 0usize;
    let mut longest = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            run = 0;
            continue;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((point.equity - peak) / peak);
        }
        run += 1;
        longest = longest.max(run);
    }

    (max_dd, longest)
}

/// Linear-interpolated percentile, `pct` in [0, 100]. 0 for no data.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Mean of the returns at or below `var`.
pub fn cvar(returns: &[f64], var: f64) -> f64 {
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    mean(&tail)
}

pub fn positive_periods(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}

/// Longest streak of trades satisfying `pred`, in exit-date order. Trades
/// closed on the same date keep their ledger order.
pub fn max_consecutive(trades: &[ClosedTrade], pred: impl Fn(&ClosedTrade) -> bool) -> usize {
    let mut by_exit: Vec<&ClosedTrade> = trades.iter().collect();
    by_exit.sort_by_key(|t| t.exit_date);

    let mut longest = 0;
    let mut current = 0;
    for trade in by_exit {
        if pred(trade) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Compounded return over one calendar month (`month` set) or year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodReturn {
    pub year: i32,
    pub month: Option<u32>,
    pub total_return: f64,
}

impl PeriodReturn {
    /// `YYYY-MM` for months, `YYYY` for years.
    pub fn label(&self) -> String {
        match self.month {
            Some(month) => format!("{}-{month:02}", self.year),
            None => self.year.to_string(),
        }
    }
}

/// Daily returns compounded per calendar month. A return belongs to the
/// period of its later equity point, so the first point opens no period.
pub fn monthly_returns(equity_curve: &[EquityPoint]) -> Vec<PeriodReturn> {
    period_returns(equity_curve, |d| (d.year(), Some(d.month())))
}

/// Daily returns compounded per calendar year.
pub fn yearly_returns(equity_curve: &[EquityPoint]) -> Vec<PeriodReturn> {
    period_returns(equity_curve, |d| (d.year(), None))
}

fn period_returns(
    equity_curve: &[EquityPoint],
    period_of: impl Fn(NaiveDate) -> (i32, Option<u32>),
) -> Vec<PeriodReturn> {
    let mut periods: Vec<PeriodReturn> = Vec::new();
    for w in equity_curve.windows(2).filter(|w| w[0].equity > 0.0) {
        let growth = w[1].equity / w[0].equity;
        let (year, month) = period_of(w[1].date);
        match periods.last_mut() {
            Some(p) if p.year == year && p.month == month => {
                p.total_return = (1.0 + p.total_return) * growth - 1.0;
                continue;
            }
            _ => {}
        }
        periods.push(PeriodReturn {
            year,
            month,
            total_return: growth - 1.0,
        });
    }
    periods
}

/// Statistics over the `window` daily returns ending on `date`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub sharpe_ratio: f64,
    pub volatility: f64,
    pub max_drawdown: f64,
}

/// Sharpe, annualised volatility and max drawdown over each trailing run of
/// `window` daily returns. Empty when the curve holds fewer than `window`
/// returns.
pub fn rolling_metrics(
    equity_curve: &[EquityPoint],
    window: usize,
    risk_free_rate: f64,
) -> Vec<RollingPoint> {
    if window == 0 || equity_curve.len() <= window {
        return Vec::new();
    }
    (window..equity_curve.len())
        .map(|end| {
            let slice = &equity_curve[end - window..=end];
            let returns = daily_returns(slice);
            RollingPoint {
                date: equity_curve[end].date,
                sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
                volatility: sample_stdev(&returns) * TRADING_DAYS_PER_YEAR.sqrt(),
                max_drawdown: drawdown(slice).0,
            }
        })
        .collect()
}

fn format_ratio(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{value:.2}")
    }
}

/// Human-readable report block.
pub fn format_summary(metrics: &Metrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== PERFORMANCE SUMMARY ===");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Net Profit:          ${:.2} ({:.2}%)",
        metrics.net_profit,
        metrics.total_return * 100.0
    );
    let _ = writeln!(out, "Annualized Return:   {:.2}%", metrics.annualized_return * 100.0);
    let _ = writeln!(out, "Volatility:          {:.2}%", metrics.volatility * 100.0);
    let _ = writeln!(out, "Max Drawdown:        {:.2}%", metrics.max_drawdown * 100.0);
    let _ = writeln!(out, "Drawdown Duration:   {} days", metrics.max_drawdown_duration);
    let _ = writeln!(out, "Sharpe Ratio:        {:.2}", metrics.sharpe_ratio);
    let _ = writeln!(out, "Sortino Ratio:       {:.2}", metrics.sortino_ratio);
    let _ = writeln!(out, "Calmar Ratio:        {:.2}", metrics.calmar_ratio);
    let _ = writeln!(out, "VaR 95%:             {:.2}%", metrics.var_95 * 100.0);
    let _ = writeln!(out);
    let _ = writeln!(out, "Total Trades:        {}", metrics.total_trades);
    let _ = writeln!(out, "Win Rate:            {:.1}%", metrics.win_rate * 100.0);
    let _ = writeln!(out, "Profit Factor:       {}", format_ratio(metrics.profit_factor));
    let _ = writeln!(out, "Risk/Reward Ratio:   {:.2}", metrics.risk_reward_ratio);
    let _ = writeln!(out, "Expectancy:          ${:.2}", metrics.expectancy);
    let _ = writeln!(out);
    let _ = writeln!(out, "Average Win:         ${:.2}", metrics.avg_win);
    let _ = writeln!(out, "Average Loss:        ${:.2}", metrics.avg_loss);
    let _ = writeln!(out, "Largest Win:         ${:.2}", metrics.largest_win);
    let _ = writeln!(out, "Largest Loss:        ${:.2}", metrics.largest_loss);
    let _ = writeln!(out, "Total Commission:    ${:.2}", metrics.total_commission);
    let _ = writeln!(out);
    let _ = writeln!(out, "Max Consecutive Wins:   {}", metrics.consecutive_wins_max);
    let _ = writeln!(out, "Max Consecutive Losses: {}", metrics.consecutive_losses_max);
    let _ = writeln!(out, "Average Hold Time:      {:.1} days", metrics.avg_hold_time_days);
    let _ = write!(out, "=== END SUMMARY ===");
    out
}

/// Assumed volatility of the benchmark when deriving its Sharpe ratio.
const BENCHMARK_VOLATILITY: f64 = 0.15;
/// Assumed worst drawdown of the benchmark.
const BENCHMARK_DRAWDOWN: f64 = -0.20;

/// Strategy against a benchmark described only by its annual return.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkComparison {
    pub return_difference: f64,
    pub sharpe_difference: f64,
    pub drawdown_difference: f64,
    pub outperformed_benchmark: bool,
    pub better_risk_adjusted: bool,
    pub lower_drawdown: bool,
}

impl BenchmarkComparison {
    pub fn compare(metrics: &Metrics, benchmark_annual_return: f64) -> Self {
        let benchmark_sharpe = benchmark_annual_return / BENCHMARK_VOLATILITY;
        BenchmarkComparison {
            return_difference: metrics.annualized_return - benchmark_annual_return,
            sharpe_difference: metrics.sharpe_ratio - benchmark_sharpe,
            drawdown_difference: metrics.max_drawdown.abs() - BENCHMARK_DRAWDOWN.abs(),
            outperformed_benchmark: metrics.annualized_return > benchmark_annual_return,
            better_risk_adjusted: metrics.sharpe_ratio > benchmark_sharpe,
            lower_drawdown: metrics.max_drawdown.abs() < BENCHMARK_DRAWDOWN.abs(),
        }
    }
}
