//! Date-by-date trading simulator.
//!
//! Each processed date runs, in this order:
//! 1. intake of the day's signals at the open,
//! 2. mark-to-market at the close,
//! 3. exit evaluation (stop-loss > target > time exit),
//! 4. settlement of exits,
//! 5. the equity snapshot.
//!
//! On the last processed date every remaining position is force-closed
//! between steps 4 and 5.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::config_validation::validate_simulation_config;
use super::equity_curve::{EquityCurveRecorder, EquityPoint};
use super::error::SimError;
use super::execution::{enter_position, evaluate_exit, settle_exit};
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, ExitReason};
use super::signal::Signal;
use crate::ports::market_data_port::MarketDataIndex;
use crate::ports::signal_port::{SignalBook, SignalSource};

/// Execution parameters for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub commission_per_trade: f64,
    pub slippage_bps: f64,
    pub max_positions: usize,
    pub max_position_notional: f64,
    pub max_hold_days: i64,
    pub risk_free_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            commission_per_trade: 1.0,
            slippage_bps: 2.0,
            max_positions: 20,
            max_position_notional: 10_000.0,
            max_hold_days: 5,
            risk_free_rate: 0.02,
        }
    }
}

/// Counters for conditions absorbed during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub signals_received: usize,
    pub signals_filled: usize,
    pub invalid_signals: usize,
    pub duplicate_symbol: usize,
    pub capacity_reached: usize,
    pub insufficient_capital: usize,
    pub missing_entry_bar: usize,
    pub off_calendar_signals: usize,
    pub cash_limited_entries: usize,
    pub halted_position_days: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub initial_capital: f64,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_cash: f64,
    pub final_equity: f64,
    pub stats: RunStats,
}

impl SimulationResult {
    pub fn total_commission(&self) -> f64 {
        self.closed_trades.iter().map(|t| t.commission).sum()
    }
}

/// One simulator per run configuration; every run gets a fresh portfolio.
#[derive(Debug, Clone)]
pub struct TradingSimulator {
    config: SimulationConfig,
}

struct RunState {
    portfolio: Portfolio,
    recorder: EquityCurveRecorder,
    stats: RunStats,
}

impl TradingSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        TradingSimulator { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate `signals` over the full trading calendar of `market_data`.
    pub fn run<M>(
        &self,
        signals: &[Signal],
        market_data: &M,
        initial_capital: f64,
    ) -> Result<SimulationResult, SimError>
    where
        M: MarketDataIndex + ?Sized,
    {
        self.run_window(signals, market_data, initial_capital, None, None)
    }

    /// Simulate only the calendar dates and signals inside `[start, end]`.
    pub fn run_window<M>(
        &self,
        signals: &[Signal],
        market_data: &M,
        initial_capital: f64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<SimulationResult, SimError>
    where
        M: MarketDataIndex + ?Sized,
    {
        let calendar: Vec<NaiveDate> = market_data
            .trading_dates()
            .into_iter()
            .filter(|d| start.is_none_or(|s| *d >= s) && end.is_none_or(|e| *d <= e))
            .collect();
        let book = SignalBook::new(signals).restrict(start, end);

        let mut result = self.run_with_source(&book, market_data, initial_capital, &calendar)?;

        let mut off_calendar = 0;
        for date in book.dates() {
            if calendar.binary_search(&date).is_err() {
                let count = book.for_date(date).len();
                warn!(%date, count, "signals dated on a non-trading day were not filled");
                off_calendar += count;
            }
        }
        result.stats.off_calendar_signals = off_calendar;
        result.stats.signals_received += off_calendar;
        Ok(result)
    }

    /// Core loop over an explicit ascending `calendar`. Every entry point
    /// funnels through here, so configuration is validated once, before any
    /// state exists.
    pub fn run_with_source<S, M>(
        &self,
        source: &S,
        market_data: &M,
        initial_capital: f64,
        calendar: &[NaiveDate],
    ) -> Result<SimulationResult, SimError>
    where
        S: SignalSource + ?Sized,
        M: MarketDataIndex + ?Sized,
    {
        validate_simulation_config(&self.config, initial_capital)?;

        info!(
            initial_capital,
            dates = calendar.len(),
            commission = self.config.commission_per_trade,
            slippage_bps = self.config.slippage_bps,
            "starting simulation"
        );

        let mut state = RunState {
            portfolio: Portfolio::new(initial_capital),
            recorder: EquityCurveRecorder::new(),
            stats: RunStats::default(),
        };

        for (i, &date) in calendar.iter().enumerate() {
            let is_last = i + 1 == calendar.len();
            self.process_date(date, source.for_date(date), market_data, &mut state, is_last);
        }

        let final_cash = state.portfolio.cash;
        let final_equity = state
            .recorder
            .last()
            .map(|p| p.equity)
            .unwrap_or(final_cash);

        info!(
            trades = state.portfolio.closed_trades.len(),
            filled = state.stats.signals_filled,
            final_cash,
            final_equity,
            "simulation complete"
        );

        Ok(SimulationResult {
            initial_capital,
            closed_trades: state.portfolio.closed_trades,
            equity_curve: state.recorder.into_points(),
            final_cash,
            final_equity,
            stats: state.stats,
        })
    }

    fn process_date<M>(
        &self,
        date: NaiveDate,
        signals: Vec<Signal>,
        market_data: &M,
        state: &mut RunState,
        is_last: bool,
    ) where
        M: MarketDataIndex + ?Sized,
    {
        debug!(%date, signals = signals.len(), "processing date");
        self.intake(date, signals, market_data, state);
        self.mark_to_market(date, market_data, state);
        self.exits(date, market_data, state);
        if is_last {
            self.force_close(date, state);
        }
        state.recorder.record(date, &state.portfolio);
    }

    fn intake<M>(&self, date: NaiveDate, signals: Vec<Signal>, market_data: &M, state: &mut RunState)
    where
        M: MarketDataIndex + ?Sized,
    {
        for signal in signals {
            state.stats.signals_received += 1;

            if let Err(e) = signal.validate() {
                warn!(error = %e, "dropping invalid signal");
                state.stats.invalid_signals += 1;
                continue;
            }
            if state.portfolio.has_position(&signal.symbol) {
                debug!(symbol = %signal.symbol, %date, "position already open, signal skipped");
                state.stats.duplicate_symbol += 1;
                continue;
            }
            if state.portfolio.position_count() >= self.config.max_positions {
                debug!(symbol = %signal.symbol, %date, "max positions reached, signal skipped");
                state.stats.capacity_reached += 1;
                continue;
            }

            let bar = match market_data.bar(&signal.symbol, date) {
                Ok(bar) => bar,
                Err(e) => {
                    warn!(error = %e, "no entry bar, signal skipped");
                    state.stats.missing_entry_bar += 1;
                    continue;
                }
            };

            match enter_position(&mut state.portfolio, &signal, bar, &self.config) {
                Ok(fill) => {
                    state.stats.signals_filled += 1;
                    if fill.cash_limited {
                        state.stats.cash_limited_entries += 1;
                        debug!(
                            symbol = %signal.symbol,
                            requested = signal.target_notional,
                            filled = fill.cost,
                            "entry shrunk to available cash"
                        );
                    }
                    debug!(
                        symbol = %signal.symbol,
                        side = %signal.side,
                        shares = fill.shares,
                        price = fill.execution_price,
                        "opened position"
                    );
                }
                Err(e @ SimError::InsufficientCapital { .. }) => {
                    warn!(error = %e, "entry skipped");
                    state.stats.insufficient_capital += 1;
                }
                Err(e) => {
                    warn!(error = %e, "dropping signal");
                    state.stats.invalid_signals += 1;
                }
            }
        }
    }

    fn mark_to_market<M>(&self, date: NaiveDate, market_data: &M, state: &mut RunState)
    where
        M: MarketDataIndex + ?Sized,
    {
        for (symbol, position) in state.portfolio.positions.iter_mut() {
            match market_data.get(symbol, date) {
                Some(bar) => position.mark(bar.close, date),
                None => {
                    debug!(%symbol, %date, "no bar, position treated as halted");
                    state.stats.halted_position_days += 1;
                }
            }
        }
    }

    fn exits<M>(&self, date: NaiveDate, market_data: &M, state: &mut RunState)
    where
        M: MarketDataIndex + ?Sized,
    {
        let triggered: Vec<(String, ExitReason, f64)> = state
            .portfolio
            .positions
            .values()
            .filter_map(|pos| {
                let bar = market_data.get(&pos.symbol, date)?;
                let (reason, price) = evaluate_exit(pos, bar, self.config.max_hold_days)?;
                Some((pos.symbol.clone(), reason, price))
            })
            .collect();

        for (symbol, reason, price) in triggered {
            self.settle(&symbol, price, reason, date, state);
        }
    }

    fn force_close(&self, date: NaiveDate, state: &mut RunState) {
        let remaining: Vec<(String, f64)> = state
            .portfolio
            .positions
            .values()
            .map(|pos| (pos.symbol.clone(), pos.current_price))
            .collect();

        for (symbol, last_close) in remaining {
            self.settle(&symbol, last_close, ExitReason::FinalClose, date, state);
        }
    }

    fn settle(
        &self,
        symbol: &str,
        price: f64,
        reason: ExitReason,
        date: NaiveDate,
        state: &mut RunState,
    ) {
        if let Some(trade) =
            settle_exit(&mut state.portfolio, symbol, price, reason, date, &self.config)
        {
            debug!(
                symbol = %trade.symbol,
                reason = %trade.exit_reason,
                net_pnl = trade.net_pnl,
                hold_days = trade.hold_time_days,
                "closed position"
            );
        }
    }
}

/// Fresh simulator, single run.
pub fn run<M>(
    signals: &[Signal],
    market_data: &M,
    initial_capital: f64,
    config: &SimulationConfig,
) -> Result<SimulationResult, SimError>
where
    M: MarketDataIndex + ?Sized,
{
    TradingSimulator::new(config.clone()).run(signals, market_data, initial_capital)
}
