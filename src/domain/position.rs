//! Open positions and the closed-trade records they turn into.

use chrono::NaiveDate;
use std::fmt;

use super::bar::Bar;
use super::signal::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    StopLoss,
    Target,
    TimeExit,
    FinalClose,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::Target => "TARGET",
            ExitReason::TimeExit => "TIME_EXIT",
            ExitReason::FinalClose => "FINAL_CLOSE",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub shares: u64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_commission: f64,
    pub stop_loss_price: Option<f64>,
    pub target_price: Option<f64>,
    pub current_price: f64,
    pub last_marked: NaiveDate,
    pub unrealized_pnl: f64,
    pub max_favorable_excursion: f64,
    pub max_adverse_excursion: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    /// Cash committed at entry, excluding commission.
    pub fn entry_notional(&self) -> f64 {
        self.shares as f64 * self.entry_price
    }

    /// Gross price P&L at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.direction() * (price - self.entry_price) * self.shares as f64
    }

    /// Contribution to equity at `price`.
    ///
    /// Longs are worth `shares · price`. Shorts are worth their escrowed entry
    /// notional plus unrealized P&L.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.shares as f64 * price,
            Side::Short => self.entry_notional() + self.unrealized_pnl(price),
        }
    }

    /// Mark to `close` on `date`, widening the excursion envelope.
    pub fn mark(&mut self, close: f64, date: NaiveDate) {
        let pnl = self.unrealized_pnl(close);
        self.current_price = close;
        self.last_marked = date;
        self.unrealized_pnl = pnl;
        self.max_favorable_excursion = self.max_favorable_excursion.max(pnl);
        self.max_adverse_excursion = self.max_adverse_excursion.min(pnl);
    }

    pub fn age_days(&self, date: NaiveDate) -> i64 {
        (date - self.entry_date).num_days()
    }

    /// Stop level touched during the bar (low for longs, high for shorts).
    pub fn stop_hit(&self, bar: &Bar) -> Option<f64> {
        let stop = self.stop_loss_price?;
        let touched = match self.side {
            Side::Long => bar.low <= stop,
            Side::Short => bar.high >= stop,
        };
        touched.then_some(stop)
    }

    /// Target level touched during the bar (high for longs, low for shorts).
    pub fn target_hit(&self, bar: &Bar) -> Option<f64> {
        let target = self.target_price?;
        let touched = match self.side {
            Side::Long => bar.high >= target,
            Side::Short => bar.low <= target,
        };
        touched.then_some(target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub side: Side,
    pub shares: u64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,
    pub return_pct: f64,
    pub hold_time_days: i64,
    pub max_favorable_excursion: f64,
    pub max_adverse_excursion: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.net_pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.net_pnl < 0.0
    }
}
