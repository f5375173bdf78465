//! CSV report adapter implementing ReportPort.
//!
//! Writes `trades.csv`, `equity_curve.csv`, `metrics.csv` and
//! `period_returns.csv` into the output directory, creating it if needed.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain::equity_curve::EquityPoint;
use crate::domain::error::SimError;
use crate::domain::metrics::{Metrics, PeriodReturn};
use crate::domain::position::ClosedTrade;
use crate::ports::report_port::ReportPort;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_CURVE_FILE: &str = "equity_curve.csv";
pub const METRICS_FILE: &str = "metrics.csv";
pub const PERIOD_RETURNS_FILE: &str = "period_returns.csv";

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    fn writer(dir: &Path, file: &str) -> Result<csv::Writer<fs::File>, SimError> {
        fs::create_dir_all(dir)?;
        Ok(csv::Writer::from_path(dir.join(file))?)
    }
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

impl ReportPort for CsvReportAdapter {
    fn write_trades(&self, trades: &[ClosedTrade], dir: &Path) -> Result<(), SimError> {
        let mut wtr = Self::writer(dir, TRADES_FILE)?;
        wtr.write_record([
            "symbol",
            "side",
            "shares",
            "entry_date",
            "entry_price",
            "exit_date",
            "exit_price",
            "exit_reason",
            "gross_pnl",
            "commission",
            "net_pnl",
            "return_pct",
            "hold_time_days",
            "max_favorable_excursion",
            "max_adverse_excursion",
        ])?;
        for t in trades {
            wtr.write_record([
                t.symbol.clone(),
                t.side.to_string(),
                t.shares.to_string(),
                t.entry_date.to_string(),
                money(t.entry_price),
                t.exit_date.to_string(),
                money(t.exit_price),
                t.exit_reason.to_string(),
                money(t.gross_pnl),
                money(t.commission),
                money(t.net_pnl),
                format!("{:.4}", t.return_pct),
                t.hold_time_days.to_string(),
                money(t.max_favorable_excursion),
                money(t.max_adverse_excursion),
            ])?;
        }
        wtr.flush()?;
        info!(trades = trades.len(), dir = %dir.display(), "wrote trade ledger");
        Ok(())
    }

    fn write_equity_curve(&self, curve: &[EquityPoint], dir: &Path) -> Result<(), SimError> {
        let mut wtr = Self::writer(dir, EQUITY_CURVE_FILE)?;
        wtr.write_record(["date", "cash", "equity", "open_positions"])?;
        for p in curve {
            wtr.write_record([
                p.date.to_string(),
                money(p.cash),
                money(p.equity),
                p.open_position_count.to_string(),
            ])?;
        }
        wtr.flush()?;
        info!(points = curve.len(), dir = %dir.display(), "wrote equity curve");
        Ok(())
    }

    fn write_metrics(&self, metrics: &Metrics, dir: &Path) -> Result<(), SimError> {
        let mut wtr = Self::writer(dir, METRICS_FILE)?;
        wtr.write_record(["metric", "value"])?;
        for (name, value) in metrics.to_map() {
            wtr.write_record([name.to_string(), value.to_string()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_period_returns(&self, periods: &[PeriodReturn], dir: &Path) -> Result<(), SimError> {
        let mut wtr = Self::writer(dir, PERIOD_RETURNS_FILE)?;
        wtr.write_record(["period", "return"])?;
        for p in periods {
            wtr.write_record([p.label(), format!("{:.6}", p.total_return)])?;
        }
        wtr.flush()?;
        Ok(())
    }
}
