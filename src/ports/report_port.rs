//! Result persistence port trait.

use std::path::Path;

use crate::domain::equity_curve::EquityPoint;
use crate::domain::error::SimError;
use crate::domain::metrics::{Metrics, PeriodReturn, monthly_returns, yearly_returns};
use crate::domain::position::ClosedTrade;
use crate::domain::simulator::SimulationResult;

/// Port for persisting the artifacts of a run.
pub trait ReportPort {
    fn write_trades(&self, trades: &[ClosedTrade], dir: &Path) -> Result<(), SimError>;

    fn write_equity_curve(&self, curve: &[EquityPoint], dir: &Path) -> Result<(), SimError>;

    fn write_metrics(&self, metrics: &Metrics, dir: &Path) -> Result<(), SimError>;

    fn write_period_returns(&self, periods: &[PeriodReturn], dir: &Path) -> Result<(), SimError>;

    /// Default implementation: writes every artifact in turn, with monthly
    /// then yearly returns derived from the equity curve.
    fn write_all(
        &self,
        result: &SimulationResult,
        metrics: &Metrics,
        dir: &Path,
    ) -> Result<(), SimError> {
        self.write_trades(&result.closed_trades, dir)?;
        self.write_equity_curve(&result.equity_curve, dir)?;
        self.write_metrics(metrics, dir)?;

        let mut periods = monthly_returns(&result.equity_curve);
        periods.extend(yearly_returns(&result.equity_curve));
        self.write_period_returns(&periods, dir)
    }
}
