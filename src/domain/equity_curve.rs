//! Per-date equity snapshots.

use chrono::NaiveDate;

use super::portfolio::Portfolio;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: f64,
    pub equity: f64,
    pub open_position_count: usize,
}

/// Append-only equity series, one point per processed date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquityCurveRecorder {
    points: Vec<EquityPoint>,
}

impl EquityCurveRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the portfolio for `date`.
    pub fn record(&mut self, date: NaiveDate, portfolio: &Portfolio) -> &EquityPoint {
        self.points.push(EquityPoint {
            date,
            cash: portfolio.cash,
            equity: portfolio.total_equity(),
            open_position_count: portfolio.position_count(),
        });
        &self.points[self.points.len() - 1]
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<EquityPoint> {
        self.points
    }
}
