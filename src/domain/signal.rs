//! Trade signals consumed by the simulator.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use super::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn direction(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LONG" | "BUY" => Ok(Side::Long),
            "SHORT" | "SELL" => Ok(Side::Short),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

/// A request to open a position on `date` at that day's open.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub date: NaiveDate,
    pub side: Side,
    pub target_notional: f64,
    pub stop_loss_price: Option<f64>,
    pub target_price: Option<f64>,
}

impl Signal {
    pub fn new(symbol: &str, date: NaiveDate, side: Side, target_notional: f64) -> Self {
        Signal {
            symbol: symbol.to_string(),
            date,
            side,
            target_notional,
            stop_loss_price: None,
            target_price: None,
        }
    }

    pub fn with_stop_loss(mut self, price: f64) -> Self {
        self.stop_loss_price = Some(price);
        self
    }

    pub fn with_target(mut self, price: f64) -> Self {
        self.target_price = Some(price);
        self
    }

    /// Reject non-positive or non-finite notional and price levels.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.symbol.trim().is_empty() {
            return Err(self.invalid("empty symbol"));
        }
        if !self.target_notional.is_finite() || self.target_notional <= 0.0 {
            return Err(self.invalid(format!(
                "target_notional must be positive, got {}",
                self.target_notional
            )));
        }
        for (name, level) in [
            ("stop_loss_price", self.stop_loss_price),
            ("target_price", self.target_price),
        ] {
            if let Some(price) = level {
                if !price.is_finite() || price <= 0.0 {
                    return Err(self.invalid(format!("{name} must be positive, got {price}")));
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> SimError {
        SimError::InvalidSignal {
            symbol: self.symbol.clone(),
            date: self.date,
            reason: reason.into(),
        }
    }
}
