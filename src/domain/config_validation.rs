//! Configuration validation.
//!
//! Runs before any simulation so a bad parameter fails the whole run instead
//! of producing a silently wrong equity curve.

use chrono::NaiveDate;

use crate::domain::error::SimError;
use crate::domain::simulator::SimulationConfig;
use crate::ports::config_port::ConfigPort;

const MAX_SLIPPAGE_BPS: f64 = 10_000.0;

pub fn validate_simulation_config(
    config: &SimulationConfig,
    initial_capital: f64,
) -> Result<(), SimError> {
    validate_initial_capital(initial_capital)?;
    validate_non_negative("commission_per_trade", config.commission_per_trade)?;
    validate_non_negative("slippage_bps", config.slippage_bps)?;
    if config.slippage_bps >= MAX_SLIPPAGE_BPS {
        // 100% slippage or more drives fills to zero or below.
        return Err(SimError::configuration(
            "slippage_bps",
            format!(
                "slippage_bps must be below {MAX_SLIPPAGE_BPS}, got {}",
                config.slippage_bps
            ),
        ));
    }
    validate_positive("max_position_notional", config.max_position_notional)?;
    if config.max_positions == 0 {
        return Err(SimError::configuration(
            "max_positions",
            "max_positions must be at least 1",
        ));
    }
    if config.max_hold_days < 1 {
        return Err(SimError::configuration(
            "max_hold_days",
            "max_hold_days must be at least 1",
        ));
    }
    validate_risk_free_rate(config.risk_free_rate)?;
    Ok(())
}

/// Checks the INI-level settings that do not survive into [`SimulationConfig`]:
/// integer signs before conversion, the optional run window and the
/// walk-forward window lengths.
pub fn validate_config_file(config: &dyn ConfigPort) -> Result<(), SimError> {
    for key in ["max_positions", "max_hold_days"] {
        if config.get_int("simulation", key, 1) < 1 {
            return Err(SimError::configuration(key, format!("{key} must be at least 1")));
        }
    }
    validate_dates(config)?;
    for key in ["train_days", "test_days", "step_days"] {
        if config.get_int("walk_forward", key, 1) < 1 {
            return Err(SimError::configuration(key, format!("{key} must be at least 1")));
        }
    }
    Ok(())
}

fn validate_initial_capital(value: f64) -> Result<(), SimError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SimError::configuration(
            "initial_capital",
            format!("initial_capital must be positive, got {value}"),
        ));
    }
    Ok(())
}

fn validate_non_negative(key: &str, value: f64) -> Result<(), SimError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::configuration(
            key,
            format!("{key} must be non-negative, got {value}"),
        ));
    }
    Ok(())
}

fn validate_positive(key: &str, value: f64) -> Result<(), SimError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SimError::configuration(
            key,
            format!("{key} must be positive, got {value}"),
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(value: f64) -> Result<(), SimError> {
    if !(0.0..1.0).contains(&value) {
        return Err(SimError::configuration(
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SimError> {
    let start = parse_optional_date(config, "start_date")?;
    let end = parse_optional_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(SimError::configuration(
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }
    Ok(())
}

fn parse_optional_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, SimError> {
    match config.get_string("simulation", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| SimError::configuration(key, format!("invalid {key} format, expected YYYY-MM-DD"))),
    }
}
