//! Core domain types and logic.

pub mod bar;
pub mod signal;
pub mod position;
pub mod portfolio;
pub mod equity_curve;
pub mod execution;
pub mod simulator;
pub mod config_validation;
pub mod metrics;
pub mod walk_forward;
pub mod error;
