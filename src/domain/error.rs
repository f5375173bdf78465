//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for tradesim.
///
/// The first three variants are recoverable: the simulator absorbs them per
/// symbol and per day, and they only surface as log entries and missing fills.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("no bar for {symbol} on {date}")]
    DataGap { symbol: String, date: NaiveDate },

    #[error("invalid signal for {symbol} on {date}: {reason}")]
    InvalidSignal {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("insufficient capital for {symbol} on {date}: need {required:.2}, have {available:.2}")]
    InsufficientCapital {
        symbol: String,
        date: NaiveDate,
        required: f64,
        available: f64,
    },

    #[error("invalid configuration {key}: {reason}")]
    Configuration { key: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("data load error: {reason}")]
    DataLoad { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub fn configuration(key: &str, reason: impl Into<String>) -> Self {
        SimError::Configuration {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn data_load(reason: impl Into<String>) -> Self {
        SimError::DataLoad {
            reason: reason.into(),
        }
    }

    /// Per-symbol, per-day conditions that never abort a run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SimError::DataGap { .. }
                | SimError::InvalidSignal { .. }
                | SimError::InsufficientCapital { .. }
        )
    }
}

impl From<csv::Error> for SimError {
    fn from(err: csv::Error) -> Self {
        SimError::data_load(format!("CSV error: {err}"))
    }
}

impl From<&SimError> for std::process::ExitCode {
    fn from(err: &SimError) -> Self {
        let code: u8 = match err {
            SimError::Io(_) => 1,
            SimError::Configuration { .. }
            | SimError::ConfigParse { .. }
            | SimError::ConfigMissing { .. } => 2,
            SimError::DataGap { .. } | SimError::DataLoad { .. } => 5,
            SimError::InvalidSignal { .. } | SimError::InsufficientCapital { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
