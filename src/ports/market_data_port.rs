//! Historical bar lookup port.

use chrono::NaiveDate;

use crate::domain::bar::Bar;
use crate::domain::error::SimError;

/// Read-only `(symbol, date) → Bar` index.
///
/// Implementations must be fully loaded before a run starts; the simulator
/// never performs I/O through this trait.
pub trait MarketDataIndex {
    fn get(&self, symbol: &str, date: NaiveDate) -> Option<&Bar>;

    /// Every date with at least one bar, ascending and deduplicated.
    fn trading_dates(&self) -> Vec<NaiveDate>;

    /// Like [`get`](Self::get), but reports the gap as a recoverable error.
    fn bar(&self, symbol: &str, date: NaiveDate) -> Result<&Bar, SimError> {
        self.get(symbol, date).ok_or_else(|| SimError::DataGap {
            symbol: symbol.to_string(),
            date,
        })
    }
}
