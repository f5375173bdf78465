//! In-memory market data index.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::bar::Bar;
use crate::ports::market_data_port::MarketDataIndex;

/// Fully loaded `(symbol, date) → Bar` map. Immutable after construction,
/// so one instance can back any number of concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketData {
    bars: HashMap<String, BTreeMap<NaiveDate, Bar>>,
    dates: BTreeSet<NaiveDate>,
}

impl InMemoryMarketData {
    /// Later bars for the same `(symbol, date)` replace earlier ones.
    pub fn new(bars: Vec<Bar>) -> Self {
        let mut index = InMemoryMarketData::default();
        for bar in bars {
            index.insert(bar);
        }
        index
    }

    fn insert(&mut self, bar: Bar) {
        let date = bar.date;
        self.dates.insert(date);
        let series = self.bars.entry(bar.symbol.clone()).or_default();
        if let Some(old) = series.insert(date, bar) {
            warn!(symbol = %old.symbol, %date, "duplicate bar replaced");
        }
    }

    pub fn extend(&mut self, bars: Vec<Bar>) {
        for bar in bars {
            self.insert(bar);
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.bars.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn bar_count(&self) -> usize {
        self.bars.values().map(BTreeMap::len).sum()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl MarketDataIndex for InMemoryMarketData {
    fn get(&self, symbol: &str, date: NaiveDate) -> Option<&Bar> {
        self.bars.get(symbol)?.get(&date)
    }

    fn trading_dates(&self) -> Vec<NaiveDate> {
        self.dates.iter().copied().collect()
    }
}
