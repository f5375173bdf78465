//! Signal source port.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::signal::Signal;

pub trait SignalSource {
    /// Signals issued for `date`, in issue order.
    fn for_date(&self, date: NaiveDate) -> Vec<Signal>;
}

/// In-memory signal source grouped by date.
#[derive(Debug, Clone, Default)]
pub struct SignalBook {
    by_date: BTreeMap<NaiveDate, Vec<Signal>>,
}

impl SignalBook {
    pub fn new(signals: &[Signal]) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<Signal>> = BTreeMap::new();
        for signal in signals {
            by_date.entry(signal.date).or_default().push(signal.clone());
        }
        SignalBook { by_date }
    }

    /// Keep only signals dated inside `[start, end]` (either bound optional).
    pub fn restrict(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let by_date = self
            .by_date
            .iter()
            .filter(|(date, _)| start.is_none_or(|s| **date >= s) && end.is_none_or(|e| **date <= e))
            .map(|(date, signals)| (*date, signals.clone()))
            .collect();
        SignalBook { by_date }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_date.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

impl SignalSource for SignalBook {
    fn for_date(&self, date: NaiveDate) -> Vec<Signal> {
        self.by_date.get(&date).cloned().unwrap_or_default()
    }
}
