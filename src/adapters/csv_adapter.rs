//! CSV file adapter for bars and signals.
//!
//! Bars live one file per symbol, `<base>/<SYMBOL>.csv`, with the header
//! `date,open,high,low,close,volume`. Signals live in a single file with the
//! header `symbol,date,side,target_notional,stop_loss_price,target_price`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::adapters::memory_market_data::InMemoryMarketData;
use crate::domain::bar::Bar;
use crate::domain::error::SimError;
use crate::domain::signal::{Side, Signal};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Bars for `symbol`, sorted by date. Malformed rows are skipped.
    pub fn load_bars(&self, symbol: &str) -> Result<Vec<Bar>, SimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            SimError::data_load(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        let mut skipped = 0usize;

        for (line, result) in rdr.records().enumerate() {
            let record = result?;
            match parse_bar(symbol, &record) {
                Ok(bar) if bar.is_well_formed() => bars.push(bar),
                Ok(bar) => {
                    warn!(symbol, date = %bar.date, "skipping inconsistent bar");
                    skipped += 1;
                }
                Err(reason) => {
                    warn!(symbol, row = line + 2, %reason, "skipping malformed bar row");
                    skipped += 1;
                }
            }
        }

        bars.sort_by_key(|b| b.date);
        debug!(symbol, bars = bars.len(), skipped, "loaded bars");
        Ok(bars)
    }

    /// Symbols with a bar file under the base path, sorted.
    pub fn list_symbols(&self) -> Result<Vec<String>, SimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            SimError::data_load(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    /// Every symbol's bars in one index, ready for a run.
    pub fn load_market_data(&self) -> Result<InMemoryMarketData, SimError> {
        let mut data = InMemoryMarketData::default();
        for symbol in self.list_symbols()? {
            data.extend(self.load_bars(&symbol)?);
        }
        info!(
            symbols = data.symbols().len(),
            bars = data.bar_count(),
            path = %self.base_path.display(),
            "loaded market data"
        );
        Ok(data)
    }
}

/// Signals from `path`, stably sorted by date. Rows that cannot be parsed are
/// skipped; semantic checks are left to the simulator.
pub fn load_signals(path: &Path) -> Result<Vec<Signal>, SimError> {
    let content = fs::read_to_string(path)
        .map_err(|e| SimError::data_load(format!("failed to read {}: {}", path.display(), e)))?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut signals = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        match parse_signal(&record) {
            Ok(signal) => signals.push(signal),
            Err(reason) => warn!(row = line + 2, %reason, "skipping malformed signal row"),
        }
    }

    signals.sort_by_key(|s| s.date);
    info!(signals = signals.len(), path = %path.display(), "loaded signals");
    Ok(signals)
}

fn field<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| format!("missing {name} column"))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| format!("invalid date {value:?}: {e}"))
}

fn parse_f64(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = field(record, idx, name)?;
    raw.parse()
        .map_err(|e| format!("invalid {name} value {raw:?}: {e}"))
}

/// Blank or absent optional price columns mean "no level".
fn parse_optional_f64(record: &StringRecord, idx: usize, name: &str) -> Result<Option<f64>, String> {
    match record.get(idx).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| format!("invalid {name} value {raw:?}: {e}")),
    }
}

fn parse_bar(symbol: &str, record: &StringRecord) -> Result<Bar, String> {
    let volume_raw = field(record, 5, "volume")?;
    let volume = volume_raw
        .parse::<i64>()
        .or_else(|_| volume_raw.parse::<f64>().map(|v| v as i64))
        .map_err(|e| format!("invalid volume value {volume_raw:?}: {e}"))?;

    Ok(Bar {
        symbol: symbol.to_string(),
        date: parse_date(field(record, 0, "date")?)?,
        open: parse_f64(record, 1, "open")?,
        high: parse_f64(record, 2, "high")?,
        low: parse_f64(record, 3, "low")?,
        close: parse_f64(record, 4, "close")?,
        volume,
    })
}

fn parse_signal(record: &StringRecord) -> Result<Signal, String> {
    let symbol = field(record, 0, "symbol")?;
    let date = parse_date(field(record, 1, "date")?)?;
    let side: Side = field(record, 2, "side")?.parse()?;
    let notional = parse_f64(record, 3, "target_notional")?;

    let mut signal = Signal::new(symbol, date, side, notional);
    signal.stop_loss_price = parse_optional_f64(record, 4, "stop_loss_price")?;
    signal.target_price = parse_optional_f64(record, 5, "target_price")?;
    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::market_data_port::MarketDataIndex;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BHP.csv"), csv_content).unwrap();
        fs::write(path.join("CBA.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "not a bar file").unwrap();

        (dir, path)
    }

    #[test]
    fn load_bars_returns_sorted_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.load_bars("BHP").unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, day(15));
        assert_eq!(bars[0].symbol, "BHP");
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
        assert_eq!(bars[2].date, day(17));
    }

    #[test]
    fn load_bars_skips_malformed_rows() {
        let dir = TempDir::new().unwrap();
        let content = "date,open,high,low,close,volume\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            not-a-date,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,abc,110.0,90.0,105.0,50000\n\
            2024-01-17,100.0,90.0,110.0,105.0,50000\n\
            2024-01-18,100.0,110.0,90.0,105.0,1.5e4\n";
        fs::write(dir.path().join("XYZ.csv"), content).unwrap();

        let bars = CsvAdapter::new(dir.path().to_path_buf()).load_bars("XYZ").unwrap();
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![day(15), day(18)]);
        assert_eq!(bars[1].volume, 15000);
    }

    #[test]
    fn load_bars_missing_file_is_data_load_error() {
        let (_dir, path) = setup_test_data();
        let err = CsvAdapter::new(path).load_bars("NOPE").unwrap_err();
        assert!(matches!(err, SimError::DataLoad { .. }));
    }

    #[test]
    fn list_symbols_only_csv_files() {
        let (_dir, path) = setup_test_data();
        let symbols = CsvAdapter::new(path).list_symbols().unwrap();
        assert_eq!(symbols, vec!["BHP", "CBA"]);
    }

    #[test]
    fn list_symbols_missing_directory() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/bars"));
        assert!(adapter.list_symbols().is_err());
    }

    #[test]
    fn load_market_data_indexes_everything() {
        let (_dir, path) = setup_test_data();
        let data = CsvAdapter::new(path).load_market_data().unwrap();
        assert_eq!(data.bar_count(), 3);
        assert_eq!(data.trading_dates(), vec![day(15), day(16), day(17)]);
        assert!(data.get("BHP", day(16)).is_some());
    }

    #[test]
    fn load_signals_parses_optional_levels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("signals.csv");
        let content = "symbol,date,side,target_notional,stop_loss_price,target_price\n\
            MSFT,2024-01-17,SHORT,2500,,\n\
            AAPL,2024-01-15,LONG,5000,95.0,110.0\n\
            BHP,2024-01-16,buy,1000,, 12.5\n\
            BAD,2024-01-16,SIDEWAYS,1000,,\n\
            CBA,2024-13-01,LONG,1000,,\n";
        fs::write(&path, content).unwrap();

        let signals = load_signals(&path).unwrap();
        assert_eq!(signals.len(), 3);

        assert_eq!(signals[0].symbol, "AAPL");
        assert_eq!(signals[0].side, Side::Long);
        assert_eq!(signals[0].stop_loss_price, Some(95.0));
        assert_eq!(signals[0].target_price, Some(110.0));

        assert_eq!(signals[1].symbol, "BHP");
        assert_eq!(signals[1].stop_loss_price, None);
        assert_eq!(signals[1].target_price, Some(12.5));

        assert_eq!(signals[2].symbol, "MSFT");
        assert_eq!(signals[2].side, Side::Short);
        assert_eq!(signals[2].target_notional, 2500.0);
    }

    #[test]
    fn load_signals_missing_file() {
        let err = load_signals(Path::new("/nonexistent/signals.csv")).unwrap_err();
        assert!(matches!(err, SimError::DataLoad { .. }));
    }
}
