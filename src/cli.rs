//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::csv_adapter::{CsvAdapter, load_signals};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_market_data::InMemoryMarketData;
use crate::domain::config_validation::{validate_config_file, validate_simulation_config};
use crate::domain::error::SimError;
use crate::domain::metrics::{
    BenchmarkComparison, Metrics, PerformanceAnalyzer, ROLLING_WINDOW, format_summary,
    yearly_returns,
};
use crate::domain::simulator::{SimulationConfig, SimulationResult, TradingSimulator};
use crate::domain::walk_forward::{WalkForwardConfig, WalkForwardReport, run_walk_forward};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Historical trade-execution simulator")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "debug", "tradesim=trace")
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate signals against historical bars
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of <SYMBOL>.csv bar files (overrides [data] bars_dir)
        #[arg(long)]
        bars: Option<PathBuf>,
        /// Signal CSV file (overrides [data] signals_file)
        #[arg(long)]
        signals: Option<PathBuf>,
        /// Report directory (overrides [report] output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Annual benchmark return for comparison, as a fraction
        #[arg(long)]
        benchmark: Option<f64>,
        /// Validate config and load inputs without simulating
        #[arg(long)]
        dry_run: bool,
    },
    /// Run independent simulations over rolling test windows
    WalkForward {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        bars: Option<PathBuf>,
        #[arg(long)]
        signals: Option<PathBuf>,
        #[arg(long)]
        train_days: Option<i64>,
        #[arg(long)]
        test_days: Option<i64>,
        #[arg(long)]
        step_days: Option<i64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range for symbol(s)
    Info {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        bars: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Run {
            config,
            bars,
            signals,
            output,
            benchmark,
            dry_run,
        } => run_simulation(
            &config,
            bars.as_deref(),
            signals.as_deref(),
            output.as_deref(),
            benchmark,
            dry_run,
        ),
        Command::WalkForward {
            config,
            bars,
            signals,
            train_days,
            test_days,
            step_days,
        } => run_walk_forward_command(
            &config,
            bars.as_deref(),
            signals.as_deref(),
            (train_days, test_days, step_days),
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            symbol,
            bars,
            config,
        } => run_info(symbol.as_deref(), bars.as_deref(), config.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SimError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn build_simulation_config(config: &dyn ConfigPort) -> SimulationConfig {
    let defaults = SimulationConfig::default();
    SimulationConfig {
        commission_per_trade: config.get_double(
            "simulation",
            "commission_per_trade",
            defaults.commission_per_trade,
        ),
        slippage_bps: config.get_double("simulation", "slippage_bps", defaults.slippage_bps),
        max_positions: config
            .get_int("simulation", "max_positions", defaults.max_positions as i64)
            .max(0) as usize,
        max_position_notional: config.get_double(
            "simulation",
            "max_position_notional",
            defaults.max_position_notional,
        ),
        max_hold_days: config.get_int("simulation", "max_hold_days", defaults.max_hold_days),
        risk_free_rate: config.get_double("simulation", "risk_free_rate", defaults.risk_free_rate),
    }
}

pub fn initial_capital(config: &dyn ConfigPort) -> f64 {
    config.get_double("simulation", "initial_capital", 100_000.0)
}

pub fn build_walk_forward_config(
    config: &dyn ConfigPort,
    overrides: (Option<i64>, Option<i64>, Option<i64>),
) -> WalkForwardConfig {
    let defaults = WalkForwardConfig::default();
    let (train, test, step) = overrides;
    WalkForwardConfig {
        train_days: train
            .unwrap_or_else(|| config.get_int("walk_forward", "train_days", defaults.train_days)),
        test_days: test
            .unwrap_or_else(|| config.get_int("walk_forward", "test_days", defaults.test_days)),
        step_days: step
            .unwrap_or_else(|| config.get_int("walk_forward", "step_days", defaults.step_days)),
    }
}

/// CLI path if given, else `[section] key`, else a missing-key error.
pub fn resolve_path(
    cli_value: Option<&Path>,
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<PathBuf, SimError> {
    if let Some(p) = cli_value {
        return Ok(p.to_path_buf());
    }
    config
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()))
        .ok_or_else(|| SimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

/// Validated settings for one simulation, read from config.
pub struct RunSettings {
    pub sim_config: SimulationConfig,
    pub initial_capital: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub fn load_run_settings(config: &dyn ConfigPort) -> Result<RunSettings, SimError> {
    validate_config_file(config)?;
    let sim_config = build_simulation_config(config);
    let initial_capital = initial_capital(config);
    validate_simulation_config(&sim_config, initial_capital)?;
    Ok(RunSettings {
        sim_config,
        initial_capital,
        start_date: config.get_date("simulation", "start_date"),
        end_date: config.get_date("simulation", "end_date"),
    })
}

/// Load inputs, simulate, compute metrics and optionally write reports.
pub fn run_simulation_pipeline(
    settings: &RunSettings,
    bars_dir: &Path,
    signals_file: &Path,
    output_dir: Option<&Path>,
) -> Result<(SimulationResult, Metrics), SimError> {
    let market_data = CsvAdapter::new(bars_dir.to_path_buf()).load_market_data()?;
    let signals = load_signals(signals_file)?;

    let simulator = TradingSimulator::new(settings.sim_config.clone());
    let result = simulator.run_window(
        &signals,
        &market_data,
        settings.initial_capital,
        settings.start_date,
        settings.end_date,
    )?;

    let analyzer = PerformanceAnalyzer::new(settings.sim_config.risk_free_rate);
    let metrics = analyzer.calculate_metrics(&result, settings.initial_capital);

    if let Some(dir) = output_dir {
        CsvReportAdapter::new().write_all(&result, &metrics, dir)?;
    }
    Ok((result, metrics))
}

fn run_simulation(
    config_path: &Path,
    bars: Option<&Path>,
    signals: Option<&Path>,
    output: Option<&Path>,
    benchmark: Option<f64>,
    dry_run: bool,
) -> Result<(), SimError> {
    let config = load_config(config_path)?;
    let settings = load_run_settings(&config)?;
    let bars_dir = resolve_path(bars, &config, "data", "bars_dir")?;
    let signals_file = resolve_path(signals, &config, "data", "signals_file")?;
    let output_dir = output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "output_dir").map(PathBuf::from));

    if dry_run {
        let market_data = CsvAdapter::new(bars_dir).load_market_data()?;
        let signal_count = load_signals(&signals_file)?.len();
        eprintln!(
            "Dry run: {} symbols, {} bars, {} signals",
            market_data.symbols().len(),
            market_data.bar_count(),
            signal_count
        );
        if let Some((first, last)) = market_data.date_range() {
            eprintln!("Data range: {first} to {last}");
        }
        eprintln!("Configuration is valid.");
        return Ok(());
    }

    let (result, metrics) =
        run_simulation_pipeline(&settings, &bars_dir, &signals_file, output_dir.as_deref())?;

    let stats = &result.stats;
    eprintln!(
        "Signals: {} received, {} filled, {} invalid, {} duplicate, {} over capacity, {} unfunded, {} without bar, {} off-calendar",
        stats.signals_received,
        stats.signals_filled,
        stats.invalid_signals,
        stats.duplicate_symbol,
        stats.capacity_reached,
        stats.insufficient_capital,
        stats.missing_entry_bar,
        stats.off_calendar_signals,
    );
    println!("{}", format_summary(&metrics));

    let years = yearly_returns(&result.equity_curve);
    if years.len() > 1 {
        println!("\nYearly returns:");
        for y in &years {
            println!("  {}: {:+.2}%", y.label(), y.total_return * 100.0);
        }
    }

    let rolling = PerformanceAnalyzer::new(settings.sim_config.risk_free_rate)
        .rolling_metrics(&result.equity_curve, ROLLING_WINDOW);
    if let Some(last) = rolling.last() {
        println!(
            "\nTrailing {ROLLING_WINDOW}-day: sharpe {:.2}, volatility {:.2}%, max drawdown {:.2}%",
            last.sharpe_ratio,
            last.volatility * 100.0,
            last.max_drawdown * 100.0
        );
    }

    if let Some(benchmark_return) = benchmark {
        let cmp = BenchmarkComparison::compare(&metrics, benchmark_return);
        println!(
            "\nVs benchmark ({:.2}%): return {:+.2}%, sharpe {:+.2}, drawdown {:+.2}%",
            benchmark_return * 100.0,
            cmp.return_difference * 100.0,
            cmp.sharpe_difference,
            cmp.drawdown_difference * 100.0
        );
    }
    if let Some(dir) = output_dir {
        eprintln!("Reports written to {}", dir.display());
    }
    Ok(())
}

fn run_walk_forward_command(
    config_path: &Path,
    bars: Option<&Path>,
    signals: Option<&Path>,
    overrides: (Option<i64>, Option<i64>, Option<i64>),
) -> Result<(), SimError> {
    let config = load_config(config_path)?;
    let settings = load_run_settings(&config)?;
    let wf_config = build_walk_forward_config(&config, overrides);

    let market_data = CsvAdapter::new(resolve_path(bars, &config, "data", "bars_dir")?)
        .load_market_data()?;
    let signals = load_signals(&resolve_path(signals, &config, "data", "signals_file")?)?;

    let Some((first, last)) = market_data.date_range() else {
        return Err(SimError::data_load("no bars loaded"));
    };
    let start = settings.start_date.unwrap_or(first);
    let end = settings.end_date.unwrap_or(last);
    eprintln!(
        "Walk-forward {start} to {end} (train {}, test {}, step {} days)",
        wf_config.train_days, wf_config.test_days, wf_config.step_days
    );

    let report = run_walk_forward(
        &signals,
        &market_data,
        settings.initial_capital,
        &settings.sim_config,
        &wf_config,
        start,
        end,
    )?;
    print_walk_forward(&report);
    Ok(())
}

fn print_walk_forward(report: &WalkForwardReport) {
    if report.results.is_empty() {
        println!("No complete windows in range.");
        return;
    }
    println!("window  test_start  test_end    return%  trades  win%   sharpe  max_dd%");
    for r in &report.results {
        println!(
            "{:>6}  {}  {}  {:>7.2}  {:>6}  {:>5.1}  {:>6.2}  {:>7.2}",
            r.index + 1,
            r.window.test_start,
            r.window.test_end,
            r.metrics.total_return * 100.0,
            r.metrics.total_trades,
            r.metrics.win_rate * 100.0,
            r.metrics.sharpe_ratio,
            r.metrics.max_drawdown * 100.0,
        );
    }
    let s = &report.summary;
    println!("\nWALK-FORWARD SUMMARY:");
    println!("  Windows: {}", s.windows);
    println!("  Avg Return: {:.2}%", s.avg_return * 100.0);
    println!("  Profitable Windows: {:.1}%", s.profitable_windows * 100.0);
    println!("  Best Window: {:.2}%", s.best_return * 100.0);
    println!("  Worst Window: {:.2}%", s.worst_return * 100.0);
    println!("  Avg Sharpe: {:.2}", s.avg_sharpe);
    println!("  Avg Win Rate: {:.1}%", s.avg_win_rate * 100.0);
    println!("  Worst Drawdown: {:.2}%", s.worst_drawdown * 100.0);
}

fn run_validate(config_path: &Path) -> Result<(), SimError> {
    let config = load_config(config_path)?;
    let settings = load_run_settings(&config)?;
    let wf = build_walk_forward_config(&config, (None, None, None));
    let c = &settings.sim_config;

    eprintln!("Initial capital: {:.2}", settings.initial_capital);
    eprintln!(
        "Costs: {:.2} per trade, {:.1} bps slippage",
        c.commission_per_trade, c.slippage_bps
    );
    eprintln!(
        "Limits: {} positions, {:.2} per position, {} day hold",
        c.max_positions, c.max_position_notional, c.max_hold_days
    );
    eprintln!("Risk-free rate: {:.4}", c.risk_free_rate);
    match (settings.start_date, settings.end_date) {
        (None, None) => eprintln!("Window: full data range"),
        (s, e) => eprintln!(
            "Window: {} to {}",
            s.map_or("start of data".to_string(), |d| d.to_string()),
            e.map_or("end of data".to_string(), |d| d.to_string())
        ),
    }
    eprintln!(
        "Walk-forward: train {}, test {}, step {} days",
        wf.train_days, wf.test_days, wf.step_days
    );
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_info(symbol: Option<&str>, bars: Option<&Path>, config_path: Option<&Path>) -> Result<(), SimError> {
    let config = config_path.map(load_config).transpose()?;
    let bars_dir = match (bars, &config) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(c)) => resolve_path(None, c, "data", "bars_dir")?,
        (None, None) => {
            return Err(SimError::configuration(
                "bars_dir",
                "--bars or --config is required for info",
            ));
        }
    };

    let adapter = CsvAdapter::new(bars_dir);
    let symbols = match symbol {
        Some(s) => vec![s.to_uppercase()],
        None => adapter.list_symbols()?,
    };

    for s in &symbols {
        match adapter.load_bars(s) {
            Ok(series) => {
                let data = InMemoryMarketData::new(series);
                match data.date_range() {
                    Some((first, last)) => {
                        println!("{}: {} bars, {} to {}", s, data.bar_count(), first, last)
                    }
                    None => eprintln!("{s}: no data found"),
                }
            }
            Err(e) => eprintln!("error reading {s}: {e}"),
        }
    }
    Ok(())
}
