//! Mean-reversion recommender - main entry point
//!
//! This binary provides six subcommands:
//! - import: Load a CSV file into the candle store
//! - export: Dump every stored timeframe to CSV
//! - backtest: Run the simulator over one parameter set
//! - optimize: Grid-search entry and stop parameters
//! - recommend: Rank timeframes and print a trade plan
//! - spike: Check the latest bar for a volume/range spike

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "reversion-reco")]
#[command(about = "Mean-reversion trade recommendations with backtesting and grid optimization", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to JSON configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import candles from a CSV file
    Import {
        /// CSV file with time,open,high,low,close[,volume] columns
        #[arg(long)]
        csv: PathBuf,

        /// Timeframe of the rows. E.g., "30m", "1H", "1D"
        #[arg(short, long)]
        timeframe: String,

        /// Candle database path (overrides config)
        #[arg(long)]
        db: Option<String>,
    },

    /// Export every stored timeframe to CSV
    Export {
        /// Output directory
        #[arg(short, long, default_value = "data")]
        out_dir: PathBuf,

        /// Candle database path (overrides config)
        #[arg(long)]
        db: Option<String>,
    },

    /// Backtest one parameter set on stored candles
    Backtest {
        /// Timeframe to simulate
        #[arg(short, long, default_value = "60m")]
        timeframe: String,

        /// long or short
        #[arg(short, long, default_value = "long")]
        side: String,

        /// market or limit_offset
        #[arg(long, default_value = "limit_offset")]
        entry_mode: String,

        /// Limit offset in ATR multiples
        #[arg(long, default_value = "0.5")]
        entry_k: f64,

        /// Stop distance in ATR multiples
        #[arg(long, default_value = "1.5")]
        stop_mult: f64,

        /// Fee per side in basis points (overrides config)
        #[arg(long)]
        fee_bps: Option<f64>,
    },

    /// Grid-search entry and stop parameters
    Optimize {
        /// long or short
        #[arg(short, long, default_value = "long")]
        side: String,

        /// Timeframes to optimize (comma-separated). E.g., "30m,60m,180m"
        #[arg(long)]
        timeframes: Option<String>,
    },

    /// Print a ranked recommendation as JSON
    Recommend {
        /// long, short or auto
        #[arg(short, long, default_value = "auto")]
        side: String,

        /// Account risk per trade in percent (overrides config)
        #[arg(long)]
        risk_pct: Option<f64>,

        /// Evaluate only this timeframe (30m, 60m or 180m)
        #[arg(long)]
        tf: Option<String>,
    },

    /// Check the latest stored bar for a volume/range spike
    Spike {
        /// Timeframe to check
        #[arg(short, long, default_value = "30m")]
        timeframe: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Keep the console clean for the progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        // Console logs go to stderr so JSON on stdout stays parseable
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Import { .. } => ("import", false),
        Commands::Export { .. } => ("export", false),
        Commands::Backtest { .. } => ("backtest", false),
        Commands::Optimize { .. } => ("optimize", true),
        Commands::Recommend { .. } => ("recommend", false),
        Commands::Spike { .. } => ("spike", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Import { csv, timeframe, db } => {
            commands::import::run(config_path, csv, timeframe, db)
        }

        Commands::Export { out_dir, db } => commands::export::run(config_path, out_dir, db),

        Commands::Backtest {
            timeframe,
            side,
            entry_mode,
            entry_k,
            stop_mult,
            fee_bps,
        } => commands::backtest::run(
            config_path,
            timeframe,
            side,
            entry_mode,
            entry_k,
            stop_mult,
            fee_bps,
        ),

        Commands::Optimize { side, timeframes } => {
            commands::optimize::run(config_path, side, timeframes)
        }

        Commands::Recommend { side, risk_pct, tf } => {
            commands::recommend::run(config_path, side, risk_pct, tf)
        }

        Commands::Spike { timeframe } => commands::spike::run(config_path, timeframe),
    }
}
