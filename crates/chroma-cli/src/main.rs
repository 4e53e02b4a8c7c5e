//! chroma - colorimeter command line
//!
//! Drives a colorimeter over the simulated TCS3430 rig: scans, white/black
//! calibration sessions, matrix fitting, diagnostics and saved samples.
//! Calibration, references and samples persist in a YAML store file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod commands;
mod sim;

#[derive(Parser)]
#[command(name = "chroma")]
#[command(author, version, about = "TCS3430 colorimeter calibration and scanning")]
#[command(long_about = "
Colorimeter calibration and scanning over a simulated TCS3430 sensor.

The surface in front of the sensor is given with --surface, either as a
name (white, grey, black, red, green, blue, ...) or as X,Y,Z,IR counts at
LED brightness 128.

Examples:
  chroma scan                                # Scan the default white tile
  chroma scan --surface red --save           # Scan and keep a sample
  chroma scan --continuous --surface grey    # Stability over 5 seconds
  chroma calibrate                           # White + black references
  chroma fit --set color-checker             # Fit the low-IR matrix
  chroma diagnostics --json
  chroma samples list
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every command.
#[derive(Args)]
pub struct GlobalArgs {
    /// Device config file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Persistent store file
    #[arg(short, long, global = true, default_value = "chroma-store.yaml")]
    store: PathBuf,

    /// Surface in front of the sensor: a name or X,Y,Z,IR counts at LED 128
    #[arg(long, global = true, default_value = "white")]
    surface: String,

    /// Ambient light as X,Y,Z,IR counts
    #[arg(long, global = true)]
    ambient: Option<String>,

    /// Use the wall clock instead of simulated time
    #[arg(long, global = true)]
    realtime: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to daily files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure the surface
    #[command(visible_alias = "s")]
    Scan(ScanArgs),

    /// Run a white/black reference calibration session
    #[command(visible_alias = "cal")]
    Calibrate(CalibrateArgs),

    /// Measure a reference patch set and fit a calibration matrix
    Fit(FitArgs),

    /// Show device state
    #[command(visible_alias = "diag")]
    Diagnostics(DiagnosticsArgs),

    /// List or manage saved samples
    Samples(SamplesArgs),

    /// Restore factory matrices and clear references
    Reset(ResetArgs),

    /// Print the effective configuration as YAML
    Config,
}

#[derive(Args)]
struct ScanArgs {
    /// Read continuously and report stability instead
    #[arg(long)]
    continuous: bool,

    /// Save the result as a sample
    #[arg(long)]
    save: bool,

    /// Hold the LED at this brightness instead of searching
    #[arg(long)]
    led: Option<u8>,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CalibrateArgs {
    /// LED brightness for the white reference (64-255)
    #[arg(short, long)]
    brightness: Option<u8>,

    /// White tile as X,Y,Z,IR counts at LED 128
    #[arg(long)]
    white: Option<String>,

    /// Black trap reading as X,Y,Z,IR counts with the LED off
    #[arg(long)]
    black: Option<String>,

    /// Save after the white reference, skipping the black one
    #[arg(long)]
    white_only: bool,
}

/// Built-in reference patch sets.
#[derive(Clone, Copy, ValueEnum)]
enum PatchSet {
    /// 12 ColorChecker patches
    ColorChecker,
    /// 7 primary paints
    Primaries,
}

/// Matrix slot to fit.
#[derive(Clone, Copy, ValueEnum)]
enum MatrixSlot {
    /// Low-IR matrix
    Low,
    /// High-IR matrix
    High,
}

#[derive(Args)]
struct FitArgs {
    /// Patch set to measure
    #[arg(long, value_enum, default_value = "color-checker")]
    set: PatchSet,

    /// Matrix to replace
    #[arg(short, long, value_enum, default_value = "low")]
    matrix: MatrixSlot,

    /// Write the calibration as JSON to this file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DiagnosticsArgs {
    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SamplesArgs {
    #[command(subcommand)]
    action: Option<SampleAction>,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum SampleAction {
    /// List samples, newest first
    List,
    /// Delete one sample (0 = newest)
    Delete {
        /// Sample index
        index: usize,
    },
    /// Delete every sample
    Clear,
}

#[derive(Args)]
struct ResetArgs {
    /// Keep the white and black references
    #[arg(long)]
    keep_references: bool,
}

fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "chroma.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.global.verbose, cli.global.log_dir.as_deref())?;

    match cli.command {
        Commands::Scan(args) => commands::scan::run(args, &cli.global),
        Commands::Calibrate(args) => commands::calibrate::run(args, &cli.global),
        Commands::Fit(args) => commands::fit::run(args, &cli.global),
        Commands::Diagnostics(args) => commands::diagnostics::run(args, &cli.global),
        Commands::Samples(args) => commands::samples::run(args, &cli.global),
        Commands::Reset(args) => commands::reset(args, &cli.global),
        Commands::Config => commands::print_config(&cli.global),
    }
}
