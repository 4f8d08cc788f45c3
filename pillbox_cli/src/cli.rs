//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pillbox", version, about = "Five-container medicine dispenser controller")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults are used when the default path is absent
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

pub const DEFAULT_CONFIG: &str = "etc/pillbox.toml";

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Key script: 0-9 digits, `*` clear, `A`/`#` confirm; whitespace ignored.
    /// Without it keys are read from stdin.
    #[arg(long, value_name = "FILE")]
    pub keys: Option<PathBuf>,
    /// Schedule preset CSV (container,hour,minute,max_temp); skips keypad configuration
    #[arg(long, value_name = "CSV")]
    pub schedule: Option<PathBuf>,
    /// Wall-clock start for the simulated real-time clock ("YYYY-MM-DD HH:MM:SS")
    #[arg(long, value_name = "DATETIME")]
    pub start: Option<String>,
    /// Advance time instantly on every sleep instead of blocking
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Swap the monotonic clock for a manual clock whose sleep advances time instantly.\n\nWhole dispensing days are replayed in milliseconds. Keys then come only from --keys; stdin is not read. Without --run-for-mins the run stops after one simulated day."
    )]
    pub virtual_time: bool,
    /// Stop after this many minutes (simulated minutes under --virtual-time)
    #[arg(long, value_name = "N")]
    pub run_for_mins: Option<u64>,
    /// Simulated ambient temperature in degrees Celsius
    #[arg(long, value_name = "C", default_value_t = 22.0)]
    pub ambient: f32,
    /// Simulated stock on every fitted load cell, in grams
    #[arg(long = "stock-g", value_name = "G", default_value_t = 50.0)]
    pub stock_g: f32,
    /// Simulate a real-time clock that lost power (starts with clock entry)
    #[arg(long, action = ArgAction::SetTrue)]
    pub lost_power: bool,
    /// Simulate a missing real-time clock
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_rtc: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dispenser session until halted, interrupted, or the run limit passes
    Run(RunArgs),
    /// Validate the config (and a schedule CSV when given) and exit
    SelfCheck {
        /// Schedule preset CSV to validate as well
        #[arg(long, value_name = "CSV")]
        schedule: Option<PathBuf>,
    },
    /// Health check for operational monitoring
    Health,
}
