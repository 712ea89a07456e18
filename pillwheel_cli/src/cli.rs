//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config path used when `--config` is not given. A missing file here is not an error.
pub const DEFAULT_CONFIG: &str = "etc/pillwheel.toml";

/// Environment knob: `PILLWHEEL_SIM_JAM=1` jams every simulated hopper.
pub const SIM_JAM_ENV: &str = "PILLWHEEL_SIM_JAM";

#[derive(Parser, Debug)]
#[command(name = "pillwheel", version, about = "PillWheel dispenser CLI")]
pub struct Cli {
    /// Path to config TOML [default: etc/pillwheel.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Prescription CSV (label,channel,required); replaces [[hoppers]]
    #[arg(long, value_name = "FILE")]
    pub prescription: Option<PathBuf>,

    /// Print events and errors as JSON lines instead of screens
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one dispense session for the configured prescription
    Dispense {
        /// Confirm the prescription without prompting
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "reject")]
        yes: bool,
        /// Reject the prescription without prompting
        #[arg(long, action = ArgAction::SetTrue)]
        reject: bool,
        /// Replay every delay on a simulated clock (no real waiting)
        #[arg(long, action = ArgAction::SetTrue)]
        instant: bool,
        /// Override retry.max_attempts
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,
    },
    /// Run one closed/open/closed cycle on a single hopper
    TestServo {
        /// Hopper label (case-insensitive) or 0-based index
        #[arg(long, value_name = "LABEL|INDEX")]
        hopper: String,
    },
    /// Validate config and report hardware presence / simulation
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}

/// Output mode chosen on the command line (defaults to screens).
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}
