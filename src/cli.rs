//! CLI argument parsing

use crate::backends;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tlna_core::{Termination, WindowFunction};

/// Parse a window function name
fn parse_window(s: &str) -> Result<WindowFunction, String> {
    WindowFunction::parse(s).ok_or_else(|| {
        let names: Vec<&str> = WindowFunction::ALL.iter().map(|w| w.name()).collect();
        format!("Unknown window '{}'. Valid windows: {}", s, names.join(", "))
    })
}

/// Parse a termination value like "50" or "1M"
fn parse_termination(s: &str) -> Result<Termination, String> {
    Termination::parse(s)
        .ok_or_else(|| format!("Unknown termination '{}'. Valid values: 1M, 50k, 5k, 500, 50", s))
}

/// Generate dynamic help text for the backend argument
fn backend_help() -> String {
    format!(
        "Backend to use [available: {}]",
        backends::backend_names_short()
    )
}

#[derive(Parser)]
#[command(name = "tlna")]
#[command(author, version, about = "Noise analyzer acquisition and spectrum tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Session settings file (TOML format)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Per transfer timeout in milliseconds (overrides the settings file)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Checksum resend budget per frame (overrides the settings file)
    #[arg(long, global = true)]
    pub frame_retries: Option<u8>,

    /// Acquisition restart budget after losing sync (overrides the settings file)
    #[arg(long, global = true)]
    pub sync_restarts: Option<u8>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available backends
    ListBackends,

    /// Locate an analyzer without opening it
    Find {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,
    },

    /// Print the analyzer serial number
    Serial {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,
    },

    /// Acquire one time-domain buffer
    TimeDomain {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,

        /// Acquire the built-in test signal instead of the input
        #[arg(long)]
        test_signal: bool,

        /// Output file (one sample per line)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Acquire and compute power spectra
    Spectrum {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,

        /// Window function (rectangular, blackman-harris, blackman, hann)
        #[arg(short, long, default_value = "hann", value_parser = parse_window)]
        window: WindowFunction,

        /// Remove the mean of each acquisition before windowing
        #[arg(long)]
        subtract_mean: bool,

        /// Number of spectra to average
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Acquire the built-in test signal instead of the input
        #[arg(long)]
        test_signal: bool,

        /// Write the per-bin mean of the three segments instead of all of them
        #[arg(long)]
        fold: bool,

        /// Output file (one value per line)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Set the input termination (fixed on current hardware)
    Termination {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: String,

        /// Termination: 1M, 50k, 5k, 500 or 50
        #[arg(value_parser = parse_termination)]
        value: Termination,
    },
}
