//! tlna - Noise analyzer acquisition and spectrum tool
//!
//! Talks to the two-channel USB noise analyzer through one of the backends
//! compiled in (FT2232H hardware or the in-memory emulator), acquires
//! time-domain buffers and computes windowed power spectra.

mod backends;
mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use commands::acquire::SpectrumOptions;
use tlna_core::{AnalyzerConfig, NoiseAnalyzer, SignalSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still wins over -v
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    let settings = session_config(&cli)?;
    log::debug!("Session settings: {:?}", settings);

    match cli.command {
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
        Commands::Find { backend } => {
            let mut analyzer =
                NoiseAnalyzer::with_config(backends::connector(&backend)?, settings);
            commands::info::run_find(&mut analyzer)
        }
        Commands::Serial { backend } => {
            let mut analyzer = backends::open_analyzer(&backend, settings)?;
            let result = commands::info::run_serial(&mut analyzer);
            finish(&mut analyzer, result)
        }
        Commands::TimeDomain {
            backend,
            test_signal,
            output,
        } => {
            let mut analyzer = backends::open_analyzer(&backend, settings)?;
            let result = commands::acquire::run_time_domain(
                &mut analyzer,
                source(test_signal),
                output.as_deref(),
            );
            finish(&mut analyzer, result)
        }
        Commands::Spectrum {
            backend,
            window,
            subtract_mean,
            count,
            test_signal,
            fold,
            output,
        } => {
            let mut analyzer = backends::open_analyzer(&backend, settings)?;
            let options = SpectrumOptions {
                window,
                subtract_mean,
                count,
                source: source(test_signal),
                fold,
            };
            let result =
                commands::acquire::run_spectrum(&mut analyzer, options, output.as_deref());
            finish(&mut analyzer, result)
        }
        Commands::Termination { backend, value } => {
            let mut analyzer = backends::open_analyzer(&backend, settings)?;
            let result = commands::info::run_termination(&mut analyzer, value);
            finish(&mut analyzer, result)
        }
    }
}

/// Settings file plus command line overrides
fn session_config(cli: &Cli) -> Result<AnalyzerConfig, Box<dyn std::error::Error>> {
    let mut settings = config::load_config(cli.config.as_deref())?;
    if let Some(ms) = cli.timeout_ms {
        settings.timeout_ms = ms;
    }
    if let Some(n) = cli.frame_retries {
        settings.frame_retries = n;
    }
    if let Some(n) = cli.sync_restarts {
        settings.sync_restarts = n;
    }
    Ok(settings)
}

/// Default log filter for the given number of `-v` flags
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn source(test_signal: bool) -> SignalSource {
    if test_signal {
        SignalSource::TestSignal
    } else {
        SignalSource::Input
    }
}

/// Close the analyzer, reporting the command error first if there was one
fn finish(
    analyzer: &mut NoiseAnalyzer<backends::BackendConnector>,
    result: Result<(), Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = &result {
        if let Some(core) = e.downcast_ref::<tlna_core::Error>() {
            log::debug!("Command failed with code {}", core.code());
        }
    }
    let closed = analyzer.close();
    result?;
    closed?;
    Ok(())
}
