//! Backend registration and dispatch
//!
//! This module provides a centralized registry for all backends, with support
//! for feature-gated inclusion and dynamic help text generation.

use tlna_core::{AnalyzerConfig, Connector, Location, LocationPair, NoiseAnalyzer, Transport};

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "In-memory analyzer emulator (bin=<N>,bins=<N/N/..>,noise=<f>,serial=<s>)",
    });

    #[cfg(feature = "ftdi")]
    backends.push(BackendInfo {
        name: "ftdi",
        aliases: &["ft2232h"],
        description: "FT2232H USB analyzer (VID:0403 PID:6010) (index=<N>,latency=<ms>)",
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let backends = available_backends();

    if backends.is_empty() {
        return "No backends available (recompile with backend features enabled)".to_string();
    }

    let mut help = String::from("Available backends:\n");
    for b in &backends {
        help.push_str(&format!("  {:8} - {}\n", b.name, b.description));
    }
    help
}

/// Generate a short list of backend names for CLI help
pub fn backend_names_short() -> String {
    let backends = available_backends();
    let names: Vec<&str> = backends.iter().map(|b| b.name).collect();
    names.join(", ")
}

/// Resolve a backend name or alias to its primary name
pub fn find_backend(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// Parse a backend string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_backend_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Connector for whichever backend was selected on the command line
pub enum BackendConnector {
    /// In-memory emulator
    #[cfg(feature = "dummy")]
    Dummy(tlna_dummy::DummyConnector),
    /// FT2232H hardware
    #[cfg(feature = "ftdi")]
    Ftdi(tlna_ftdi::FtdiConnector),
}

impl Connector for BackendConnector {
    type Channel = Box<dyn Transport>;

    fn find(&mut self) -> tlna_core::Result<LocationPair> {
        match self {
            #[cfg(feature = "dummy")]
            BackendConnector::Dummy(c) => c.find(),
            #[cfg(feature = "ftdi")]
            BackendConnector::Ftdi(c) => c.find(),
        }
    }

    fn open(&mut self, location: &Location) -> tlna_core::Result<Box<dyn Transport>> {
        match self {
            #[cfg(feature = "dummy")]
            BackendConnector::Dummy(c) => Ok(Box::new(c.open(location)?)),
            #[cfg(feature = "ftdi")]
            BackendConnector::Ftdi(c) => Ok(Box::new(c.open(location)?)),
        }
    }
}

/// Build the connector named by `backend`
///
/// The backend string can be just the name (e.g., "ftdi") or include
/// parameters (e.g., "ftdi:index=1").
#[allow(unused_variables)]
pub fn connector(backend: &str) -> Result<BackendConnector, Box<dyn std::error::Error>> {
    let (name, options) = parse_backend_string(backend);

    let canonical_name = match find_backend(name) {
        Some(n) => n,
        None => return Err(unknown_backend_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            let config = tlna_dummy::parse_options(&options)
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
            Ok(BackendConnector::Dummy(tlna_dummy::DummyConnector::new(
                config,
            )))
        }

        #[cfg(feature = "ftdi")]
        "ftdi" => {
            let config = tlna_ftdi::parse_options(&options)
                .map_err(|e| format!("Invalid FTDI parameters: {}", e))?;
            Ok(BackendConnector::Ftdi(tlna_ftdi::FtdiConnector::new(config)))
        }

        _ => Err(unknown_backend_error(name)),
    }
}

/// Find and open the analyzer behind `backend`
pub fn open_analyzer(
    backend: &str,
    config: AnalyzerConfig,
) -> Result<NoiseAnalyzer<BackendConnector>, Box<dyn std::error::Error>> {
    let mut analyzer = NoiseAnalyzer::with_config(connector(backend)?, config);

    let locations = analyzer.find().map_err(|e| {
        format!(
            "{}\nMake sure the analyzer is connected and you have permissions.",
            e
        )
    })?;
    log::debug!("Channel A: {}, channel B: {}", locations.a, locations.b);

    analyzer.init()?;
    Ok(analyzer)
}

fn unknown_backend_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown backend: {}\n\n", name);
    msg.push_str(&backend_help());
    msg.push_str("\nUse 'tlna list-backends' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_string() {
        assert_eq!(parse_backend_string("dummy"), ("dummy", vec![]));
        assert_eq!(
            parse_backend_string("ftdi:index=1,latency=4"),
            ("ftdi", vec![("index", "1"), ("latency", "4")])
        );
        // Options without a value are dropped
        assert_eq!(
            parse_backend_string("dummy:verbose,bin=7"),
            ("dummy", vec![("bin", "7")])
        );
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_find_backend_alias() {
        assert_eq!(find_backend("emulator"), Some("dummy"));
        assert_eq!(find_backend("nonexistent"), None);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_unknown_backend() {
        let err = connector("nonexistent").err().map(|e| e.to_string());
        assert!(err.is_some_and(|e| e.starts_with("Unknown backend: nonexistent")));
    }
}
