//! Session settings file loading

use std::path::{Path, PathBuf};

use thiserror::Error;
use tlna_core::AnalyzerConfig;

/// Errors loading a settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// File is not valid settings TOML
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying TOML error
        source: toml::de::Error,
    },
}

/// Parse settings from TOML text; missing keys keep their defaults
pub fn parse_config(text: &str, path: &Path) -> Result<AnalyzerConfig, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings from `path`, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(AnalyzerConfig::default());
    };

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text, path)?;
    log::info!("Loaded settings from {:?}", path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlna_core::TerminationMode;

    #[test]
    fn test_defaults_without_file() {
        assert_eq!(load_config(None).unwrap(), AnalyzerConfig::default());
    }

    #[test]
    fn test_parse() {
        let config = parse_config(
            "frame_retries = 0\nsync_restarts = 7\ntermination = \"forward\"\n",
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(config.frame_retries, 0);
        assert_eq!(config.sync_restarts, 7);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.termination, TerminationMode::Forward);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_config("frame_retries = \"many\"", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse bad.toml"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/tlna.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
