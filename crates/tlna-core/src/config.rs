//! Session configuration
//!
//! With the `serde` feature an [`AnalyzerConfig`] can be loaded from a file:
//!
//! ```toml
//! timeout_ms = 500
//! frame_retries = 3
//! sync_restarts = 2
//! termination = "ignore"
//! ```

use std::time::Duration;

/// How the deprecated termination setting is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TerminationMode {
    /// Accept the call and do nothing (current hardware revisions)
    #[default]
    Ignore,
    /// Send the setting to the device
    Forward,
}

/// Timeouts and retry budgets for one session
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalyzerConfig {
    /// Per read/write timeout in milliseconds
    ///
    /// Backends may bound writes with a fixed timeout of their own; the FTDI
    /// backend uses libftdi's 5 s USB write timeout.
    pub timeout_ms: u64,
    /// Resend attempts per frame after a checksum fault
    pub frame_retries: u8,
    /// Acquisition restarts after losing synchronization
    pub sync_restarts: u8,
    /// Termination handling
    pub termination: TerminationMode,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            frame_retries: 3,
            sync_restarts: 3,
            termination: TerminationMode::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Per operation timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the per operation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    /// Set the frame-level checksum retry budget
    pub fn with_frame_retries(mut self, retries: u8) -> Self {
        self.frame_retries = retries;
        self
    }

    /// Set the acquisition restart budget
    pub fn with_sync_restarts(mut self, restarts: u8) -> Self {
        self.sync_restarts = restarts;
        self
    }

    /// Set termination handling
    pub fn with_termination(mut self, mode: TerminationMode) -> Self {
        self.termination = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = AnalyzerConfig::default()
            .with_timeout(Duration::from_millis(250))
            .with_frame_retries(0)
            .with_sync_restarts(5)
            .with_termination(TerminationMode::Forward);
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.frame_retries, 0);
        assert_eq!(config.sync_restarts, 5);
        assert_eq!(config.termination, TerminationMode::Forward);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_partial() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            timeout_ms = 200
            termination = "forward"
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout_ms, 200);
        assert_eq!(config.frame_retries, 3);
        assert_eq!(config.termination, TerminationMode::Forward);
    }
}
