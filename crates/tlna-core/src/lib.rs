//! tlna-core - Host library for the two-channel USB noise analyzer
//!
//! This crate holds everything that does not depend on a particular USB
//! stack: the frame codec, the acquisition assembler with its retry policy,
//! the DSP pipeline and the session facade. Backends provide a
//! [`Connector`] implementation.
//!
//! # Features
//!
//! - `serde` - Derive `Deserialize`/`Serialize` for [`AnalyzerConfig`]
//!
//! # Example
//!
//! ```ignore
//! use tlna_core::{NoiseAnalyzer, SpectrumFlags, WindowFunction};
//!
//! let mut analyzer = NoiseAnalyzer::new(connector);
//! analyzer.find()?;
//! analyzer.init()?;
//! let spectrum = analyzer.spectrum(WindowFunction::Hann, SpectrumFlags::SUBTRACT_MEAN)?;
//! println!("first bin: {}", spectrum[0]);
//! analyzer.close()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod analyzer;
pub mod assembler;
pub mod buffer;
pub mod config;
pub mod dsp;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod transport;

pub use analyzer::{NoiseAnalyzer, SessionState};
pub use buffer::{Spectrum, TimeDomain};
pub use config::{AnalyzerConfig, TerminationMode};
pub use dsp::{SpectrumFlags, WindowFunction};
pub use error::{Error, Result};
pub use frame::SerialNumber;
pub use protocol::{SignalSource, Termination};
pub use transport::{Channel, Connector, Location, LocationPair, Transport};
