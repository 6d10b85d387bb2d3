//! tlna-ftdi - FT2232H backend for the noise analyzer
//!
//! The analyzer enumerates as an FTDI FT2232H. Interface A carries control
//! commands and interface B carries sample data. Both are opened through
//! libftdi; nusb is used to enumerate devices and report their location.
//! Each channel is opened by the bus and address found during enumeration.
//!
//! Reads honor the session timeout. Writes are bounded by libftdi's own USB
//! write timeout (5 s) instead.
//!
//! # Example
//!
//! ```no_run
//! use tlna_core::NoiseAnalyzer;
//! use tlna_ftdi::{FtdiConfig, FtdiConnector};
//!
//! let mut analyzer = NoiseAnalyzer::new(FtdiConnector::new(FtdiConfig::default()));
//! analyzer.find()?;
//! analyzer.init()?;
//! println!("serial: {}", analyzer.serial_number()?);
//! analyzer.close()?;
//! # Ok::<(), tlna_core::Error>(())
//! ```
//!
//! # Backend Options
//!
//! When using the CLI, the following options are available:
//!
//! - `index=<N>` - Which analyzer to use when several are connected (default: 0)
//! - `latency=<ms>` - FTDI latency timer, 1-255 (default: 2)
//! - `vid=<hex>` - USB vendor ID override (default: 0403)
//! - `pid=<hex>` - USB product ID override (default: 6010)

mod device;
mod error;
mod protocol;

pub use device::{list_devices, parse_options, FtdiChannel, FtdiConfig, FtdiConnector, FtdiDeviceInfo};
pub use error::{FtdiError, Result};
pub use protocol::{FTDI_FT2232H_PID, FTDI_VID};
