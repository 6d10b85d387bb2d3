//! Error types for tlna-core
//!
//! Every fault the library can report is one variant of [`Error`]. The set is
//! closed and mirrors the return codes of the instrument's vendor SDK, see
//! [`Error::code`].

use crate::analyzer::SessionState;
use thiserror::Error;

/// Core error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    // Session errors
    /// Opening the channel pair failed
    #[error("failed to initialize noise analyzer")]
    Init,
    /// Enumeration found no matching instrument
    #[error("noise analyzer not found")]
    DeviceNotFound,
    /// Operation requires an open session
    #[error("noise analyzer not ready (session is {0})")]
    NotReady(SessionState),
    /// Closing one of the channels failed
    #[error("failed to close noise analyzer")]
    Close,

    // Acquisition errors
    /// Time-domain acquisition failed or exhausted its retry budget
    #[error("time-domain read failed")]
    Read,
    /// Device rejected a write
    #[error("write failed")]
    Write,
    /// Device rejected the termination setting
    #[error("failed to set input termination")]
    SetTermination,
    /// Spectrum acquisition exhausted its retry budget
    #[error("spectrum acquisition failed")]
    GetSpectrum,
    /// Serial number query failed
    #[error("failed to read serial number")]
    GetSerialNumber,

    // Transport errors
    /// Read or write did not complete within the timeout
    #[error("communication timeout")]
    CommsTimeout,
    /// Writing to the SPI bridge failed
    #[error("SPI write failed")]
    SpiWrite,
    /// Reading from the SPI bridge failed, or checksum retries were exhausted
    #[error("SPI read failed")]
    SpiRead,

    // Framing errors
    /// Frame checksum does not match its contents
    #[error("checksum mismatch: expected 0x{expected:04X}, computed 0x{actual:04X}")]
    Checksum {
        /// Checksum carried by the frame
        expected: u16,
        /// Checksum computed over the received bytes
        actual: u16,
    },
    /// Sync marker not found where a frame should start
    #[error("stream unsynchronized: found {found:02X?} instead of sync marker")]
    Unsynced {
        /// Bytes found at the marker offset
        found: [u8; 2],
    },
    /// Frame length field disagrees with the expected payload size
    #[error("SPI buffer error")]
    SpiBuffer,
    /// Frame buffer could not be allocated
    #[error("SPI buffer allocation failed")]
    SpiAlloc,

    // Caller contract errors
    /// Output spectrum buffer has the wrong length
    #[error("spectrum buffer length {actual}, expected {expected}")]
    SpectrumLength {
        /// Required length
        expected: usize,
        /// Length supplied by the caller
        actual: usize,
    },
    /// Caller supplied buffer has the wrong length
    #[error("buffer length {actual}, expected {expected}")]
    BufferLength {
        /// Required length
        expected: usize,
        /// Length supplied by the caller
        actual: usize,
    },
}

impl Error {
    /// Numeric return code as defined by the instrument SDK (`A_OK` is 0)
    pub fn code(&self) -> i32 {
        match self {
            Self::Init | Self::NotReady(_) => 1,
            Self::DeviceNotFound => 2,
            Self::Read => 3,
            Self::Write => 4,
            Self::SetTermination => 5,
            Self::GetSpectrum => 6,
            Self::CommsTimeout => 7,
            Self::SpectrumLength { .. } => 8,
            Self::SpiWrite => 9,
            Self::SpiRead => 10,
            Self::Checksum { .. } => 11,
            Self::Unsynced { .. } => 12,
            Self::GetSerialNumber => 13,
            Self::BufferLength { .. } => 14,
            Self::Close => 15,
            Self::SpiBuffer => 16,
            Self::SpiAlloc => 17,
        }
    }

    /// Whether a frame-level retry may clear this fault
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Checksum { .. } | Self::Unsynced { .. })
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sdk_order() {
        assert_eq!(Error::Init.code(), 1);
        assert_eq!(Error::CommsTimeout.code(), 7);
        assert_eq!(
            Error::SpectrumLength {
                expected: 12291,
                actual: 12288
            }
            .code(),
            8
        );
        assert_eq!(Error::Unsynced { found: [0, 0] }.code(), 12);
        assert_eq!(Error::SpiAlloc.code(), 17);
        assert_eq!(Error::NotReady(SessionState::Closed).code(), 1);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Checksum {
            expected: 1,
            actual: 2
        }
        .is_retryable());
        assert!(!Error::CommsTimeout.is_retryable());
        assert!(!Error::BufferLength {
            expected: 8192,
            actual: 1
        }
        .is_retryable());
    }
}
