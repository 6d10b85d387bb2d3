//! Error types for the FTDI backend

use std::fmt;

use tlna_core::Error as CoreError;

/// Result type for FTDI operations
pub type Result<T> = std::result::Result<T, FtdiError>;

/// Errors that can occur in the FTDI backend
#[derive(Debug)]
pub enum FtdiError {
    /// No analyzer on the bus
    DeviceNotFound,

    /// Failed to open a channel
    OpenFailed(String),

    /// Failed to configure a channel
    ConfigFailed(String),

    /// Write did not complete
    WriteFailed(String),

    /// Read did not complete
    ReadFailed(String),

    /// Transfer did not complete in time
    Timeout,

    /// Invalid parameter
    InvalidParameter(String),

    /// USB enumeration error
    UsbError(String),
}

impl fmt::Display for FtdiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtdiError::DeviceNotFound => write!(
                f,
                "No noise analyzer found (VID:0403 PID:6010)"
            ),
            FtdiError::OpenFailed(s) => write!(f, "Failed to open channel: {}", s),
            FtdiError::ConfigFailed(s) => write!(f, "Failed to configure channel: {}", s),
            FtdiError::WriteFailed(s) => write!(f, "Write failed: {}", s),
            FtdiError::ReadFailed(s) => write!(f, "Read failed: {}", s),
            FtdiError::Timeout => write!(f, "Timeout during USB transfer"),
            FtdiError::InvalidParameter(s) => write!(f, "Invalid parameter: {}", s),
            FtdiError::UsbError(s) => write!(f, "USB error: {}", s),
        }
    }
}

impl std::error::Error for FtdiError {}

impl From<nusb::Error> for FtdiError {
    fn from(e: nusb::Error) -> Self {
        FtdiError::UsbError(e.to_string())
    }
}

impl From<FtdiError> for CoreError {
    fn from(e: FtdiError) -> Self {
        match e {
            FtdiError::DeviceNotFound | FtdiError::UsbError(_) => CoreError::DeviceNotFound,
            FtdiError::OpenFailed(_)
            | FtdiError::ConfigFailed(_)
            | FtdiError::InvalidParameter(_) => CoreError::Init,
            FtdiError::WriteFailed(_) => CoreError::SpiWrite,
            FtdiError::ReadFailed(_) => CoreError::SpiRead,
            FtdiError::Timeout => CoreError::CommsTimeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_mapping() {
        assert_eq!(CoreError::from(FtdiError::Timeout), CoreError::CommsTimeout);
        assert_eq!(
            CoreError::from(FtdiError::WriteFailed("stall".into())),
            CoreError::SpiWrite
        );
        assert_eq!(
            CoreError::from(FtdiError::ReadFailed("stall".into())),
            CoreError::SpiRead
        );
        assert_eq!(
            CoreError::from(FtdiError::DeviceNotFound),
            CoreError::DeviceNotFound
        );
    }
}
