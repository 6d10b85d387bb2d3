//! FT2232H constants for the noise analyzer

use ftdi::Interface;
use tlna_core::Channel;

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT2232H product ID (dual channel)
pub const FTDI_FT2232H_PID: u16 = 0x6010;

/// Default latency timer in milliseconds
pub const DEFAULT_LATENCY_MS: u8 = 2;

/// Poll interval while waiting for read data, in microseconds
pub const POLL_INTERVAL_US: u64 = 100;

/// libftdi interface for an analyzer channel
pub fn interface(channel: Channel) -> Interface {
    match channel {
        Channel::A => Interface::A,
        Channel::B => Interface::B,
    }
}
