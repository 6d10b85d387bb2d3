//! Noise analyzer wire protocol constants
//!
//! Frame layout (all multi-byte fields little endian):
//!
//! ```text
//! +------+------+--------+-------------------+----------+
//! | 0xA5 | 0x5A | len:16 | payload (len)     | csum:16  |
//! +------+------+--------+-------------------+----------+
//! ```
//!
//! `csum` is the 16-bit wrapping sum of every byte before it.

use core::fmt;

// ============================================================================
// Framing
// ============================================================================

/// Synchronization marker at the start of every frame
pub const SYNC_MARKER: [u8; 2] = [0xA5, 0x5A];

/// Marker plus length field
pub const HEADER_LEN: usize = 4;

/// Trailing checksum size
pub const CHECKSUM_LEN: usize = 2;

/// Bytes a frame adds around its payload
pub const FRAME_OVERHEAD: usize = HEADER_LEN + CHECKSUM_LEN;

/// Largest payload the length field can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

// ============================================================================
// Buffer geometry
// ============================================================================

/// Samples in one time-domain acquisition
pub const TD_LEN: usize = 8192;

/// Bins of a real DFT over one acquisition
pub const SPECTRUM_BINS: usize = TD_LEN / 2 + 1;

/// Stacked segments in a spectrum buffer
pub const SPECTRUM_SEGMENTS: usize = 3;

/// Values in a spectrum buffer
pub const SPECTRUM_LEN: usize = SPECTRUM_SEGMENTS * SPECTRUM_BINS;

/// Samples carried by one ReadSegment response
pub const SEGMENT_SAMPLES: usize = 512;

/// ReadSegment transfers per acquisition
pub const SEGMENTS_PER_ACQUISITION: usize = TD_LEN / SEGMENT_SAMPLES;

/// Maximum serial number length, without terminator
pub const SERIAL_LEN: usize = 16;

// ============================================================================
// Commands
// ============================================================================

/// Query the instrument serial number
pub const CMD_GET_SERIAL: u8 = 0x01;

/// Select input termination (deprecated)
pub const CMD_SET_TERMINATION: u8 = 0x02;

/// Arm a new acquisition from the given signal source
pub const CMD_START_ACQUISITION: u8 = 0x10;

/// Read the next segment of the armed acquisition
pub const CMD_READ_SEGMENT: u8 = 0x11;

/// Retransmit the previous response frame unchanged
pub const CMD_RESEND: u8 = 0x12;

/// Response status: command accepted
pub const STATUS_ACK: u8 = 0x06;

/// Response status: command rejected
pub const STATUS_NAK: u8 = 0x15;

/// Opcode and status bytes leading every response payload
pub const RESPONSE_PREFIX_LEN: usize = 2;

// ============================================================================
// Configuration values
// ============================================================================

/// Input termination of the analog front end
///
/// Only early hardware revisions honor this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Termination {
    /// 1 MΩ
    #[default]
    R1M,
    /// 50 kΩ
    R50K,
    /// 5 kΩ
    R5K,
    /// 500 Ω
    R500,
    /// 50 Ω
    R50,
}

impl Termination {
    /// All selectable terminations
    pub const ALL: [Termination; 5] = [
        Termination::R1M,
        Termination::R50K,
        Termination::R5K,
        Termination::R500,
        Termination::R50,
    ];

    /// Wire encoding
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Resistance in ohms
    pub fn ohms(self) -> u32 {
        match self {
            Termination::R1M => 1_000_000,
            Termination::R50K => 50_000,
            Termination::R5K => 5_000,
            Termination::R500 => 500,
            Termination::R50 => 50,
        }
    }

    /// Parse from a name like "1M", "50k" or "50"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "r1m" => Some(Termination::R1M),
            "50k" | "r50k" => Some(Termination::R50K),
            "5k" | "r5k" => Some(Termination::R5K),
            "500" | "r500" => Some(Termination::R500),
            "50" | "r50" => Some(Termination::R50),
            _ => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::R1M => write!(f, "1 MOhm"),
            Termination::R50K => write!(f, "50 kOhm"),
            Termination::R5K => write!(f, "5 kOhm"),
            Termination::R500 => write!(f, "500 Ohm"),
            Termination::R50 => write!(f, "50 Ohm"),
        }
    }
}

/// Where an acquisition takes its samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalSource {
    /// Live analog input
    Input,
    /// Built-in self-test signal generator
    TestSignal,
}

impl SignalSource {
    /// Wire encoding
    pub fn to_byte(self) -> u8 {
        match self {
            SignalSource::Input => 0x00,
            SignalSource::TestSignal => 0x01,
        }
    }

    /// Decode from the wire
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(SignalSource::Input),
            0x01 => Some(SignalSource::TestSignal),
            _ => None,
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::Input => write!(f, "input"),
            SignalSource::TestSignal => write!(f, "test signal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry() {
        assert_eq!(SPECTRUM_BINS, 4097);
        assert_eq!(SPECTRUM_LEN, 12291);
        assert_eq!(SEGMENTS_PER_ACQUISITION * SEGMENT_SAMPLES, TD_LEN);
    }

    #[test]
    fn test_termination_parse() {
        assert_eq!(Termination::parse("1M"), Some(Termination::R1M));
        assert_eq!(Termination::parse("50k"), Some(Termination::R50K));
        assert_eq!(Termination::parse(" 500 "), Some(Termination::R500));
        assert_eq!(Termination::parse("75"), None);
        assert_eq!(Termination::R50.to_byte(), 4);
        assert_eq!(Termination::R5K.ohms(), 5_000);
    }

    #[test]
    fn test_signal_source_bytes() {
        for source in [SignalSource::Input, SignalSource::TestSignal] {
            assert_eq!(SignalSource::from_byte(source.to_byte()), Some(source));
        }
        assert_eq!(SignalSource::from_byte(0x7F), None);
    }
}
