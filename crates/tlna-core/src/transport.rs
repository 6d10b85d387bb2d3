//! Transport layer abstraction
//!
//! The instrument exposes two byte-stream channels. A [`Connector`] finds the
//! instrument and opens each channel as a [`Transport`]. Transports never
//! retry on their own; retry policy lives in the assembler.

use crate::error::Result;
use core::fmt;
use std::time::Duration;

/// One of the instrument's two logical channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Control channel (commands and short replies)
    A,
    /// Data channel (segment reads)
    B,
}

impl Channel {
    /// Channel letter
    pub fn letter(&self) -> char {
        match self {
            Channel::A => 'A',
            Channel::B => 'B',
        }
    }
}

/// USB locator of one channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// USB bus number
    pub bus: u8,
    /// USB device address on the bus
    pub address: u8,
    /// Channel on the device
    pub channel: Channel,
}

impl Location {
    /// Packed location id: bus, address and channel index
    pub fn id(&self) -> u64 {
        (u64::from(self.bus) << 16)
            | (u64::from(self.address) << 8)
            | match self.channel {
                Channel::A => 0,
                Channel::B => 1,
            }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bus {} address {} channel {}",
            self.bus,
            self.address,
            self.channel.letter()
        )
    }
}

/// Locators of both channels of one instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationPair {
    /// Control channel
    pub a: Location,
    /// Data channel
    pub b: Location,
}

impl LocationPair {
    /// Both channels of the device at `bus`/`address`
    pub fn new(bus: u8, address: u8) -> Self {
        Self {
            a: Location {
                bus,
                address,
                channel: Channel::A,
            },
            b: Location {
                bus,
                address,
                channel: Channel::B,
            },
        }
    }
}

/// Byte-stream connection to one channel
pub trait Transport {
    /// Write all of `data`, failing with `CommsTimeout` if it does not
    /// complete within `timeout`
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()>;

    /// Fill `buf` completely, failing with `CommsTimeout` if not enough bytes
    /// arrive within `timeout`
    ///
    /// A timed out read leaves the transport usable.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()>;

    /// Discard any bytes pending in either direction
    fn reset(&mut self) -> Result<()>;

    /// Release the channel
    fn close(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        (**self).write(data, timeout)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        (**self).read(buf, timeout)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Finds instruments and opens their channels
pub trait Connector {
    /// Channel handle type
    type Channel: Transport;

    /// Locate an instrument, failing with `DeviceNotFound` if none is present
    fn find(&mut self) -> Result<LocationPair>;

    /// Open one channel
    fn open(&mut self, location: &Location) -> Result<Self::Channel>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_ids_differ_per_channel() {
        let pair = LocationPair::new(3, 17);
        assert_eq!(pair.a.id(), 0x03_11_00);
        assert_eq!(pair.b.id(), 0x03_11_01);
        assert_eq!(pair.b.to_string(), "bus 3 address 17 channel B");
    }
}
