//! FT2232H channel implementation
//!
//! Each analyzer channel is one FT2232H interface opened through libftdi.
//! Enumeration goes through nusb so the bus and address of every analyzer
//! are known before any channel is opened.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use ftdi::{find_by_bus_address, Device, Interface};
use nusb::MaybeFuture;
use tlna_core::error::{Error as CoreError, Result as CoreResult};
use tlna_core::{Connector, Location, LocationPair, Transport};

use crate::error::{FtdiError, Result};
use crate::protocol::*;

/// Configuration for finding and opening an analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtdiConfig {
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Which matching device to use when several are connected
    pub index: usize,
    /// Latency timer in milliseconds (1-255)
    pub latency_ms: u8,
}

impl Default for FtdiConfig {
    fn default() -> Self {
        FtdiConfig {
            vendor_id: FTDI_VID,
            product_id: FTDI_FT2232H_PID,
            index: 0,
            latency_ms: DEFAULT_LATENCY_MS,
        }
    }
}

impl FtdiConfig {
    /// Set the latency timer
    pub fn latency(mut self, latency_ms: u8) -> Result<Self> {
        if latency_ms == 0 {
            return Err(FtdiError::InvalidParameter(
                "Latency timer must be between 1 and 255 ms".into(),
            ));
        }
        self.latency_ms = latency_ms;
        Ok(self)
    }
}

/// Information about a connected analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtdiDeviceInfo {
    /// USB bus number
    pub bus: u8,
    /// USB device address
    pub address: u8,
    /// Vendor ID
    pub vendor_id: u16,
    /// Product ID
    pub product_id: u16,
}

impl std::fmt::Display for FtdiDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FT2232H noise analyzer at bus {} address {} ({:04X}:{:04X})",
            self.bus, self.address, self.vendor_id, self.product_id
        )
    }
}

/// List connected analyzers matching `config`'s VID/PID
pub fn list_devices(config: &FtdiConfig) -> Result<Vec<FtdiDeviceInfo>> {
    let devices = nusb::list_devices()
        .wait()?
        .filter(|d| d.vendor_id() == config.vendor_id && d.product_id() == config.product_id)
        .map(|d| FtdiDeviceInfo {
            bus: d.busnum(),
            address: d.device_address(),
            vendor_id: d.vendor_id(),
            product_id: d.product_id(),
        })
        .collect();

    Ok(devices)
}

/// Finds analyzers on the USB bus and opens their channels
#[derive(Debug, Clone, Default)]
pub struct FtdiConnector {
    config: FtdiConfig,
}

impl FtdiConnector {
    /// Create a connector with the given configuration
    pub fn new(config: FtdiConfig) -> Self {
        Self { config }
    }

    /// Connector configuration
    pub fn config(&self) -> &FtdiConfig {
        &self.config
    }
}

impl Connector for FtdiConnector {
    type Channel = FtdiChannel;

    fn find(&mut self) -> CoreResult<LocationPair> {
        let devices = list_devices(&self.config)?;
        log::debug!("Found {} matching FTDI device(s)", devices.len());

        let info = devices
            .get(self.config.index)
            .ok_or(CoreError::DeviceNotFound)?;
        log::info!("Using {}", info);

        Ok(LocationPair::new(info.bus, info.address))
    }

    fn open(&mut self, location: &Location) -> CoreResult<FtdiChannel> {
        Ok(FtdiChannel::open(&self.config, location)?)
    }
}

/// One open FT2232H interface
pub struct FtdiChannel {
    device: Option<Device>,
    location: Location,
}

impl FtdiChannel {
    /// Open the interface for `location`
    pub fn open(config: &FtdiConfig, location: &Location) -> Result<Self> {
        log::info!("Opening noise analyzer {}", location);

        let (bus, address, iface) = open_target(location);
        let mut device = find_by_bus_address(bus, address)
            .interface(iface)
            .open()
            .map_err(|e| FtdiError::OpenFailed(format!("{}", e)))?;

        device
            .usb_reset()
            .map_err(|e| FtdiError::ConfigFailed(format!("USB reset failed: {}", e)))?;

        device
            .set_latency_timer(config.latency_ms)
            .map_err(|e| FtdiError::ConfigFailed(format!("Set latency timer failed: {}", e)))?;

        log::debug!(
            "Channel {} open, latency timer {} ms",
            location.channel.letter(),
            config.latency_ms
        );

        Ok(FtdiChannel {
            device: Some(device),
            location: location.clone(),
        })
    }

    /// Location this channel was opened at
    pub fn location(&self) -> &Location {
        &self.location
    }

    fn device(&mut self) -> Result<&mut Device> {
        self.device
            .as_mut()
            .ok_or_else(|| FtdiError::InvalidParameter("channel is closed".into()))
    }

    /// Send data to the channel
    fn send(&mut self, data: &[u8]) -> Result<()> {
        match self.device()?.write_all(data) {
            Ok(()) => {
                log::trace!("Sent {} bytes", data.len());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(FtdiError::Timeout),
            Err(e) => Err(FtdiError::WriteFailed(format!("{}", e))),
        }
    }

    /// Fill `buf` from the channel before `timeout` runs out
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let device = self.device()?;
        let mut total = 0;

        while total < buf.len() {
            match device.read(&mut buf[total..]) {
                Ok(0) => {
                    if Instant::now() >= deadline {
                        log::debug!("Read timed out after {} of {} bytes", total, buf.len());
                        return Err(FtdiError::Timeout);
                    }
                    // No data available, wait a bit
                    std::thread::sleep(Duration::from_micros(POLL_INTERVAL_US));
                }
                Ok(n) => {
                    total += n;
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => return Err(FtdiError::Timeout),
                Err(e) => {
                    return Err(FtdiError::ReadFailed(format!("{}", e)));
                }
            }
        }

        log::trace!("Received {} bytes", total);
        Ok(())
    }
}

impl Transport for FtdiChannel {
    /// Writes run under libftdi's own USB write timeout (5 s), not `timeout`
    fn write(&mut self, data: &[u8], _timeout: Duration) -> CoreResult<()> {
        Ok(self.send(data)?)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> CoreResult<()> {
        Ok(self.recv(buf, timeout)?)
    }

    fn reset(&mut self) -> CoreResult<()> {
        self.device()?
            .usb_purge_buffers()
            .map_err(|e| FtdiError::ConfigFailed(format!("Purge failed: {}", e)))?;
        log::debug!("Purged channel {}", self.location.channel.letter());
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.usb_purge_buffers() {
                log::warn!("Failed to purge channel on close: {}", e);
            }
            // libftdi closes the handle when the context is freed
            drop(device);
            log::debug!("Closed channel {}", self.location.channel.letter());
        }
        Ok(())
    }
}

impl Drop for FtdiChannel {
    fn drop(&mut self) {
        if self.device.is_some() {
            log::warn!(
                "Channel {} dropped without close",
                self.location.channel.letter()
            );
        }
    }
}

/// USB bus, address and interface that `location` opens
fn open_target(location: &Location) -> (u8, u8, Interface) {
    (location.bus, location.address, interface(location.channel))
}

/// Parse backend options
///
/// Format: "index=<N>,latency=<ms>,vid=<hex>,pid=<hex>"
pub fn parse_options(options: &[(&str, &str)]) -> Result<FtdiConfig> {
    let mut config = FtdiConfig::default();

    for (key, value) in options {
        match *key {
            "index" => {
                config.index = value.parse().map_err(|_| {
                    FtdiError::InvalidParameter(format!("Invalid index '{}'", value))
                })?;
            }
            "latency" => {
                let latency: u8 = value.parse().map_err(|_| {
                    FtdiError::InvalidParameter(format!("Invalid latency '{}'", value))
                })?;
                config = config.latency(latency)?;
            }
            "vid" => {
                config.vendor_id = parse_hex_id(value)?;
            }
            "pid" => {
                config.product_id = parse_hex_id(value)?;
            }
            _ => {
                log::warn!("Unknown FTDI option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

fn parse_hex_id(value: &str) -> Result<u16> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u16::from_str_radix(digits, 16)
        .map_err(|_| FtdiError::InvalidParameter(format!("Invalid USB ID '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_defaults() {
        let config = parse_options(&[]).unwrap();
        assert_eq!(config, FtdiConfig::default());
        assert_eq!(config.vendor_id, 0x0403);
        assert_eq!(config.product_id, 0x6010);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[
            ("index", "1"),
            ("latency", "16"),
            ("vid", "0x1234"),
            ("pid", "abcd"),
        ])
        .unwrap();
        assert_eq!(config.index, 1);
        assert_eq!(config.latency_ms, 16);
        assert_eq!(config.vendor_id, 0x1234);
        assert_eq!(config.product_id, 0xABCD);
    }

    #[test]
    fn test_parse_options_rejects_bad_values() {
        assert!(parse_options(&[("latency", "0")]).is_err());
        assert!(parse_options(&[("latency", "300")]).is_err());
        assert!(parse_options(&[("index", "-1")]).is_err());
        assert!(parse_options(&[("vid", "0xZZ")]).is_err());
    }

    #[test]
    fn test_unknown_option_ignored() {
        assert!(parse_options(&[("speed", "fast")]).is_ok());
    }

    #[test]
    fn test_open_target_follows_location() {
        let pair = LocationPair::new(3, 17);

        let (bus, address, iface) = open_target(&pair.a);
        assert_eq!((bus, address), (3, 17));
        assert!(matches!(iface, Interface::A));

        let (bus, address, iface) = open_target(&pair.b);
        assert_eq!((bus, address), (3, 17));
        assert!(matches!(iface, Interface::B));
    }

    #[test]
    fn test_device_info_display() {
        let info = FtdiDeviceInfo {
            bus: 3,
            address: 7,
            vendor_id: FTDI_VID,
            product_id: FTDI_FT2232H_PID,
        };
        assert_eq!(
            info.to_string(),
            "FT2232H noise analyzer at bus 3 address 7 (0403:6010)"
        );
    }
}
