//! Acquisition assembler
//!
//! Drives the two channels through the frame codec until a complete
//! time-domain or spectrum buffer has been collected.
//!
//! Retry policy lives here and nowhere else:
//!
//! - A checksum fault re-requests the same frame with `Resend`, up to
//!   `frame_retries` times, then escalates to `SpiRead`.
//! - Losing synchronization throws away everything collected so far and
//!   restarts the acquisition from its first segment, up to `sync_restarts`
//!   times. Exhaustion reports `Read` (time-domain) or
//!   `GetSpectrum` (spectrum).
//! - A zero budget lets the raw framing fault through unchanged.
//! - Transport faults (timeouts included) are never retried.
//!
//! Every acquisition purges the control channel before `StartAcquisition`
//! and the data channel once the device has acknowledged it. The device
//! answers in order, so anything on the data channel at that point belongs
//! to an older request, such as a segment that arrived after a timeout.

use std::time::Duration;

use crate::buffer::{Spectrum, TimeDomain};
use crate::config::AnalyzerConfig;
use crate::dsp::{Periodogram, SpectrumFlags, WindowFunction};
use crate::error::{Error, Result};
use crate::frame::{self, Command, SerialNumber};
use crate::protocol::*;
use crate::transport::Transport;

/// Request/response exchange on one channel
struct Link<'a, T: Transport + ?Sized> {
    channel: &'a mut T,
    timeout: Duration,
    frame_retries: u8,
    rx: Vec<u8>,
}

impl<'a, T: Transport + ?Sized> Link<'a, T> {
    fn new(channel: &'a mut T, config: &AnalyzerConfig) -> Self {
        Self {
            channel,
            timeout: config.timeout(),
            frame_retries: config.frame_retries,
            rx: Vec::new(),
        }
    }

    fn send(&mut self, cmd: &Command) -> Result<()> {
        let frame = cmd.encode()?;
        self.channel.write(&frame, self.timeout)?;
        log::trace!("sent 0x{:02X} ({} bytes)", cmd.opcode(), frame.len());
        Ok(())
    }

    /// Issue `cmd` and return the data of its validated response
    fn request(&mut self, cmd: Command) -> Result<&[u8]> {
        let payload_len = cmd.response_len().ok_or(Error::SpiBuffer)?;
        self.rx = frame::alloc_frame(payload_len)?;

        self.send(&cmd)?;

        let mut attempt = 0u8;
        loop {
            self.channel.read(&mut self.rx, self.timeout)?;
            match frame::decode(&self.rx) {
                Ok(_) => break,
                Err(e @ Error::Checksum { .. }) => {
                    if attempt == self.frame_retries {
                        if self.frame_retries == 0 {
                            return Err(e);
                        }
                        log::error!(
                            "command 0x{:02X}: {} after {} resends, giving up",
                            cmd.opcode(),
                            e,
                            attempt
                        );
                        return Err(Error::SpiRead);
                    }
                    attempt += 1;
                    log::warn!(
                        "command 0x{:02X}: {}, requesting resend {}/{}",
                        cmd.opcode(),
                        e,
                        attempt,
                        self.frame_retries
                    );
                    self.send(&Command::Resend)?;
                }
                Err(e) => return Err(e),
            }
        }

        let payload = &self.rx[HEADER_LEN..self.rx.len() - CHECKSUM_LEN];
        cmd.check_response(payload)
    }

    fn reset(&mut self) -> Result<()> {
        self.channel.reset()
    }
}

/// Collects buffers from an open channel pair
///
/// Channel A carries control commands, channel B carries segment reads.
pub struct Assembler<'a, T: Transport + ?Sized> {
    control: Link<'a, T>,
    data: Link<'a, T>,
    sync_restarts: u8,
}

impl<'a, T: Transport + ?Sized> Assembler<'a, T> {
    /// Borrow both channels for the duration of one operation
    pub fn new(control: &'a mut T, data: &'a mut T, config: &AnalyzerConfig) -> Self {
        Self {
            control: Link::new(control, config),
            data: Link::new(data, config),
            sync_restarts: config.sync_restarts,
        }
    }

    /// Query the serial number
    pub fn serial_number(&mut self) -> Result<SerialNumber> {
        let data = self.control.request(Command::GetSerial)?;
        let serial = frame::decode_serial(data)?;
        log::debug!("serial number: {}", serial);
        Ok(serial)
    }

    /// Send the input termination setting
    pub fn set_termination(&mut self, termination: Termination) -> Result<()> {
        self.control
            .request(Command::SetTermination(termination))?;
        log::debug!("termination set to {}", termination);
        Ok(())
    }

    /// Acquire one time-domain buffer
    pub fn time_domain(&mut self, source: SignalSource) -> Result<TimeDomain> {
        self.acquire(source, Error::Read)
    }

    /// Acquire [`SPECTRUM_SEGMENTS`] buffers and compute their spectrum
    pub fn spectrum(
        &mut self,
        source: SignalSource,
        periodogram: &mut Periodogram,
        window: WindowFunction,
        flags: SpectrumFlags,
    ) -> Result<Spectrum> {
        let acquisitions = [
            self.acquire(source, Error::GetSpectrum)?,
            self.acquire(source, Error::GetSpectrum)?,
            self.acquire(source, Error::GetSpectrum)?,
        ];
        periodogram.compute(&acquisitions, window, flags)
    }

    fn acquire(&mut self, source: SignalSource, exhausted: Error) -> Result<TimeDomain> {
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(TD_LEN)
            .map_err(|_| Error::SpiAlloc)?;

        let mut restarts = 0u8;
        loop {
            samples.clear();
            match self.fill(source, &mut samples) {
                Ok(()) => break,
                Err(e @ Error::Unsynced { .. }) => {
                    if restarts == self.sync_restarts {
                        if self.sync_restarts == 0 {
                            return Err(e);
                        }
                        log::error!(
                            "acquisition from {} lost sync {} times, giving up",
                            source,
                            restarts + 1
                        );
                        return Err(exhausted);
                    }
                    restarts += 1;
                    log::warn!(
                        "{} after {} of {} samples, restarting acquisition {}/{}",
                        e,
                        samples.len(),
                        TD_LEN,
                        restarts,
                        self.sync_restarts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        TimeDomain::from_vec(samples)
    }

    fn fill(&mut self, source: SignalSource, samples: &mut Vec<f32>) -> Result<()> {
        self.control.reset()?;
        self.control
            .request(Command::StartAcquisition(source))?;
        self.data.reset()?;
        log::debug!("acquisition armed ({})", source);

        for segment in 0..SEGMENTS_PER_ACQUISITION {
            let data = self.data.request(Command::ReadSegment)?;
            frame::decode_samples(data, samples)?;
            log::trace!(
                "segment {}/{}: {} samples",
                segment + 1,
                SEGMENTS_PER_ACQUISITION,
                samples.len()
            );
        }
        Ok(())
    }
}
