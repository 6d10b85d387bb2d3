//! tlna-dummy - In-memory noise analyzer emulator for testing
//!
//! This crate provides a [`Connector`] whose two channels talk to an
//! emulated instrument. The emulator speaks the real frame protocol and
//! produces sine waves at configurable DFT bins, so the whole acquisition
//! and spectrum pipeline can run without hardware.
//!
//! Faults can be queued per channel to exercise the retry paths:
//!
//! ```
//! use tlna_core::Channel;
//! use tlna_dummy::{DummyConnector, Fault};
//!
//! let connector = DummyConnector::default();
//! // The next data-channel response arrives with a bad checksum
//! connector.inject(Channel::B, Fault::Corrupt);
//! ```

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tlna_core::error::{Error, Result};
use tlna_core::frame::{self, Command};
use tlna_core::protocol::{
    CHECKSUM_LEN, RESPONSE_PREFIX_LEN, SEGMENTS_PER_ACQUISITION, SEGMENT_SAMPLES, TD_LEN,
};
use tlna_core::{Channel, Connector, Location, LocationPair, SignalSource, Termination, Transport};

/// Configuration for the emulated instrument
#[derive(Debug, Clone, PartialEq)]
pub struct DummyConfig {
    /// Serial number reported by the instrument
    pub serial: String,
    /// USB bus number reported by enumeration
    pub bus: u8,
    /// USB device address reported by enumeration
    pub address: u8,
    /// DFT bins of the input sine, one per acquisition, cycled
    pub signal_bins: Vec<usize>,
    /// Input sine amplitude
    pub amplitude: f32,
    /// Input DC offset
    pub offset: f32,
    /// Peak-to-peak amplitude of pseudo-random noise added to the input
    pub noise: f32,
    /// DFT bin of the built-in test signal
    pub test_bin: usize,
    /// Test signal amplitude
    pub test_amplitude: f32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            serial: "TLNA-DUMMY-0001".to_string(),
            bus: 1,
            address: 2,
            signal_bins: vec![100],
            amplitude: 1.0,
            offset: 0.0,
            noise: 0.0,
            test_bin: 1024,
            test_amplitude: 0.5,
        }
    }
}

/// Fault applied to the next response on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Flip one bit so the checksum no longer matches
    Corrupt,
    /// Send a stray byte ahead of the frame
    Desync,
    /// Swallow the response entirely
    Drop,
    /// Hold the response back until the instrument receives its next command
    Delay,
    /// Reject the command
    Nak,
}

fn index(channel: Channel) -> usize {
    match channel {
        Channel::A => 0,
        Channel::B => 1,
    }
}

/// Emulated instrument state shared by both channels
#[derive(Debug)]
struct Instrument {
    config: DummyConfig,
    present: bool,
    open: [bool; 2],
    fail_open: Option<Channel>,
    fail_close: Option<Channel>,
    pending: [VecDeque<u8>; 2],
    last: [Option<Vec<u8>>; 2],
    /// Responses held back by [`Fault::Delay`]; a purge does not reach them
    delayed: [Option<Vec<u8>>; 2],
    /// `None` entries let one response through untouched
    faults: [VecDeque<Option<Fault>>; 2],
    commands: [Vec<Command>; 2],
    samples: Vec<f32>,
    next_segment: Option<usize>,
    acquisitions: usize,
    termination: Termination,
}

impl Instrument {
    fn new(config: DummyConfig) -> Self {
        Self {
            config,
            present: true,
            open: [false; 2],
            fail_open: None,
            fail_close: None,
            pending: Default::default(),
            last: Default::default(),
            delayed: Default::default(),
            faults: Default::default(),
            commands: Default::default(),
            samples: Vec::new(),
            next_segment: None,
            acquisitions: 0,
            termination: Termination::default(),
        }
    }

    fn arm(&mut self, source: SignalSource) {
        let (bin, amplitude, offset, noise) = match source {
            SignalSource::Input => {
                let bins = &self.config.signal_bins;
                let bin = if bins.is_empty() {
                    0
                } else {
                    bins[self.acquisitions % bins.len()]
                };
                (bin, self.config.amplitude, self.config.offset, self.config.noise)
            }
            SignalSource::TestSignal => (self.config.test_bin, self.config.test_amplitude, 0.0, 0.0),
        };

        let mut rng = XorShift::new(self.acquisitions as u32);
        self.samples = (0..TD_LEN)
            .map(|i| {
                let phase = 2.0 * PI * bin as f64 * i as f64 / TD_LEN as f64;
                let n = if noise == 0.0 { 0.0 } else { noise * rng.next_centered() };
                offset + amplitude * phase.sin() as f32 + n
            })
            .collect();
        self.next_segment = Some(0);
        self.acquisitions += 1;
        log::debug!("dummy: armed {} acquisition at bin {}", source, bin);
    }

    /// Execute one command and produce the response data (ack) or `None` (nak)
    fn execute(&mut self, cmd: Command) -> Option<Vec<u8>> {
        match cmd {
            Command::GetSerial => Some(frame::encode_serial(&self.config.serial).to_vec()),
            Command::SetTermination(term) => {
                self.termination = term;
                Some(Vec::new())
            }
            Command::StartAcquisition(source) => {
                self.arm(source);
                Some(Vec::new())
            }
            Command::ReadSegment => {
                let segment = self.next_segment.filter(|&s| s < SEGMENTS_PER_ACQUISITION)?;
                self.next_segment = Some(segment + 1);
                let start = segment * SEGMENT_SAMPLES;
                Some(frame::encode_samples(
                    &self.samples[start..start + SEGMENT_SAMPLES],
                ))
            }
            Command::Resend => None,
        }
    }

    fn handle(&mut self, channel: Channel, request: &[u8]) {
        let ch = index(channel);

        // Late responses land before anything the new command produces
        for (pending, delayed) in self.pending.iter_mut().zip(self.delayed.iter_mut()) {
            if let Some(late) = delayed.take() {
                pending.extend(late);
            }
        }

        let cmd = match frame::decode(request).ok().and_then(Command::from_payload) {
            Some(cmd) => cmd,
            None => {
                log::warn!("dummy: ignoring malformed request on channel {}", channel.letter());
                return;
            }
        };
        self.commands[ch].push(cmd);

        let fault = self.faults[ch].pop_front().flatten();

        let response = match (cmd, fault) {
            (Command::Resend, _) => match self.last[ch].clone() {
                Some(frame) => frame,
                None => {
                    log::warn!("dummy: resend with nothing to repeat");
                    return;
                }
            },
            (_, Some(Fault::Nak)) => nak(cmd),
            _ => match self.execute(cmd) {
                Some(data) => ack(cmd, &data),
                None => nak(cmd),
            },
        };
        self.last[ch] = Some(response.clone());

        let pending = &mut self.pending[ch];
        match fault {
            Some(Fault::Corrupt) => {
                let mut bad = response;
                let at = bad.len() - CHECKSUM_LEN - 1;
                bad[at] ^= 0x01;
                pending.extend(bad);
            }
            Some(Fault::Desync) => {
                pending.push_back(0x00);
                pending.extend(response);
            }
            Some(Fault::Drop) => {}
            Some(Fault::Delay) => self.delayed[ch] = Some(response),
            Some(Fault::Nak) | None => pending.extend(response),
        }
    }
}

fn ack(cmd: Command, data: &[u8]) -> Vec<u8> {
    encode_response(&frame::response_payload(&cmd, true, data))
}

fn nak(cmd: Command) -> Vec<u8> {
    // Replies keep their fixed length even when rejected
    let len = cmd.response_len().unwrap_or(RESPONSE_PREFIX_LEN) - RESPONSE_PREFIX_LEN;
    encode_response(&frame::response_payload(&cmd, false, &vec![0; len]))
}

fn encode_response(payload: &[u8]) -> Vec<u8> {
    // Payloads built here are far below the frame size limit
    frame::encode(payload).unwrap_or_default()
}

/// Small deterministic PRNG for the noise option
#[derive(Debug)]
struct XorShift(u32);

impl XorShift {
    fn new(seed: u32) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9) | 1)
    }

    /// Uniform value in [-0.5, 0.5)
    fn next_centered(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x >> 8) as f32 / (1u32 << 24) as f32 - 0.5
    }
}

/// Connector for the emulated instrument
///
/// Clones share the same instrument, so a test can keep one clone to inject
/// faults and inspect traffic after handing another to a session.
#[derive(Debug, Clone)]
pub struct DummyConnector {
    instrument: Arc<Mutex<Instrument>>,
}

impl Default for DummyConnector {
    fn default() -> Self {
        Self::new(DummyConfig::default())
    }
}

impl DummyConnector {
    /// Create a connector with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            instrument: Arc::new(Mutex::new(Instrument::new(config))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Instrument> {
        self.instrument
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Instrument configuration
    pub fn config(&self) -> DummyConfig {
        self.lock().config.clone()
    }

    /// Queue `fault` for the next response on `channel`
    pub fn inject(&self, channel: Channel, fault: Fault) {
        self.inject_n(channel, fault, 1);
    }

    /// Queue `fault` for the next `count` responses on `channel`
    pub fn inject_n(&self, channel: Channel, fault: Fault, count: usize) {
        let mut instrument = self.lock();
        let queue = &mut instrument.faults[index(channel)];
        queue.extend(std::iter::repeat(Some(fault)).take(count));
    }

    /// Queue `fault` for the response after `skip` clean ones on `channel`
    pub fn inject_after(&self, channel: Channel, skip: usize, fault: Fault) {
        let mut instrument = self.lock();
        let queue = &mut instrument.faults[index(channel)];
        queue.extend(std::iter::repeat(None).take(skip));
        queue.push_back(Some(fault));
    }

    /// Make the instrument disappear from (or reappear on) the bus
    pub fn set_present(&self, present: bool) {
        self.lock().present = present;
    }

    /// Make opening `channel` fail
    pub fn fail_open(&self, channel: Option<Channel>) {
        self.lock().fail_open = channel;
    }

    /// Make closing `channel` fail
    pub fn fail_close(&self, channel: Option<Channel>) {
        self.lock().fail_close = channel;
    }

    /// Whether `channel` is currently open
    pub fn is_open(&self, channel: Channel) -> bool {
        self.lock().open[index(channel)]
    }

    /// Commands received on `channel` so far
    pub fn commands(&self, channel: Channel) -> Vec<Command> {
        self.lock().commands[index(channel)].clone()
    }

    /// Number of acquisitions armed so far
    pub fn acquisitions(&self) -> usize {
        self.lock().acquisitions
    }

    /// Last termination setting received
    pub fn termination(&self) -> Termination {
        self.lock().termination
    }
}

impl Connector for DummyConnector {
    type Channel = DummyChannel;

    fn find(&mut self) -> Result<LocationPair> {
        let instrument = self.lock();
        if !instrument.present {
            return Err(Error::DeviceNotFound);
        }
        Ok(LocationPair::new(
            instrument.config.bus,
            instrument.config.address,
        ))
    }

    fn open(&mut self, location: &Location) -> Result<DummyChannel> {
        let mut instrument = self.lock();
        let ch = index(location.channel);

        if !instrument.present || instrument.fail_open == Some(location.channel) {
            log::debug!("dummy: refusing to open {}", location);
            return Err(Error::Init);
        }
        if instrument.open[ch] {
            log::debug!("dummy: channel {} already open", location.channel.letter());
            return Err(Error::Init);
        }

        instrument.open[ch] = true;
        instrument.pending[ch].clear();
        instrument.delayed[ch] = None;
        drop(instrument);

        Ok(DummyChannel {
            instrument: self.instrument.clone(),
            channel: location.channel,
            open: true,
        })
    }
}

/// One channel of the emulated instrument
#[derive(Debug)]
pub struct DummyChannel {
    instrument: Arc<Mutex<Instrument>>,
    channel: Channel,
    open: bool,
}

impl DummyChannel {
    fn lock(&self) -> MutexGuard<'_, Instrument> {
        self.instrument
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Which channel this is
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

impl Transport for DummyChannel {
    fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<()> {
        if !self.open {
            return Err(Error::SpiWrite);
        }
        self.lock().handle(self.channel, data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<()> {
        if !self.open {
            return Err(Error::SpiRead);
        }
        let mut instrument = self.lock();
        let pending = &mut instrument.pending[index(self.channel)];
        if pending.len() < buf.len() {
            return Err(Error::CommsTimeout);
        }
        let n = buf.len();
        for (dst, src) in buf.iter_mut().zip(pending.drain(..n)) {
            *dst = src;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.lock().pending[index(self.channel)].clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let mut instrument = self.lock();
        let ch = index(self.channel);
        instrument.open[ch] = false;
        instrument.pending[ch].clear();
        instrument.delayed[ch] = None;

        if instrument.fail_close == Some(self.channel) {
            return Err(Error::Close);
        }
        Ok(())
    }
}

impl Drop for DummyChannel {
    fn drop(&mut self) {
        if self.open {
            let mut instrument = self.lock();
            instrument.open[index(self.channel)] = false;
        }
    }
}

/// Parse backend options
///
/// Format: "serial=<s>,bin=<N>,bins=<N/N/...>,amplitude=<f>,offset=<f>,noise=<f>,test-bin=<N>"
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<DummyConfig, String> {
    fn number<T: std::str::FromStr>(key: &str, value: &str) -> std::result::Result<T, String> {
        value
            .parse()
            .map_err(|_| format!("Invalid value for {}: '{}'", key, value))
    }

    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "serial" => {
                if value.is_empty() || value.len() > tlna_core::protocol::SERIAL_LEN {
                    return Err(format!(
                        "Serial number must be 1 to {} characters",
                        tlna_core::protocol::SERIAL_LEN
                    ));
                }
                config.serial = value.to_string();
            }
            "bin" => config.signal_bins = vec![number(key, value)?],
            "bins" => {
                config.signal_bins = value
                    .split('/')
                    .map(|b| number(key, b))
                    .collect::<std::result::Result<_, _>>()?;
            }
            "amplitude" => config.amplitude = number(key, value)?,
            "offset" => config.offset = number(key, value)?,
            "noise" => config.noise = number(key, value)?,
            "test-bin" | "test_bin" => config.test_bin = number(key, value)?,
            _ => {
                log::warn!("Unknown dummy option: {}={}", key, value);
            }
        }
    }

    if let Some(&bin) = config.signal_bins.iter().find(|&&b| b > TD_LEN / 2) {
        return Err(format!("Bin {} is above Nyquist ({})", bin, TD_LEN / 2));
    }

    Ok(config)
}
