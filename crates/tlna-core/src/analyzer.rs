//! Session facade
//!
//! [`NoiseAnalyzer`] owns a [`Connector`] and walks the instrument through
//! its lifecycle:
//!
//! ```text
//! Uninitialized --find--> Discovered --init--> Open --close--> Closed
//!                                                  <--init----
//! ```
//!
//! Data operations are only accepted while the session is `Open`.

use core::fmt;
use core::mem;

use crate::assembler::Assembler;
use crate::buffer::{Spectrum, TimeDomain};
use crate::config::{AnalyzerConfig, TerminationMode};
use crate::dsp::{Periodogram, SpectrumFlags, WindowFunction};
use crate::error::{Error, Result};
use crate::frame::SerialNumber;
use crate::protocol::{SignalSource, Termination, TD_LEN};
use crate::transport::{Connector, LocationPair, Transport};

/// Lifecycle state of a [`NoiseAnalyzer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No instrument located yet
    Uninitialized,
    /// Instrument located, channels not open
    Discovered,
    /// Both channels open
    Open,
    /// Channels were open and have been released
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Discovered => "discovered",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

struct ChannelPair<T> {
    a: T,
    b: T,
    locations: LocationPair,
}

enum Session<T> {
    Uninitialized,
    Discovered(LocationPair),
    Open(ChannelPair<T>),
    Closed(LocationPair),
}

impl<T> Session<T> {
    fn state(&self) -> SessionState {
        match self {
            Session::Uninitialized => SessionState::Uninitialized,
            Session::Discovered(_) => SessionState::Discovered,
            Session::Open(_) => SessionState::Open,
            Session::Closed(_) => SessionState::Closed,
        }
    }

    fn open_pair(&mut self) -> Result<&mut ChannelPair<T>> {
        match self {
            Session::Open(pair) => Ok(pair),
            other => Err(Error::NotReady(other.state())),
        }
    }
}

/// Host-side handle to one noise analyzer
pub struct NoiseAnalyzer<C: Connector> {
    connector: C,
    config: AnalyzerConfig,
    session: Session<C::Channel>,
    periodogram: Option<Periodogram>,
}

impl<C: Connector> NoiseAnalyzer<C> {
    /// Create an uninitialized session with default settings
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, AnalyzerConfig::default())
    }

    /// Create an uninitialized session
    pub fn with_config(connector: C, config: AnalyzerConfig) -> Self {
        Self {
            connector,
            config,
            session: Session::Uninitialized,
            periodogram: None,
        }
    }

    /// Current settings
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Replace the settings; takes effect with the next operation
    pub fn set_config(&mut self, config: AnalyzerConfig) {
        self.config = config;
    }

    /// Backend in use
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Backend in use, mutably
    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Locators recorded by the last successful [`find`](Self::find)
    pub fn locations(&self) -> Option<&LocationPair> {
        match &self.session {
            Session::Uninitialized => None,
            Session::Discovered(l) | Session::Closed(l) => Some(l),
            Session::Open(pair) => Some(&pair.locations),
        }
    }

    /// Locate the instrument
    ///
    /// Not allowed while the session is open. On failure any previously
    /// recorded locators are forgotten.
    pub fn find(&mut self) -> Result<LocationPair> {
        if let Session::Open(_) = self.session {
            return Err(Error::NotReady(SessionState::Open));
        }

        match self.connector.find() {
            Ok(locations) => {
                log::info!("found noise analyzer at {}", locations.a);
                self.session = Session::Discovered(locations.clone());
                Ok(locations)
            }
            Err(e) => {
                log::debug!("find failed: {}", e);
                self.session = Session::Uninitialized;
                Err(e)
            }
        }
    }

    /// Open both channels and purge them
    ///
    /// Requires a located instrument. Calling it on an open session does
    /// nothing. If any step fails, whatever was opened is closed again, the
    /// locators are forgotten and `Init` is returned.
    pub fn init(&mut self) -> Result<()> {
        let locations = match &self.session {
            Session::Discovered(l) | Session::Closed(l) => l.clone(),
            Session::Open(_) => {
                log::debug!("init on an open session ignored");
                return Ok(());
            }
            Session::Uninitialized => {
                return Err(Error::NotReady(SessionState::Uninitialized));
            }
        };

        match self.open_channels(&locations) {
            Ok((a, b)) => {
                log::info!("opened noise analyzer channels A and B");
                self.session = Session::Open(ChannelPair { a, b, locations });
                Ok(())
            }
            Err(e) => {
                log::error!("init failed: {}", e);
                self.session = Session::Uninitialized;
                Err(Error::Init)
            }
        }
    }

    fn open_channels(&mut self, locations: &LocationPair) -> Result<(C::Channel, C::Channel)> {
        let mut a = self.connector.open(&locations.a)?;

        let mut b = match self.connector.open(&locations.b) {
            Ok(b) => b,
            Err(e) => {
                if let Err(close_err) = a.close() {
                    log::warn!("rollback: closing channel A failed: {}", close_err);
                }
                return Err(e);
            }
        };

        if let Err(e) = a.reset().and_then(|()| b.reset()) {
            for (channel, name) in [(&mut a, 'A'), (&mut b, 'B')] {
                if let Err(close_err) = channel.close() {
                    log::warn!("rollback: closing channel {} failed: {}", name, close_err);
                }
            }
            return Err(e);
        }

        Ok((a, b))
    }

    /// Release both channels
    ///
    /// Both channels are always closed and the session always ends up
    /// `Closed`; `Close` is reported if either channel failed to close.
    /// Closing a session that is not open does nothing.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.session, Session::Uninitialized) {
            Session::Open(mut pair) => {
                let a = pair.a.close();
                let b = pair.b.close();
                self.session = Session::Closed(pair.locations);

                let mut result = Ok(());
                for (res, name) in [(a, 'A'), (b, 'B')] {
                    if let Err(e) = res {
                        log::warn!("closing channel {} failed: {}", name, e);
                        result = Err(Error::Close);
                    }
                }
                log::info!("closed noise analyzer");
                result
            }
            other => {
                self.session = other;
                Ok(())
            }
        }
    }

    /// Query the instrument serial number
    pub fn serial_number(&mut self) -> Result<SerialNumber> {
        let pair = self.session.open_pair()?;
        Assembler::new(&mut pair.a, &mut pair.b, &self.config).serial_number()
    }

    /// Acquire one buffer of the analog input
    pub fn time_domain(&mut self) -> Result<TimeDomain> {
        self.acquire(SignalSource::Input)
    }

    /// Acquire one buffer of the analog input into `out`
    ///
    /// `out` must hold exactly [`TD_LEN`] samples and is left untouched on
    /// failure.
    pub fn time_domain_into(&mut self, out: &mut [f32]) -> Result<()> {
        self.acquire_into(SignalSource::Input, out)
    }

    /// Acquire one buffer of the built-in test signal
    pub fn test_signal(&mut self) -> Result<TimeDomain> {
        self.acquire(SignalSource::TestSignal)
    }

    /// Acquire one buffer of the built-in test signal into `out`
    pub fn test_signal_into(&mut self, out: &mut [f32]) -> Result<()> {
        self.acquire_into(SignalSource::TestSignal, out)
    }

    fn acquire(&mut self, source: SignalSource) -> Result<TimeDomain> {
        let pair = self.session.open_pair()?;
        Assembler::new(&mut pair.a, &mut pair.b, &self.config).time_domain(source)
    }

    fn acquire_into(&mut self, source: SignalSource, out: &mut [f32]) -> Result<()> {
        if out.len() != TD_LEN {
            return Err(Error::BufferLength {
                expected: TD_LEN,
                actual: out.len(),
            });
        }
        let td = self.acquire(source)?;
        out.copy_from_slice(&td);
        Ok(())
    }

    /// Acquire three buffers of the analog input and compute their spectrum
    pub fn spectrum(&mut self, window: WindowFunction, flags: SpectrumFlags) -> Result<Spectrum> {
        self.spectrum_of(SignalSource::Input, window, flags)
    }

    /// Like [`spectrum`](Self::spectrum) with an explicit signal source
    pub fn spectrum_of(
        &mut self,
        source: SignalSource,
        window: WindowFunction,
        flags: SpectrumFlags,
    ) -> Result<Spectrum> {
        let pair = self.session.open_pair()?;
        let periodogram = self.periodogram.get_or_insert_with(Periodogram::new);
        Assembler::new(&mut pair.a, &mut pair.b, &self.config).spectrum(
            source,
            periodogram,
            window,
            flags,
        )
    }

    /// Select the input termination
    ///
    /// Current hardware has a fixed termination; unless the session is
    /// configured with [`TerminationMode::Forward`] this only logs.
    #[deprecated(note = "input termination is fixed on current hardware")]
    pub fn set_termination(&mut self, termination: Termination) -> Result<()> {
        let pair = self.session.open_pair()?;
        match self.config.termination {
            TerminationMode::Ignore => {
                log::warn!(
                    "set_termination({}) ignored: termination is fixed on this hardware",
                    termination
                );
                Ok(())
            }
            TerminationMode::Forward => {
                Assembler::new(&mut pair.a, &mut pair.b, &self.config)
                    .set_termination(termination)
            }
        }
    }
}

impl<C: Connector> Drop for NoiseAnalyzer<C> {
    fn drop(&mut self) {
        if self.state() == SessionState::Open {
            log::warn!("noise analyzer dropped while open, closing");
            if let Err(e) = self.close() {
                log::warn!("close on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Channel, Location};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    type Events = Rc<RefCell<Vec<String>>>;

    struct FakeChannel {
        channel: Channel,
        fail_close: bool,
        events: Events,
    }

    impl Transport for FakeChannel {
        fn write(&mut self, _data: &[u8], _timeout: Duration) -> Result<()> {
            Err(Error::SpiWrite)
        }

        fn read(&mut self, _buf: &mut [u8], _timeout: Duration) -> Result<()> {
            Err(Error::CommsTimeout)
        }

        fn reset(&mut self) -> Result<()> {
            self.events
                .borrow_mut()
                .push(format!("reset {}", self.channel.letter()));
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.events
                .borrow_mut()
                .push(format!("close {}", self.channel.letter()));
            if self.fail_close {
                Err(Error::Close)
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        absent: bool,
        fail_open_b: bool,
        fail_close_a: bool,
        events: Events,
    }

    impl Connector for FakeConnector {
        type Channel = FakeChannel;

        fn find(&mut self) -> Result<LocationPair> {
            if self.absent {
                Err(Error::DeviceNotFound)
            } else {
                Ok(LocationPair::new(1, 4))
            }
        }

        fn open(&mut self, location: &Location) -> Result<FakeChannel> {
            if self.fail_open_b && location.channel == Channel::B {
                return Err(Error::Init);
            }
            self.events
                .borrow_mut()
                .push(format!("open {}", location.channel.letter()));
            Ok(FakeChannel {
                channel: location.channel,
                fail_close: self.fail_close_a && location.channel == Channel::A,
                events: self.events.clone(),
            })
        }
    }

    fn events(analyzer: &NoiseAnalyzer<FakeConnector>) -> Vec<String> {
        analyzer.connector().events.borrow().clone()
    }

    #[test]
    fn test_lifecycle() {
        let mut analyzer = NoiseAnalyzer::new(FakeConnector::default());
        assert_eq!(analyzer.state(), SessionState::Uninitialized);
        assert_eq!(
            analyzer.init(),
            Err(Error::NotReady(SessionState::Uninitialized))
        );

        analyzer.find().unwrap();
        assert_eq!(analyzer.state(), SessionState::Discovered);

        analyzer.init().unwrap();
        assert_eq!(analyzer.state(), SessionState::Open);
        assert_eq!(
            events(&analyzer),
            vec!["open A", "open B", "reset A", "reset B"]
        );
        assert_eq!(analyzer.find(), Err(Error::NotReady(SessionState::Open)));

        analyzer.close().unwrap();
        assert_eq!(analyzer.state(), SessionState::Closed);
        assert!(analyzer.locations().is_some());

        // Closed sessions can be reopened without another find
        analyzer.init().unwrap();
        assert_eq!(analyzer.state(), SessionState::Open);
    }

    #[test]
    fn test_data_operations_need_open_session() {
        let mut analyzer = NoiseAnalyzer::new(FakeConnector::default());
        let not_ready = Err(Error::NotReady(SessionState::Uninitialized));
        assert_eq!(analyzer.time_domain().map(|_| ()), not_ready);
        assert_eq!(analyzer.serial_number().map(|_| ()), not_ready);
        assert_eq!(
            analyzer
                .spectrum(WindowFunction::Hann, SpectrumFlags::empty())
                .map(|_| ()),
            not_ready
        );

        analyzer.find().unwrap();
        let mut out = vec![0.0; TD_LEN];
        assert_eq!(
            analyzer.time_domain_into(&mut out),
            Err(Error::NotReady(SessionState::Discovered))
        );
        assert!(events(&analyzer).is_empty());
    }

    #[test]
    fn test_wrong_output_length_checked_first() {
        let mut analyzer = NoiseAnalyzer::new(FakeConnector::default());
        let mut out = vec![0.0; 100];
        assert_eq!(
            analyzer.test_signal_into(&mut out),
            Err(Error::BufferLength {
                expected: TD_LEN,
                actual: 100
            })
        );
    }

    #[test]
    fn test_init_rolls_back_on_failure() {
        let connector = FakeConnector {
            fail_open_b: true,
            ..Default::default()
        };
        let mut analyzer = NoiseAnalyzer::new(connector);
        analyzer.find().unwrap();

        assert_eq!(analyzer.init(), Err(Error::Init));
        assert_eq!(analyzer.state(), SessionState::Uninitialized);
        assert!(analyzer.locations().is_none());
        assert_eq!(events(&analyzer), vec!["open A", "close A"]);
    }

    #[test]
    fn test_close_is_best_effort() {
        let connector = FakeConnector {
            fail_close_a: true,
            ..Default::default()
        };
        let mut analyzer = NoiseAnalyzer::new(connector);
        analyzer.find().unwrap();
        analyzer.init().unwrap();

        assert_eq!(analyzer.close(), Err(Error::Close));
        assert_eq!(analyzer.state(), SessionState::Closed);
        let events = events(&analyzer);
        assert!(events.contains(&"close A".to_string()));
        assert!(events.contains(&"close B".to_string()));

        // Second close is a no-op
        assert_eq!(analyzer.close(), Ok(()));
    }

    #[test]
    fn test_find_failure_forgets_locations() {
        let mut analyzer = NoiseAnalyzer::new(FakeConnector::default());
        analyzer.find().unwrap();
        analyzer.connector_mut().absent = true;
        assert_eq!(analyzer.find(), Err(Error::DeviceNotFound));
        assert_eq!(analyzer.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_drop_closes_open_session() {
        let events: Events = Rc::default();
        {
            let connector = FakeConnector {
                events: events.clone(),
                ..Default::default()
            };
            let mut analyzer = NoiseAnalyzer::new(connector);
            analyzer.find().unwrap();
            analyzer.init().unwrap();
        }
        let events = events.borrow();
        assert!(events.contains(&"close A".to_string()));
        assert!(events.contains(&"close B".to_string()));
    }

    #[test]
    #[allow(deprecated)]
    fn test_termination_ignored_by_default() {
        let mut analyzer = NoiseAnalyzer::new(FakeConnector::default());
        assert!(analyzer.set_termination(Termination::R50).is_err());
        analyzer.find().unwrap();
        analyzer.init().unwrap();
        // The fake channel fails every write, so success means nothing was sent
        assert_eq!(analyzer.set_termination(Termination::R50), Ok(()));

        analyzer.set_config(AnalyzerConfig::default().with_termination(TerminationMode::Forward));
        assert_eq!(
            analyzer.set_termination(Termination::R50),
            Err(Error::SpiWrite)
        );
    }
}
