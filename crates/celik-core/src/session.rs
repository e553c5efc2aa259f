//! Library context and card sessions.
//!
//! An [`EidContext`] is created once with [`EidContext::startup`] and owns the
//! reader [`Connector`]. [`EidContext::begin_read`] opens a [`CardSession`]
//! against one reader; the session mutably borrows the context, so at most
//! one session can be open at a time.
//!
//! # Example
//!
//! ```
//! use celik_core::card::{CardFamily, VirtualCard, VirtualReader};
//! use celik_core::{EidContext, Error, API_VERSION};
//!
//! let reader = VirtualReader::with_card("Reader 0", VirtualCard::identity(CardFamily::IdCard2014));
//! let mut context = EidContext::startup(API_VERSION, reader)?;
//!
//! let mut session = context.begin_read("Reader 0", None)?;
//! assert_eq!(session.family(), CardFamily::IdCard2014);
//!
//! session.end_read();
//! assert!(matches!(session.read_document_data(), Err(Error::NotInitialized)));
//! # Ok::<(), Error>(())
//! ```

use std::fmt;

use tracing::{info, warn};

use crate::card::family::{self, CardFamily, DetectedCard};
use crate::card::{CardChannel, Connector, Transport};
use crate::config::{Config, SessionOption, SessionOptions};
use crate::error::{Error, Result};

/// Highest API version this library implements.
pub const API_VERSION: u32 = 3;

/// Lowest API version this library still accepts.
const MIN_API_VERSION: u32 = 1;

/// The library context.
pub struct EidContext {
    connector: Box<dyn Connector>,
    config: Config,
}

impl fmt::Debug for EidContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EidContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EidContext {
    /// Starts the library with the default configuration.
    ///
    /// # Arguments
    ///
    /// * `api_version` - The API version the caller was written against
    /// * `connector` - Opens reader connections, e.g. a
    ///   [`PcscConnector`](crate::card::PcscConnector)
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotSupported`] if `api_version` is outside
    /// `1..=API_VERSION`.
    pub fn startup(api_version: u32, connector: impl Connector + 'static) -> Result<Self> {
        Self::with_config(api_version, connector, Config::default())
    }

    /// Starts the library with an explicit configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::VersionNotSupported`] for unsupported API versions
    /// - [`Error::InvalidParameter`] if `config` does not validate
    pub fn with_config(
        api_version: u32,
        connector: impl Connector + 'static,
        config: Config,
    ) -> Result<Self> {
        if !(MIN_API_VERSION..=API_VERSION).contains(&api_version) {
            return Err(Error::VersionNotSupported {
                requested: api_version,
                supported: API_VERSION,
            });
        }
        config.validate()?;
        Ok(Self {
            connector: Box::new(connector),
            config,
        })
    }

    /// Shuts the library down.
    pub fn cleanup(self) {
        info!("library cleaned up");
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Sets an option for sessions opened from now on.
    pub fn set_option(&mut self, option: SessionOption) {
        self.config.session.apply(option);
    }

    /// Lists the readers the connector can reach.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reader`] if enumeration fails.
    pub fn list_readers(&mut self) -> Result<Vec<String>> {
        self.connector.list_readers()
    }

    /// Opens a session against the card in `reader`.
    ///
    /// # Arguments
    ///
    /// * `reader` - Reader name, as returned by [`list_readers`](Self::list_readers)
    /// * `requested` - The family the caller expects, or `None` to accept any
    ///
    /// # Errors
    ///
    /// - [`Error::Reader`] if the reader cannot be reached
    /// - [`Error::CardMissing`] if no card is inserted
    /// - [`Error::CardUnknown`] if the card is not a supported document
    /// - [`Error::CardMismatch`] if the card is not of the `requested` family
    /// - [`Error::SessionOpenFailed`] if the card stops answering during
    ///   detection
    pub fn begin_read(
        &mut self,
        reader: &str,
        requested: Option<CardFamily>,
    ) -> Result<CardSession<'_>> {
        let mut transport = self.connector.connect(reader)?;
        let detected = negotiate(transport.as_mut())?;

        if let Some(requested) = requested
            && requested != detected.family()
        {
            return Err(Error::CardMismatch {
                requested,
                detected: detected.family(),
            });
        }

        info!(reader, family = %detected.family(), "session opened");

        let options = self.config.session;
        Ok(CardSession {
            reader: reader.to_string(),
            transport: (!options.keep_card_closed).then_some(transport),
            context: self,
            detected,
            state: SessionState::Open,
            options,
            pin_blocked: false,
        })
    }
}

/// Reads the ATR and detects the family, leaving the document application
/// selected.
fn negotiate(transport: &mut dyn Transport) -> Result<DetectedCard> {
    let lost = |err: Error| match err {
        Error::Reader(msg) => Error::SessionOpenFailed(msg),
        other => other,
    };
    let answer = transport.atr().map_err(lost)?;
    family::detect(&mut CardChannel::new(transport), &answer).map_err(lost)
}

/// Whether a session can still talk to its card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Reads, verification and password changes are allowed.
    Open,
    /// Every card operation fails with [`Error::NotInitialized`].
    Closed,
}

/// An open connection to one card.
///
/// Closed by [`end_read`](Self::end_read), by dropping it, or by a transport
/// fault such as card removal. A session is not thread-safe; share it behind
/// a mutex if several threads need it.
pub struct CardSession<'ctx> {
    context: &'ctx mut EidContext,
    reader: String,
    detected: DetectedCard,
    state: SessionState,
    options: SessionOptions,
    transport: Option<Box<dyn Transport>>,
    pin_blocked: bool,
}

impl fmt::Debug for CardSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardSession")
            .field("reader", &self.reader)
            .field("detected", &self.detected)
            .field("state", &self.state)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CardSession<'_> {
    /// Returns the reader name.
    #[must_use]
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// Returns what was detected when the session opened.
    #[must_use]
    pub const fn detected(&self) -> &DetectedCard {
        &self.detected
    }

    /// Returns the detected card family.
    #[must_use]
    pub const fn family(&self) -> CardFamily {
        self.detected.family()
    }

    /// Returns the session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` while the session is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open)
    }

    /// Returns the library configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Sets an option for this session and for later sessions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the session is closed.
    pub fn set_option(&mut self, option: SessionOption) -> Result<()> {
        self.ensure_open()?;
        self.options.apply(option);
        self.context.set_option(option);
        if self.options.keep_card_closed {
            self.transport = None;
        }
        Ok(())
    }

    /// Closes the session. Calling it again has no effect.
    pub fn end_read(&mut self) {
        if self.is_open() {
            info!(reader = %self.reader, "session closed");
        }
        self.close();
    }

    fn close(&mut self) {
        self.state = SessionState::Closed;
        self.transport = None;
    }

    fn invalidate(&mut self, err: &Error) {
        warn!(reader = %self.reader, error = %err, "session invalidated");
        self.close();
    }

    pub(crate) const fn ensure_open(&self) -> Result<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(Error::NotInitialized),
        }
    }

    /// Fails unless the session is open on an identity card.
    pub(crate) fn require_identity(&self, operation: &str) -> Result<()> {
        self.ensure_open()?;
        if self.family().is_identity() {
            Ok(())
        } else {
            Err(Error::UnableToExecute(format!(
                "{operation} is not available on {}",
                self.family()
            )))
        }
    }

    /// Fails unless the session is open on a vehicle registration card.
    pub(crate) fn require_vehicle(&self, operation: &str) -> Result<()> {
        self.ensure_open()?;
        if self.family().is_vehicle() {
            Ok(())
        } else {
            Err(Error::UnableToExecute(format!(
                "{operation} is not available on {}",
                self.family()
            )))
        }
    }

    /// Fails unless the session is open on a health insurance card.
    pub(crate) fn require_medical(&self, operation: &str) -> Result<()> {
        self.ensure_open()?;
        if self.family() == CardFamily::MedicalInsurance {
            Ok(())
        } else {
            Err(Error::UnableToExecute(format!(
                "{operation} is not available on {}",
                self.family()
            )))
        }
    }

    pub(crate) const fn pin_blocked(&self) -> bool {
        self.pin_blocked
    }

    pub(crate) fn mark_pin_blocked(&mut self) {
        self.pin_blocked = true;
    }

    /// Drops the connection; the next exchange reconnects and selects the
    /// document application again.
    pub(crate) fn release_connection(&mut self) {
        self.transport = None;
    }

    /// Runs `op` against the card.
    ///
    /// Transport faults close the session. With `keep_card_closed` the
    /// connection is released afterwards and re-established for the next
    /// exchange.
    pub(crate) fn exchange<T>(
        &mut self,
        op: impl FnOnce(&mut CardChannel<'_>) -> Result<T>,
    ) -> Result<T> {
        self.ensure_open()?;

        let result = match self.acquire() {
            Ok(mut transport) => {
                let result = op(&mut CardChannel::new(transport.as_mut()));
                if !self.options.keep_card_closed {
                    self.transport = Some(transport);
                }
                result
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result
            && err.invalidates_session()
        {
            self.invalidate(err);
        }
        result
    }

    fn acquire(&mut self) -> Result<Box<dyn Transport>> {
        if let Some(transport) = self.transport.take() {
            return if transport.is_connected() {
                Ok(transport)
            } else {
                Err(Error::CardMissing)
            };
        }

        let mut transport = self.context.connector.connect(&self.reader)?;
        if transport.atr()? != self.detected.atr() {
            return Err(Error::CardMissing);
        }
        family::select_application(&mut CardChannel::new(transport.as_mut()), self.family())?;
        Ok(transport)
    }
}

impl Drop for CardSession<'_> {
    fn drop(&mut self) {
        self.end_read();
    }
}
