//! Smart card communication.
//!
//! This module provides everything between a document session and the
//! physical reader:
//!
//! - [`apdu`]: command/response encoding
//! - [`tlv`] and [`ber`]: the two data encodings found in card files
//! - [`family`]: card families, known ATRs and detection
//! - [`channel`]: file selection and chunked reads
//! - [`virtual_card`]: an in-memory card for tests and demos
//!
//! # Transport Abstraction
//!
//! The library never talks to hardware directly. A [`Connector`] opens a
//! reader by name and hands back a [`Transport`], a synchronous
//! command/response pipe. With the `pcsc` feature enabled,
//! [`PcscConnector`] provides both on top of the system PC/SC service.

pub mod apdu;
pub mod ber;
pub mod channel;
pub mod family;
pub mod tlv;
pub mod virtual_card;

#[cfg(feature = "pcsc")]
pub mod pcsc_transport;

pub use apdu::{Apdu, ApduResponse};
pub use channel::{CardChannel, FileLayout};
pub use family::{CardFamily, DetectedCard};
pub use virtual_card::{VirtualCard, VirtualReader};

#[cfg(feature = "pcsc")]
pub use pcsc_transport::{PcscConnector, PcscTransport};

use crate::error::Result;

/// A synchronous command/response pipe to one inserted card.
pub trait Transport {
    /// Sends an APDU command and receives a response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reader`](crate::Error::Reader) for transport faults
    /// and [`Error::CardMissing`](crate::Error::CardMissing) if the card is
    /// gone.
    fn transmit(&mut self, apdu: &Apdu) -> Result<ApduResponse>;

    /// Returns the answer-to-reset of the connected card.
    ///
    /// # Errors
    ///
    /// Same as [`transmit`](Self::transmit).
    fn atr(&mut self) -> Result<Vec<u8>>;

    /// Checks if the card is still present and connected.
    fn is_connected(&self) -> bool;
}

/// Opens transports to named readers.
pub trait Connector {
    /// Connects to the card in `reader`.
    ///
    /// # Errors
    ///
    /// - [`Error::Reader`](crate::Error::Reader) if the reader cannot be reached
    /// - [`Error::CardMissing`](crate::Error::CardMissing) if it holds no card
    fn connect(&mut self, reader: &str) -> Result<Box<dyn Transport>>;

    /// Lists the names of the available readers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reader`](crate::Error::Reader) if enumeration fails.
    fn list_readers(&mut self) -> Result<Vec<String>>;
}
