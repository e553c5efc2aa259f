//! PC/SC transport for physical readers.
//!
//! Works with the platform smart card service: `pcscd` on Linux, the
//! built-in service on macOS and Windows.
//!
//! # Example
//!
//! ```ignore
//! use celik_core::card::{Connector, PcscConnector};
//!
//! let mut connector = PcscConnector::establish()?;
//! for reader in connector.list_readers()? {
//!     println!("{reader}");
//! }
//! ```

use std::ffi::CString;

use pcsc::{Card, Context, MAX_BUFFER_SIZE_EXTENDED, Protocols, Scope, ShareMode};
use tracing::debug;

use super::apdu::{Apdu, ApduResponse};
use super::{Connector, Transport};
use crate::error::{Error, Result};

/// Opens PC/SC connections by reader name.
pub struct PcscConnector {
    context: Context,
}

impl std::fmt::Debug for PcscConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscConnector").finish_non_exhaustive()
    }
}

impl PcscConnector {
    /// Establishes a user-scope PC/SC context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reader`] if the smart card service is unavailable.
    pub fn establish() -> Result<Self> {
        let context = Context::establish(Scope::User)
            .map_err(|e| Error::Reader(format!("failed to establish PC/SC context: {e}")))?;
        Ok(Self { context })
    }
}

impl Connector for PcscConnector {
    fn connect(&mut self, reader: &str) -> Result<Box<dyn Transport>> {
        let name = CString::new(reader)
            .map_err(|_| Error::InvalidParameter(format!("reader name {reader:?} contains NUL")))?;
        let card = self
            .context
            .connect(&name, ShareMode::Exclusive, Protocols::ANY)
            .map_err(Error::from)?;
        debug!(reader, "connected");
        Ok(Box::new(PcscTransport { card }))
    }

    fn list_readers(&mut self) -> Result<Vec<String>> {
        let mut readers_buf = vec![0u8; 2048];
        let readers = match self.context.list_readers(&mut readers_buf) {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => return Ok(Vec::new()),
            Err(e) => return Err(Error::Reader(format!("failed to list readers: {e}"))),
        };
        Ok(readers
            .map(|r| r.to_string_lossy().into_owned())
            .collect())
    }
}

/// A PC/SC connection to one card.
pub struct PcscTransport {
    card: Card,
}

impl std::fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscTransport").finish_non_exhaustive()
    }
}

impl Transport for PcscTransport {
    fn transmit(&mut self, apdu: &Apdu) -> Result<ApduResponse> {
        let command = apdu.to_bytes();
        let mut response_buf = vec![0u8; MAX_BUFFER_SIZE_EXTENDED];

        let response = self
            .card
            .transmit(&command, &mut response_buf)
            .map_err(Error::from)?;

        ApduResponse::from_bytes(response.to_vec())
    }

    fn atr(&mut self) -> Result<Vec<u8>> {
        let status = self.card.status2_owned().map_err(Error::from)?;
        Ok(status.atr().to_vec())
    }

    fn is_connected(&self) -> bool {
        self.card.status2_owned().is_ok()
    }
}
