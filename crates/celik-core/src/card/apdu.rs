//! ISO 7816-4 command and response APDUs.
//!
//! # Command Structure
//!
//! ```text
//! | CLA | INS | P1 | P2 | Lc     | Data | Le     |
//! |-----|-----|----|----|--------|------|--------|
//! | 1B  | 1B  | 1B | 1B | 0/1/3B | Var  | 0-3B   |
//! ```
//!
//! Short encoding is used while the command data fits in 255 bytes and the
//! expected response length `Ne` is at most 256; the extended encoding is used
//! otherwise. `Ne = 256` is written as `00` in short form and `Ne = 65536` as
//! `00 00` in extended form.
//!
//! # Example
//!
//! ```
//! use celik_core::card::Apdu;
//!
//! // READ BINARY of 0xFF bytes at offset 4
//! let apdu = Apdu::read_binary(4, 0xFF);
//! assert_eq!(apdu.to_bytes(), vec![0x00, 0xB0, 0x00, 0x04, 0xFF]);
//! ```

use crate::error::{Error, Result};

/// Instruction bytes used by the document applications.
pub mod ins {
    /// `SELECT`.
    pub const SELECT: u8 = 0xA4;

    /// `READ BINARY`.
    pub const READ_BINARY: u8 = 0xB0;

    /// `VERIFY`.
    pub const VERIFY: u8 = 0x20;

    /// `CHANGE REFERENCE DATA`.
    pub const CHANGE_REFERENCE_DATA: u8 = 0x24;
}

/// An APDU command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,

    /// Expected response length `Ne` (0 = no response data expected).
    ne: u32,
}

impl Apdu {
    /// Maximum short APDU data length.
    pub const MAX_SHORT_DATA: usize = 255;

    /// Largest `Ne` expressible in short form.
    pub const MAX_SHORT_NE: u32 = 256;

    /// Largest `Ne` expressible at all.
    pub const MAX_EXTENDED_NE: u32 = 65_536;

    /// Creates a command without an expected response length.
    #[must_use]
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            ne: 0,
        }
    }

    /// Creates a command with an expected response length.
    ///
    /// # Arguments
    ///
    /// * `ne` - Expected response length, `1..=65536`; values above the
    ///   maximum are clamped
    #[must_use]
    pub fn with_ne(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>, ne: u32) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            ne: ne.min(Self::MAX_EXTENDED_NE),
        }
    }

    /// Builds a `READ BINARY` at `offset` for `len` bytes.
    #[must_use]
    pub fn read_binary(offset: u16, len: u16) -> Self {
        let [hi, lo] = offset.to_be_bytes();
        Self::with_ne(0x00, ins::READ_BINARY, hi, lo, Vec::new(), u32::from(len))
    }

    /// Returns the class byte.
    #[must_use]
    pub const fn cla(&self) -> u8 {
        self.cla
    }

    /// Returns the instruction byte.
    #[must_use]
    pub const fn ins(&self) -> u8 {
        self.ins
    }

    /// Returns parameter 1.
    #[must_use]
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Returns parameter 2.
    #[must_use]
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Returns the command data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the expected response length.
    #[must_use]
    pub const fn ne(&self) -> u32 {
        self.ne
    }

    /// Serializes the APDU to bytes.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "lengths are bounded by the short/extended limits checked above"
    )]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + 3 + self.data.len() + 3);
        bytes.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);

        let extended = self.data.len() > Self::MAX_SHORT_DATA || self.ne > Self::MAX_SHORT_NE;

        if extended {
            bytes.push(0x00);
            if !self.data.is_empty() {
                bytes.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&self.data);
            }
            if self.ne > 0 {
                let ne = if self.ne == Self::MAX_EXTENDED_NE {
                    0
                } else {
                    self.ne as u16
                };
                bytes.extend_from_slice(&ne.to_be_bytes());
            }
        } else {
            if !self.data.is_empty() {
                bytes.push(self.data.len() as u8);
                bytes.extend_from_slice(&self.data);
            }
            if self.ne > 0 {
                bytes.push(if self.ne == Self::MAX_SHORT_NE {
                    0x00
                } else {
                    self.ne as u8
                });
            }
        }

        bytes
    }
}

/// An APDU response: data followed by the two status bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    data: Vec<u8>,
    sw1: u8,
    sw2: u8,
}

impl ApduResponse {
    /// Success status word (0x9000).
    pub const SW_SUCCESS: u16 = 0x9000;

    /// Parses a raw response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if fewer than two bytes arrived.
    ///
    /// # Example
    ///
    /// ```
    /// use celik_core::card::ApduResponse;
    ///
    /// let response = ApduResponse::from_bytes(vec![0x01, 0x02, 0x90, 0x00])?;
    /// assert!(response.is_success());
    /// assert_eq!(response.data(), &[0x01, 0x02]);
    /// # Ok::<(), celik_core::Error>(())
    /// ```
    pub fn from_bytes(mut bytes: Vec<u8>) -> Result<Self> {
        let Some(sw2) = bytes.pop() else {
            return Err(Error::MalformedResponse("empty response".to_string()));
        };
        let Some(sw1) = bytes.pop() else {
            return Err(Error::MalformedResponse(
                "response shorter than a status word".to_string(),
            ));
        };
        Ok(Self {
            data: bytes,
            sw1,
            sw2,
        })
    }

    /// Builds a response from data and a status word.
    #[must_use]
    pub fn with_status(data: Vec<u8>, sw: u16) -> Self {
        let [sw1, sw2] = sw.to_be_bytes();
        Self { data, sw1, sw2 }
    }

    /// Returns the response data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the response and returns the data.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns status word 1.
    #[must_use]
    pub const fn sw1(&self) -> u8 {
        self.sw1
    }

    /// Returns status word 2.
    #[must_use]
    pub const fn sw2(&self) -> u8 {
        self.sw2
    }

    /// Returns the full status word.
    #[must_use]
    pub const fn status_word(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Checks if the response indicates success (`SW = 0x9000`).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_word() == Self::SW_SUCCESS
    }

    /// Returns an error unless the status word is `0x9000`.
    ///
    /// # Errors
    ///
    /// See [`to_error`](Self::to_error).
    pub const fn check(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self.to_error())
        }
    }

    /// Converts the status word to an error.
    ///
    /// - `63Cx` → [`Error::InvalidPassword`] with `x` attempts remaining
    /// - `6983` → [`Error::PinBlocked`]
    /// - `6A82` → [`Error::DataMissing`]
    /// - anything else → [`Error::UnexpectedStatusWord`]
    #[must_use]
    pub const fn to_error(&self) -> Error {
        match (self.sw1, self.sw2) {
            (0x63, 0xC0..=0xCF) => Error::InvalidPassword {
                attempts_remaining: self.sw2 & 0x0F,
            },
            (0x69, 0x83) => Error::PinBlocked,
            (0x6A, 0x82) => Error::DataMissing(String::new()),
            _ => Error::UnexpectedStatusWord(self.sw1, self.sw2),
        }
    }
}
