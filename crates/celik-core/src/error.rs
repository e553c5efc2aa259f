//! Error types for the card reader library.
//!
//! Every fallible operation returns [`Result`], whose error type [`enum@Error`]
//! carries enough detail for diagnostics while still collapsing onto the
//! fourteen result kinds of the public card API through [`Error::kind`].
//!
//! # Error Categories
//!
//! - **Codec errors**: fields exceeding their capacity, malformed TLV/BER data
//! - **Transport errors**: reader faults and card removal (these end the session)
//! - **Session errors**: lifecycle violations, detection failures
//! - **Verification errors**: certificate and signature format checks
//! - **Password errors**: rejected or blocked PINs
//!
//! # Example
//!
//! ```
//! use celik_core::{Error, ErrorKind};
//!
//! let err = Error::InvalidPassword { attempts_remaining: 2 };
//! assert_eq!(err.kind(), ErrorKind::InvalidPassword);
//! assert_eq!(err.code(), -14);
//! assert!(!err.invalidates_session());
//! ```

use core::fmt;
use core::result::Result as CoreResult;
use hex::FromHexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::card::CardFamily;

/// The main error type for the card reader library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Field Codec Errors
    // =========================================================================
    /// A decoded value does not fit the fixed capacity of its field.
    #[error("field `{field}` holds {actual} bytes but its capacity is {capacity}")]
    FieldOverflow {
        /// Name of the record field.
        field: &'static str,
        /// Fixed capacity of the field.
        capacity: usize,
        /// Length of the rejected value.
        actual: usize,
    },

    /// The card returned data that does not follow the expected layout.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The card returned a status word with no specific meaning here.
    #[error("unexpected status word: SW1={0:#04x}, SW2={1:#04x}")]
    UnexpectedStatusWord(u8, u8),

    /// Unclassified failure.
    #[error("{0}")]
    General(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The reader could not be reached or failed mid-exchange.
    #[error("reader error: {0}")]
    Reader(String),

    /// There is no card in the reader, or it was removed.
    #[error("no card present in the reader")]
    CardMissing,

    // =========================================================================
    // Lifecycle and Session Errors
    // =========================================================================
    /// A caller supplied an argument outside the documented range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested API version is not implemented.
    #[error("API version {requested} is not supported (supported: 1..={supported})")]
    VersionNotSupported {
        /// Version asked for by the caller.
        requested: u32,
        /// Highest version this library implements.
        supported: u32,
    },

    /// The session is closed, or was invalidated by a transport fault.
    #[error("no card session is open")]
    NotInitialized,

    /// The operation does not exist for the detected card family.
    #[error("operation not available: {0}")]
    UnableToExecute(String),

    /// The card in the reader is not a recognised document.
    #[error("unrecognised card (ATR {atr})")]
    CardUnknown {
        /// Answer-to-reset of the card, hex encoded.
        atr: String,
    },

    /// A specific family was requested but a different card is present.
    #[error("expected a {requested} card but found a {detected} card")]
    CardMismatch {
        /// Family the caller asked for.
        requested: CardFamily,
        /// Family actually detected.
        detected: CardFamily,
    },

    /// Application selection or other negotiation with the card failed.
    #[error("failed to open card session: {0}")]
    SessionOpenFailed(String),

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// The requested file or record is not present on the card.
    #[error("data missing on card: {0}")]
    DataMissing(String),

    // =========================================================================
    // Verification Errors
    // =========================================================================
    /// The card-side security data failed a structural or signature check.
    #[error("card security check failed: {0}")]
    CardFormatCheck(String),

    /// A certificate could not be parsed or uses an unsupported algorithm.
    #[error("certificate check failed: {0}")]
    CertificateFormatCheck(String),

    // =========================================================================
    // Password Errors
    // =========================================================================
    /// The card rejected the PIN.
    #[error("wrong PIN, {attempts_remaining} attempts remaining")]
    InvalidPassword {
        /// Attempts left before the card blocks the PIN.
        attempts_remaining: u8,
    },

    /// The PIN is blocked.
    #[error("PIN is blocked")]
    PinBlocked,
}

/// The fourteen result kinds exposed by the card API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Unclassified failure.
    GeneralError,
    /// Caller contract violation.
    InvalidParameter,
    /// API version negotiation mismatch.
    VersionNotSupported,
    /// Operation attempted without an open session.
    NotInitialized,
    /// Operation not applicable to the detected card.
    UnableToExecute,
    /// Transport fault.
    ReaderError,
    /// No card in the reader.
    CardMissing,
    /// Card not recognised.
    CardUnknown,
    /// Card differs from the requested family.
    CardMismatch,
    /// Lower-level negotiation failure.
    SessionOpenFailed,
    /// Requested data absent on this card.
    DataMissing,
    /// Card or certificate structural check failed.
    FormatCheckError,
    /// PIN rejected.
    InvalidPassword,
    /// PIN blocked.
    PinBlocked,
}

impl ErrorKind {
    /// Returns the numeric result code of the card API.
    ///
    /// [`ErrorKind::FormatCheckError`] reports the card-side code; use
    /// [`Error::code`] to distinguish certificate-side failures.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::GeneralError => -1,
            Self::InvalidParameter => -2,
            Self::VersionNotSupported => -3,
            Self::NotInitialized => -4,
            Self::UnableToExecute => -5,
            Self::ReaderError => -6,
            Self::CardMissing => -7,
            Self::CardUnknown => -8,
            Self::CardMismatch => -9,
            Self::SessionOpenFailed => -10,
            Self::DataMissing => -11,
            Self::FormatCheckError => -12,
            Self::InvalidPassword => -14,
            Self::PinBlocked => -15,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Error {
    /// Classifies this error into one of the API result kinds.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::FieldOverflow { .. }
            | Self::MalformedResponse(_)
            | Self::UnexpectedStatusWord(..)
            | Self::General(_) => ErrorKind::GeneralError,
            Self::Reader(_) => ErrorKind::ReaderError,
            Self::CardMissing => ErrorKind::CardMissing,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::VersionNotSupported { .. } => ErrorKind::VersionNotSupported,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::UnableToExecute(_) => ErrorKind::UnableToExecute,
            Self::CardUnknown { .. } => ErrorKind::CardUnknown,
            Self::CardMismatch { .. } => ErrorKind::CardMismatch,
            Self::SessionOpenFailed(_) => ErrorKind::SessionOpenFailed,
            Self::DataMissing(_) => ErrorKind::DataMissing,
            Self::CardFormatCheck(_) | Self::CertificateFormatCheck(_) => {
                ErrorKind::FormatCheckError
            }
            Self::InvalidPassword { .. } => ErrorKind::InvalidPassword,
            Self::PinBlocked => ErrorKind::PinBlocked,
        }
    }

    /// Returns the numeric result code of the card API.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::CertificateFormatCheck(_) => -13,
            other => other.kind().code(),
        }
    }

    /// Returns `true` if the error means the card channel can no longer be
    /// trusted and the session has to be reopened.
    #[must_use]
    pub const fn invalidates_session(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ReaderError | ErrorKind::CardMissing
        )
    }
}

impl From<FromHexError> for Error {
    fn from(err: FromHexError) -> Self {
        Error::InvalidParameter(format!("hex decoding failed: {err}"))
    }
}

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Error::InvalidParameter(format!("invalid configuration: {err}"))
    }
}

#[cfg(feature = "pcsc")]
impl From<pcsc::Error> for Error {
    fn from(err: pcsc::Error) -> Self {
        match err {
            pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard | pcsc::Error::ResetCard => {
                Error::CardMissing
            }
            other => Error::Reader(other.to_string()),
        }
    }
}

/// A specialized [`Result`] type for card operations.
pub type Result<T> = CoreResult<T, Error>;
