//! Library configuration.
//!
//! Everything has a default, so an empty JSON object is a valid
//! configuration:
//!
//! ```
//! use celik_core::Config;
//!
//! let config = Config::from_json(r#"{ "session": { "keep_card_closed": true } }"#)?;
//! assert!(config.session.keep_card_closed);
//! assert_eq!(config.password.max_attempts, 3);
//! # Ok::<(), celik_core::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::card::CardFamily;
use crate::error::{Error, Result};

/// Numeric id of the keep-card-closed option.
pub const OPTION_KEEP_CARD_CLOSED: u32 = 1;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session behaviour.
    pub session: SessionOptions,
    /// Which families sign the portrait separately.
    pub signature_layout: SignatureLayout,
    /// PIN format and retry budget.
    pub password: PasswordPolicy,
    /// Additional trust anchors for verification.
    pub trust: TrustSettings,
}

impl Config {
    /// Parses a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for malformed JSON or invalid
    /// values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let policy = &self.password;
        if policy.min_length == 0 || policy.min_length > policy.max_length {
            return Err(Error::InvalidParameter(format!(
                "password length range {}..={} is empty",
                policy.min_length, policy.max_length
            )));
        }
        if policy.max_length > 8 {
            return Err(Error::InvalidParameter(
                "password max_length cannot exceed 8".to_string(),
            ));
        }
        self.trust.roots_der().map(|_| ())
    }
}

/// Session-wide options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Release the card channel between operations and reconnect for each
    /// one. Slower, but leaves the reader free for other applications.
    pub keep_card_closed: bool,
}

impl SessionOptions {
    /// Applies one option.
    pub fn apply(&mut self, option: SessionOption) {
        match option {
            SessionOption::KeepCardClosed(value) => self.keep_card_closed = value,
        }
    }
}

/// A single session option, as set through `set_option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionOption {
    /// See [`SessionOptions::keep_card_closed`].
    KeepCardClosed(bool),
}

impl SessionOption {
    /// Builds an option from its numeric id and value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for unknown ids.
    pub fn from_raw(id: u32, value: usize) -> Result<Self> {
        match id {
            OPTION_KEEP_CARD_CLOSED => Ok(Self::KeepCardClosed(value != 0)),
            other => Err(Error::InvalidParameter(format!("unknown option id {other}"))),
        }
    }
}

/// Per-family signature layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureLayout {
    /// Families whose portrait has its own signature block. All others fold
    /// the portrait into the fixed personal data signature.
    pub separate_portrait_signature: Vec<CardFamily>,
}

impl Default for SignatureLayout {
    fn default() -> Self {
        Self {
            separate_portrait_signature: vec![CardFamily::IdCard2008],
        }
    }
}

impl SignatureLayout {
    /// Returns `true` if `family` signs the portrait separately.
    #[must_use]
    pub fn portrait_signed_separately(&self, family: CardFamily) -> bool {
        self.separate_portrait_signature.contains(&family)
    }
}

/// PIN format and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Attempts the card grants before blocking.
    pub max_attempts: u8,
    /// Shortest accepted PIN.
    pub min_length: usize,
    /// Longest accepted PIN.
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_length: 4,
            max_length: 8,
        }
    }
}

impl PasswordPolicy {
    /// Checks that `pin` is all ASCII digits and within the length range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] otherwise.
    pub fn validate(&self, pin: &str) -> Result<()> {
        if !(self.min_length..=self.max_length).contains(&pin.len()) {
            return Err(Error::InvalidParameter(format!(
                "PIN must be {} to {} digits long",
                self.min_length, self.max_length
            )));
        }
        if !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidParameter(
                "PIN must contain digits only".to_string(),
            ));
        }
        Ok(())
    }
}

/// Extra trust anchors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSettings {
    /// Hex-encoded DER root certificates. When not empty, the certificate a
    /// caller verifies against must be one of these or be issued by one.
    pub trusted_roots: Vec<String>,
}

impl TrustSettings {
    /// Decodes the configured roots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for invalid hex.
    pub fn roots_der(&self) -> Result<Vec<Vec<u8>>> {
        self.trusted_roots
            .iter()
            .map(|root| hex::decode(root.trim()).map_err(Error::from))
            .collect()
    }
}
