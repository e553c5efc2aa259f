//! Fixed-capacity record fields.
//!
//! Every value read from a card lands in a [`Field`]: a byte buffer whose
//! capacity `N` is fixed at compile time, paired with the number of bytes
//! actually in use. There is no terminator. Consumers slice exactly
//! [`Field::len`] bytes; whatever sits past that point in the buffer is not
//! part of the value and is never compared, printed or serialized.
//!
//! # Example
//!
//! ```
//! use celik_core::Field;
//!
//! let name: Field<9> = Field::from_slice("doc_reg_no", b"012345678")?;
//! assert_eq!(name.as_bytes(), b"012345678");
//! assert_eq!(name.capacity(), 9);
//!
//! // Values are never truncated to fit.
//! assert!(Field::<4>::from_slice("sex", b"longer").is_err());
//! # Ok::<(), celik_core::Error>(())
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// A fixed-capacity byte field with an explicit length.
#[derive(Clone)]
pub struct Field<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> Field<N> {
    /// Copies `value` into a new field.
    ///
    /// # Arguments
    ///
    /// * `name` - Field name, reported if the value does not fit
    /// * `value` - The decoded bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldOverflow`] if `value` is longer than `N`.
    pub fn from_slice(name: &'static str, value: &[u8]) -> Result<Self> {
        if value.len() > N {
            return Err(Error::FieldOverflow {
                field: name,
                capacity: N,
                actual: value.len(),
            });
        }
        let mut bytes = [0u8; N];
        bytes[..value.len()].copy_from_slice(value);
        Ok(Self {
            bytes,
            len: value.len(),
        })
    }

    /// Rebuilds a field from a raw buffer and length, as exchanged with
    /// bindings that hand over the whole buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldOverflow`] if `len` is larger than `N`.
    pub fn from_raw(name: &'static str, bytes: [u8; N], len: usize) -> Result<Self> {
        if len > N {
            return Err(Error::FieldOverflow {
                field: name,
                capacity: N,
                actual: len,
            });
        }
        Ok(Self { bytes, len })
    }

    /// Returns the whole buffer and the length in use.
    #[must_use]
    pub fn into_raw(self) -> ([u8; N], usize) {
        (self.bytes, self.len)
    }

    /// Returns the used bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Returns the number of used bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the field holds no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Returns the value as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    /// Returns the value as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

impl<const N: usize> Default for Field<N> {
    fn default() -> Self {
        Self {
            bytes: [0u8; N],
            len: 0,
        }
    }
}

impl<const N: usize> PartialEq for Field<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> Eq for Field<N> {}

impl<const N: usize> fmt::Debug for Field<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) if N <= 512 => write!(f, "{text:?}"),
            _ => write!(f, "<{} of {N} bytes>", self.len),
        }
    }
}

impl<const N: usize> Serialize for Field<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(text) => serializer.serialize_str(text),
            None => serializer.serialize_str(&hex::encode(self.as_bytes())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_keeps_exact_length() {
        let field: Field<10> = Field::from_slice("date", b"01.02.2020").unwrap();
        assert_eq!(field.len(), 10);
        assert_eq!(field.as_str(), Some("01.02.2020"));
    }

    #[test]
    fn from_slice_rejects_overflow() {
        let err = Field::<2>::from_slice("document_type", b"ID1").unwrap_err();
        assert!(matches!(
            err,
            Error::FieldOverflow {
                field: "document_type",
                capacity: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn from_raw_rejects_length_past_capacity() {
        assert!(Field::<4>::from_raw("floor", [0; 4], 5).is_err());
    }

    #[test]
    fn raw_round_trip_ignores_tail_bytes() {
        let original: Field<8> = Field::from_slice("house_letter", b"AB").unwrap();
        let (mut bytes, len) = original.clone().into_raw();
        bytes[len..].fill(0xEE);
        let decoded = Field::from_raw("house_letter", bytes, len).unwrap();
        assert_eq!(decoded.as_bytes(), original.as_bytes());
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_field() {
        let field = Field::<200>::default();
        assert!(field.is_empty());
        assert_eq!(field.capacity(), 200);
        assert_eq!(field.as_bytes(), b"");
    }

    #[test]
    fn serialize_text_and_binary() {
        let text: Field<20> = Field::from_slice("place", "Београд".as_bytes()).unwrap();
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"Београд\"");

        let binary: Field<4> = Field::from_slice("blob", &[0xFF, 0x00]).unwrap();
        assert_eq!(serde_json::to_string(&binary).unwrap(), "\"ff00\"");
    }

    #[test]
    fn debug_hides_large_buffers() {
        let portrait: Field<7700> = Field::from_slice("portrait", &[0xFF; 16]).unwrap();
        assert_eq!(format!("{portrait:?}"), "<16 of 7700 bytes>");
    }
}
