//! Little-endian TLV used inside identity and health insurance card files.
//!
//! Each entry is a 2-byte little-endian tag, a 2-byte little-endian length and
//! the value bytes. Entries follow each other with no padding.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Parsed entries of one file, keyed by tag. Later duplicates win.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TlvMap<'a> {
    entries: BTreeMap<u16, &'a [u8]>,
}

impl<'a> TlvMap<'a> {
    /// Parses a file body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] for an empty body, a truncated
    /// header, or a length running past the end of the data.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::MalformedResponse("empty TLV data".to_string()));
        }

        let mut entries = BTreeMap::new();
        let mut rest = data;
        while !rest.is_empty() {
            let Some((header, tail)) = rest.split_first_chunk::<4>() else {
                return Err(Error::MalformedResponse(format!(
                    "truncated TLV header ({} bytes left)",
                    rest.len()
                )));
            };
            let tag = u16::from_le_bytes([header[0], header[1]]);
            let len = usize::from(u16::from_le_bytes([header[2], header[3]]));
            if len > tail.len() {
                return Err(Error::MalformedResponse(format!(
                    "TLV tag {tag} declares {len} bytes but only {} remain",
                    tail.len()
                )));
            }
            let (value, next) = tail.split_at(len);
            entries.insert(tag, value);
            rest = next;
        }

        Ok(Self { entries })
    }

    /// Returns the value of `tag`, if present.
    #[must_use]
    pub fn get(&self, tag: u16) -> Option<&'a [u8]> {
        self.entries.get(&tag).copied()
    }

    /// Returns the value of `tag`, or an empty slice if absent.
    #[must_use]
    pub fn get_or_empty(&self, tag: u16) -> &'a [u8] {
        self.get(tag).unwrap_or_default()
    }

    /// Returns the number of distinct tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Encodes entries in file order.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if a value is longer than 65535 bytes.
pub fn encode(entries: &[(u16, &[u8])]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for &(tag, value) in entries {
        let len = u16::try_from(value.len()).map_err(|_| {
            Error::InvalidParameter(format!("TLV value for tag {tag} is too long"))
        })?;
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(value);
    }
    Ok(out)
}

/// Decodes a UTF-16 text value as stored on health insurance cards.
///
/// Values are little-endian unless a byte-order mark says otherwise. Unpaired
/// surrogates become U+FFFD. Returns `None` for an odd number of bytes.
#[must_use]
pub fn decode_utf16(value: &[u8]) -> Option<String> {
    let (value, big_endian) = match value {
        [0xFF, 0xFE, rest @ ..] => (rest, false),
        [0xFE, 0xFF, rest @ ..] => (rest, true),
        _ => (value, false),
    };
    if !value.len().is_multiple_of(2) {
        return None;
    }
    let units: Vec<u16> = value
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            if big_endian {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            }
        })
        .collect();
    Some(String::from_utf16_lossy(&units))
}
