//! BER-TLV trees used by vehicle-registration cards.
//!
//! Tags are one to three bytes (ISO/IEC 7816-4, 5.2). Bit 6 of the first
//! tag byte marks a constructed node. Lengths use the short form or the
//! `81`..`84` long forms; the indefinite form `80` is rejected.
//!
//! Vehicle data is spread over several files whose trees share top-level
//! templates, so trees can be [merged](Ber::merge) before fields are looked up
//! by [path](Ber::access).

use crate::error::{Error, Result};

/// A node in a BER tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ber {
    tag: u32,
    value: BerValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BerValue {
    Primitive(Vec<u8>),
    Constructed(Vec<Ber>),
}

/// Parses a tag, returning `(tag, constructed, bytes consumed)`.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if `data` ends inside the tag.
pub fn parse_tag(data: &[u8]) -> Result<(u32, bool, usize)> {
    let Some(&first) = data.first() else {
        return Err(Error::MalformedResponse("missing BER tag".to_string()));
    };
    let constructed = first & 0x20 != 0;

    if first & 0x1F != 0x1F {
        return Ok((u32::from(first), constructed, 1));
    }
    match data {
        [a, b, ..] if b & 0x80 == 0 => Ok((u32::from_be_bytes([0, 0, *a, *b]), constructed, 2)),
        [a, b, c, ..] => Ok((u32::from_be_bytes([0, *a, *b, *c]), constructed, 3)),
        _ => Err(Error::MalformedResponse("truncated BER tag".to_string())),
    }
}

/// Parses a definite length, returning `(length, bytes consumed)`.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] for the indefinite form, for long
/// forms wider than four bytes, and for truncated input.
pub fn parse_length(data: &[u8]) -> Result<(usize, usize)> {
    let Some(&first) = data.first() else {
        return Err(Error::MalformedResponse("missing BER length".to_string()));
    };
    match first {
        0x00..=0x7F => Ok((usize::from(first), 1)),
        0x80 => Err(Error::MalformedResponse(
            "indefinite BER length is not supported".to_string(),
        )),
        0x81..=0x84 => {
            let width = usize::from(first & 0x7F);
            let Some(bytes) = data.get(1..=width) else {
                return Err(Error::MalformedResponse("truncated BER length".to_string()));
            };
            let len = bytes
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
            Ok((len, 1 + width))
        }
        _ => Err(Error::MalformedResponse(format!(
            "unsupported BER length byte {first:#04x}"
        ))),
    }
}

impl Ber {
    /// Creates a primitive node.
    #[must_use]
    pub fn primitive(tag: u32, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            value: BerValue::Primitive(value.into()),
        }
    }

    /// Creates a constructed node.
    #[must_use]
    pub fn constructed(tag: u32, children: Vec<Ber>) -> Self {
        Self {
            tag,
            value: BerValue::Constructed(children),
        }
    }

    /// Parses a sequence of BER objects into an untagged root node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] for malformed tags or lengths, for
    /// values running past the end of `data`, and for a tag appearing both as
    /// primitive and constructed at the same level.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut root = Self::constructed(0, Vec::new());
        let mut offset = 0;

        while offset < data.len() {
            let (tag, constructed, tag_len) = parse_tag(&data[offset..])?;
            offset += tag_len;
            let (len, len_len) = parse_length(&data[offset..])?;
            offset += len_len;

            let Some(value) = data.get(offset..offset + len) else {
                return Err(Error::MalformedResponse(format!(
                    "BER tag {tag:X} runs past the end of the data"
                )));
            };
            offset += len;

            let node = if constructed {
                let inner = if value.is_empty() {
                    Vec::new()
                } else {
                    Self::parse(value)?.into_children()
                };
                Self::constructed(tag, inner)
            } else {
                Self::primitive(tag, value)
            };
            root.add(node)?;
        }

        Ok(root)
    }

    /// Returns the tag of this node.
    #[must_use]
    pub const fn tag(&self) -> u32 {
        self.tag
    }

    /// Returns the value of a primitive node.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        match &self.value {
            BerValue::Primitive(data) => Some(data),
            BerValue::Constructed(_) => None,
        }
    }

    /// Returns the children of a constructed node.
    #[must_use]
    pub fn children(&self) -> &[Ber] {
        match &self.value {
            BerValue::Primitive(_) => &[],
            BerValue::Constructed(children) => children,
        }
    }

    fn into_children(self) -> Vec<Ber> {
        match self.value {
            BerValue::Primitive(_) => Vec::new(),
            BerValue::Constructed(children) => children,
        }
    }

    /// Follows `path` from this node and returns the primitive value found.
    #[must_use]
    pub fn access(&self, path: &[u32]) -> Option<&[u8]> {
        let mut node = self;
        for tag in path {
            node = node.children().iter().find(|child| child.tag == *tag)?;
        }
        node.value()
    }

    /// Inserts `node`, descending into existing constructed nodes with the
    /// same tag. A primitive with an existing tag replaces the old value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] when inserting into a primitive
    /// node or when the existing node has the other kind.
    pub fn add(&mut self, node: Ber) -> Result<()> {
        let BerValue::Constructed(children) = &mut self.value else {
            return Err(Error::MalformedResponse(format!(
                "cannot add BER tag {:X} under primitive tag {:X}",
                node.tag, self.tag
            )));
        };

        let Some(existing) = children.iter_mut().find(|child| child.tag == node.tag) else {
            children.push(node);
            return Ok(());
        };

        let tag = node.tag;
        let existing_is_primitive = matches!(existing.value, BerValue::Primitive(_));
        match node.value {
            BerValue::Primitive(new) if existing_is_primitive => {
                existing.value = BerValue::Primitive(new);
                Ok(())
            }
            BerValue::Constructed(new_children) if !existing_is_primitive => {
                for child in new_children {
                    existing.add(child)?;
                }
                Ok(())
            }
            _ => Err(Error::MalformedResponse(format!(
                "BER tag {tag:X} is both primitive and constructed"
            ))),
        }
    }

    /// Merges all children of `other` into this tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the root tags differ or a
    /// node kind conflicts.
    pub fn merge(&mut self, other: Ber) -> Result<()> {
        if self.tag != other.tag {
            return Err(Error::MalformedResponse(format!(
                "cannot merge BER tag {:X} into {:X}",
                other.tag, self.tag
            )));
        }
        for child in other.into_children() {
            self.add(child)?;
        }
        Ok(())
    }

    /// Encodes this node with definite lengths.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let value = match &self.value {
            BerValue::Primitive(data) => data.clone(),
            BerValue::Constructed(children) => children.iter().flat_map(Ber::to_bytes).collect(),
        };

        let mut out: Vec<u8> = self
            .tag
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        if out.is_empty() {
            out.push(0);
        }
        out.extend(encode_length(value.len()));
        out.extend(value);
        out
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len.to_le_bytes()[0]];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .into_iter()
        .skip_while(|b| *b == 0)
        .collect();
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(0x80 | bytes.len().to_le_bytes()[0]);
    out.extend(bytes);
    out
}
