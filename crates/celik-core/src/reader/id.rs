//! Identity card reads.
//!
//! Identity card files hold a simple TLV body behind a family-specific
//! header. The header is handled by [`CardChannel::read_file`]; this module
//! decodes the body into records.
//!
//! [`CardChannel::read_file`]: crate::card::CardChannel::read_file

use super::files;
use crate::card::FileLayout;
use crate::card::tlv::TlvMap;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::records::{DocumentData, FixedPersonalData, Portrait, VariablePersonalData};
use crate::session::CardSession;

/// Bytes in front of the JPEG data in the portrait file.
const PORTRAIT_PREFIX: usize = 4;

/// Strips the portrait file prefix.
pub(crate) fn portrait_image(body: &[u8]) -> Result<&[u8]> {
    body.get(PORTRAIT_PREFIX..).ok_or_else(|| {
        Error::MalformedResponse(format!(
            "portrait file is {} bytes, shorter than its prefix",
            body.len()
        ))
    })
}

impl CardSession<'_> {
    /// Reads the body of an identity card file.
    pub(crate) fn read_identity_file(&mut self, file_id: [u8; 2]) -> Result<Vec<u8>> {
        let layout = FileLayout::for_family(self.family());
        self.exchange(|channel| channel.read_file(layout, file_id))
    }

    /// Reads the document data.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the session is closed
    /// - [`Error::UnableToExecute`] on vehicle registration cards
    /// - [`Error::DataMissing`] if the card has no document file
    /// - [`Error::FieldOverflow`] if a value exceeds its capacity
    pub fn read_document_data(&mut self) -> Result<DocumentData> {
        self.require_identity("reading document data")?;
        let body = self.read_identity_file(files::DOCUMENT)?;
        DocumentData::from_tlv(&TlvMap::parse(&body)?)
    }

    /// Reads the fixed personal data.
    ///
    /// # Errors
    ///
    /// Same as [`read_document_data`](Self::read_document_data).
    pub fn read_fixed_personal_data(&mut self) -> Result<FixedPersonalData> {
        self.require_identity("reading fixed personal data")?;
        let body = self.read_identity_file(files::FIXED_PERSONAL)?;
        FixedPersonalData::from_tlv(&TlvMap::parse(&body)?)
    }

    /// Reads the variable personal data (residence).
    ///
    /// # Errors
    ///
    /// Same as [`read_document_data`](Self::read_document_data).
    pub fn read_variable_personal_data(&mut self) -> Result<VariablePersonalData> {
        self.require_identity("reading variable personal data")?;
        let body = self.read_identity_file(files::VARIABLE_PERSONAL)?;
        VariablePersonalData::from_tlv(&TlvMap::parse(&body)?)
    }

    /// Reads the portrait.
    ///
    /// # Errors
    ///
    /// Same as [`read_document_data`](Self::read_document_data), and
    /// [`Error::FieldOverflow`] for images over 7700 bytes.
    pub fn read_portrait(&mut self) -> Result<Portrait> {
        self.require_identity("reading the portrait")?;
        let body = self.read_identity_file(files::PORTRAIT)?;
        Ok(Portrait {
            portrait: Field::from_slice("portrait", portrait_image(&body)?)?,
        })
    }
}
