//! Health insurance card reads.
//!
//! The card keeps its data in four TLV files that together make up one
//! [`MedicalData`] record.

use super::files;
use crate::card::FileLayout;
use crate::card::tlv::TlvMap;
use crate::error::Result;
use crate::records::{MedicalData, MedicalFiles};
use crate::session::CardSession;

impl CardSession<'_> {
    /// Reads the health insurance data.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`](crate::Error::NotInitialized) if the
    ///   session is closed
    /// - [`Error::UnableToExecute`](crate::Error::UnableToExecute) on identity
    ///   and vehicle registration cards
    /// - [`Error::DataMissing`](crate::Error::DataMissing) if one of the four
    ///   files is absent
    /// - [`Error::FieldOverflow`](crate::Error::FieldOverflow) if a value
    ///   exceeds its capacity
    pub fn read_medical_data(&mut self) -> Result<MedicalData> {
        self.require_medical("reading health insurance data")?;
        let [document, fixed_personal, variable_personal, variable_admin] =
            self.exchange(|channel| {
                let mut read = |file_id: [u8; 2]| channel.read_file(FileLayout::Medical, file_id);
                Ok([
                    read(files::MEDICAL_DOCUMENT)?,
                    read(files::MEDICAL_FIXED_PERSONAL)?,
                    read(files::MEDICAL_VARIABLE_PERSONAL)?,
                    read(files::MEDICAL_VARIABLE_ADMIN)?,
                ])
            })?;

        MedicalData::from_files(&MedicalFiles {
            document: TlvMap::parse(&document)?,
            fixed_personal: TlvMap::parse(&fixed_personal)?,
            variable_personal: TlvMap::parse(&variable_personal)?,
            variable_admin: TlvMap::parse(&variable_admin)?,
        })
    }
}
