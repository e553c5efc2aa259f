//! Document record reads.
//!
//! Every read is a method on [`CardSession`]. Identity cards store records
//! as TLV files ([`id`]), vehicle registration cards as BER objects
//! ([`vehicle`]), and health insurance cards as TLV files with UTF-16 text
//! ([`medical`]). Calling a read that the detected family does not have
//! fails with [`Error::UnableToExecute`](crate::Error::UnableToExecute).

pub mod id;
pub mod medical;
pub mod vehicle;

use crate::certificate::CertificateRole;
use crate::error::{Error, Result};
use crate::records::{DocumentRecord, RecordKind};
use crate::session::CardSession;

/// Elementary file ids.
pub(crate) mod files {
    /// Document data.
    pub(crate) const DOCUMENT: [u8; 2] = [0x0F, 0x02];
    /// Fixed personal data.
    pub(crate) const FIXED_PERSONAL: [u8; 2] = [0x0F, 0x03];
    /// Variable personal data.
    pub(crate) const VARIABLE_PERSONAL: [u8; 2] = [0x0F, 0x04];
    /// Portrait.
    pub(crate) const PORTRAIT: [u8; 2] = [0x0F, 0x06];

    /// Signature over the document file.
    pub(crate) const CARD_SIGNATURE: [u8; 2] = [0x0F, 0x11];
    /// Signature over the fixed personal data.
    pub(crate) const FIXED_SIGNATURE: [u8; 2] = [0x0F, 0x12];
    /// Signature over the variable personal data.
    pub(crate) const VARIABLE_SIGNATURE: [u8; 2] = [0x0F, 0x13];
    /// Signature over the portrait.
    pub(crate) const PORTRAIT_SIGNATURE: [u8; 2] = [0x0F, 0x14];

    /// Intermediate CA certificate.
    pub(crate) const INTERMEDIATE_CA: [u8; 2] = [0x0F, 0x21];
    /// First user certificate.
    pub(crate) const USER_1: [u8; 2] = [0x0F, 0x22];
    /// Second user certificate.
    pub(crate) const USER_2: [u8; 2] = [0x0F, 0x23];

    /// Health insurance document data.
    pub(crate) const MEDICAL_DOCUMENT: [u8; 2] = [0x0D, 0x01];
    /// Health insurance fixed personal data.
    pub(crate) const MEDICAL_FIXED_PERSONAL: [u8; 2] = [0x0D, 0x02];
    /// Health insurance variable personal data.
    pub(crate) const MEDICAL_VARIABLE_PERSONAL: [u8; 2] = [0x0D, 0x03];
    /// Health insurance variable administrative data.
    pub(crate) const MEDICAL_VARIABLE_ADMIN: [u8; 2] = [0x0D, 0x04];

    /// Vehicle registration data block `index`.
    pub(crate) const fn registration_data(index: u8) -> [u8; 2] {
        [0xD0, (index << 4) | 0x01]
    }

    /// Vehicle registration signature for block `index`.
    pub(crate) const fn registration_signature(index: u8) -> [u8; 2] {
        [0xE0, (index << 4) | 0x01]
    }

    /// Issuing authority certificate for block `index`.
    pub(crate) const fn registration_certificate(index: u8) -> [u8; 2] {
        [0xC0, (index << 4) | 0x01]
    }
}

impl CardSession<'_> {
    /// Reads any record by kind.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the session is closed
    /// - [`Error::UnableToExecute`] if `kind` does not exist on the detected
    ///   family
    /// - the errors of the specific read
    pub fn read_record(&mut self, kind: RecordKind) -> Result<DocumentRecord> {
        self.ensure_open()?;
        if !kind.available_on(self.family()) {
            return Err(Error::UnableToExecute(format!(
                "{kind:?} records do not exist on {}",
                self.family()
            )));
        }

        Ok(match kind {
            RecordKind::IdentityDocument => {
                DocumentRecord::IdentityDocument(self.read_document_data()?)
            }
            RecordKind::FixedPersonal => {
                DocumentRecord::FixedPersonal(Box::new(self.read_fixed_personal_data()?))
            }
            RecordKind::VariablePersonal => {
                DocumentRecord::VariablePersonal(self.read_variable_personal_data()?)
            }
            RecordKind::Portrait => DocumentRecord::Portrait(Box::new(self.read_portrait()?)),
            RecordKind::Certificate(role) => {
                DocumentRecord::Certificate(Box::new(self.read_certificate(role)?))
            }
            RecordKind::Registration(index) => {
                DocumentRecord::Registration(Box::new(self.read_registration(index)?))
            }
            RecordKind::VehicleDocument => {
                DocumentRecord::VehicleDocument(self.read_vehicle_document_data()?)
            }
            RecordKind::Vehicle => DocumentRecord::Vehicle(Box::new(self.read_vehicle_data()?)),
            RecordKind::Personal => DocumentRecord::Personal(self.read_personal_data()?),
            RecordKind::Medical => DocumentRecord::Medical(Box::new(self.read_medical_data()?)),
        })
    }

    /// Reads every record the detected family has.
    ///
    /// Records whose file is absent on this card are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error other than [`Error::DataMissing`] or
    /// [`Error::UnableToExecute`].
    pub fn read_all(&mut self) -> Result<Vec<DocumentRecord>> {
        let family = self.family();
        let kinds: &[RecordKind] = if family.is_identity() {
            &[
                RecordKind::IdentityDocument,
                RecordKind::FixedPersonal,
                RecordKind::VariablePersonal,
                RecordKind::Portrait,
                RecordKind::Certificate(CertificateRole::IntermediateCa),
                RecordKind::Certificate(CertificateRole::User1),
                RecordKind::Certificate(CertificateRole::User2),
            ]
        } else if family.is_vehicle() {
            &[
                RecordKind::VehicleDocument,
                RecordKind::Vehicle,
                RecordKind::Personal,
                RecordKind::Registration(1),
                RecordKind::Registration(2),
                RecordKind::Registration(3),
                RecordKind::Registration(4),
            ]
        } else {
            &[RecordKind::Medical]
        };

        let mut records = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            match self.read_record(kind) {
                Ok(record) => records.push(record),
                Err(err) if is_skippable(&err) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }
}

const fn is_skippable(err: &Error) -> bool {
    matches!(err, Error::DataMissing(_) | Error::UnableToExecute(_))
}
