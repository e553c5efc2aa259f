//! Card-resident certificates.
//!
//! Identity cards carry the certificate of the intermediate authority that
//! issued the card and one or two user certificates. All are DER-encoded
//! X.509 and returned as opaque bytes.

use serde::Serialize;

use crate::card::CardFamily;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::reader::files;
use crate::session::CardSession;

/// Certificate capacity of the public card API.
pub const CERTIFICATE_CAPACITY: usize = 4096;

/// Largest certificate an identity card stores.
pub const IDENTITY_CERTIFICATE_LIMIT: usize = 2048;

/// Which certificate to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateRole {
    /// The intermediate authority that issued the card.
    IntermediateCa,
    /// First user certificate.
    User1,
    /// Second user certificate. Not present on ID cards from 2008.
    User2,
    /// The authority that signed a vehicle registration block. Only found
    /// inside [`RegistrationData`](crate::records::RegistrationData).
    IssuingAuthority,
}

impl CertificateRole {
    /// Returns the role for a numeric API id (1 = CA, 2 = user 1,
    /// 3 = user 2).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for other ids.
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            1 => Ok(Self::IntermediateCa),
            2 => Ok(Self::User1),
            3 => Ok(Self::User2),
            other => Err(Error::InvalidParameter(format!(
                "unknown certificate id {other}"
            ))),
        }
    }

    /// Returns the file id of this role on `family`, or `None` if the card
    /// does not store it.
    #[must_use]
    pub(crate) const fn file_id(self, family: CardFamily) -> Option<[u8; 2]> {
        match (self, family) {
            (_, CardFamily::VehicleRegistration | CardFamily::MedicalInsurance)
            | (Self::IssuingAuthority, _)
            | (Self::User2, CardFamily::IdCard2008) => None,
            (Self::IntermediateCa, _) => Some(files::INTERMEDIATE_CA),
            (Self::User1, _) => Some(files::USER_1),
            (Self::User2, _) => Some(files::USER_2),
        }
    }
}

/// A role-tagged DER certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateRef {
    /// What the certificate is for.
    pub role: CertificateRole,
    /// DER bytes.
    pub der: Field<CERTIFICATE_CAPACITY>,
}

impl CertificateRef {
    /// Wraps DER bytes obtained elsewhere, e.g. a root certificate the
    /// caller trusts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldOverflow`] if `der` exceeds 4096 bytes.
    pub fn from_der(role: CertificateRole, der: &[u8]) -> Result<Self> {
        Ok(Self {
            role,
            der: Field::from_slice("certificate", der)?,
        })
    }

    /// Returns the DER bytes.
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        self.der.as_bytes()
    }
}

impl CardSession<'_> {
    /// Reads a certificate from the card.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the session is closed
    /// - [`Error::UnableToExecute`] if the detected card has no such
    ///   certificate, e.g. [`CertificateRole::User2`] on an ID card from 2008
    /// - [`Error::FieldOverflow`] if the certificate exceeds 2048 bytes
    pub fn read_certificate(&mut self, role: CertificateRole) -> Result<CertificateRef> {
        self.ensure_open()?;
        let family = self.family();
        let file_id = role.file_id(family).ok_or_else(|| {
            Error::UnableToExecute(format!("{family} has no {role:?} certificate"))
        })?;

        let der = self.read_identity_file(file_id)?;
        if der.len() > IDENTITY_CERTIFICATE_LIMIT {
            return Err(Error::FieldOverflow {
                field: "certificate",
                capacity: IDENTITY_CERTIFICATE_LIMIT,
                actual: der.len(),
            });
        }
        CertificateRef::from_der(role, &der)
    }
}
