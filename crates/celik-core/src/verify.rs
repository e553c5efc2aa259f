//! Signature verification of card data.
//!
//! Every signed portion of a card is a [`SignatureRole`]. Identity cards keep
//! one signature file per role, holding the signature value and optionally
//! the certificate of the signer. Vehicle registration cards sign each of
//! their first three data blocks and store the issuing authority
//! certificate beside it.
//!
//! Verification checks two things:
//!
//! 1. the chain: the signer certificate was issued by the certificate the
//!    caller trusts (skipped when the card names no separate signer)
//! 2. the signature over the exact bytes the role covers
//!
//! A mismatch is reported in [`VerificationResult`], not as an error.
//! Errors are reserved for inputs that cannot be checked at all.

use serde::Serialize;
use tracing::{debug, warn};

use crate::card::tlv::TlvMap;
use crate::certificate::{CertificateRef, CertificateRole};
use crate::crypto;
use crate::error::{Error, Result};
use crate::reader::files;
use crate::reader::vehicle::SIGNED_BLOCKS;
use crate::session::CardSession;

/// TLV tag of the signature value in an identity signature file.
const TAG_SIGNATURE: u16 = 1;

/// TLV tag of the optional signer certificate.
const TAG_SIGNER: u16 = 2;

/// Which portion of the card a signature covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureRole {
    /// The document data.
    Card,
    /// The fixed personal data, and the portrait when it has no signature
    /// of its own.
    Fixed,
    /// The variable personal data.
    Variable,
    /// The portrait, on families that sign it separately.
    Portrait,
    /// Vehicle registration block `1..=3`.
    Registration(u8),
}

impl SignatureRole {
    /// Returns the role for a numeric API id (1 = card, 2 = fixed,
    /// 3 = variable, 4 = portrait).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for other ids.
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            1 => Ok(Self::Card),
            2 => Ok(Self::Fixed),
            3 => Ok(Self::Variable),
            4 => Ok(Self::Portrait),
            other => Err(Error::InvalidParameter(format!(
                "unknown signature id {other}"
            ))),
        }
    }
}

/// A signature with the data it covers. Never leaves this module.
struct SignatureBlock {
    role: SignatureRole,
    signature: Vec<u8>,
    signer: Option<Vec<u8>>,
    covered: Vec<u8>,
}

/// Outcome of one verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    /// The role that was checked.
    pub role: SignatureRole,
    /// Subject of the certificate whose key made the signature.
    pub signer_subject: String,
    /// `true` if the signer chains to the trusted certificate.
    pub chain_valid: bool,
    /// `true` if the signature matches the covered data.
    pub signature_valid: bool,
    /// What failed, in order of discovery.
    pub errors: Vec<String>,
}

impl VerificationResult {
    /// Returns `true` if both the chain and the signature check passed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.chain_valid && self.signature_valid
    }

    /// Converts a failed verification into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CardFormatCheck`] listing the failures.
    pub fn into_result(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::CardFormatCheck(self.errors.join("; ")))
        }
    }
}

impl CardSession<'_> {
    /// Fails unless `role` can be verified on this session.
    fn check_signature_role(&self, role: SignatureRole) -> Result<()> {
        match role {
            SignatureRole::Registration(index) => {
                if !SIGNED_BLOCKS.contains(&index) {
                    return Err(Error::InvalidParameter(format!(
                        "registration block {index} is not signed"
                    )));
                }
                self.require_vehicle("registration signature verification")
            }
            SignatureRole::Portrait => {
                self.require_identity("signature verification")?;
                if self
                    .config()
                    .signature_layout
                    .portrait_signed_separately(self.family())
                {
                    Ok(())
                } else {
                    Err(Error::UnableToExecute(format!(
                        "{} signs the portrait together with the fixed data",
                        self.family()
                    )))
                }
            }
            SignatureRole::Card | SignatureRole::Fixed | SignatureRole::Variable => {
                self.require_identity("signature verification")
            }
        }
    }

    fn load_signature_block(&mut self, role: SignatureRole) -> Result<SignatureBlock> {
        if let SignatureRole::Registration(index) = role {
            let block = self.read_raw_block(index)?;
            return Ok(SignatureBlock {
                role,
                signature: block.signature,
                signer: Some(block.certificate),
                covered: block.data,
            });
        }

        let portrait_folded = !self
            .config()
            .signature_layout
            .portrait_signed_separately(self.family());
        let (signature_file, data_files): (_, &[[u8; 2]]) = match role {
            SignatureRole::Card => (files::CARD_SIGNATURE, &[files::DOCUMENT]),
            SignatureRole::Fixed if portrait_folded => (
                files::FIXED_SIGNATURE,
                &[files::FIXED_PERSONAL, files::PORTRAIT],
            ),
            SignatureRole::Fixed => (files::FIXED_SIGNATURE, &[files::FIXED_PERSONAL]),
            SignatureRole::Variable => (files::VARIABLE_SIGNATURE, &[files::VARIABLE_PERSONAL]),
            SignatureRole::Portrait | SignatureRole::Registration(_) => {
                (files::PORTRAIT_SIGNATURE, &[files::PORTRAIT])
            }
        };

        let signature_body = self.read_identity_file(signature_file)?;
        let mut covered = Vec::new();
        for &file in data_files {
            covered.extend(self.read_identity_file(file)?);
        }

        let tlv = TlvMap::parse(&signature_body)?;
        let signature = tlv
            .get(TAG_SIGNATURE)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::CardFormatCheck(format!("{role:?} signature file has no signature value"))
            })?
            .to_vec();
        let signer = tlv
            .get(TAG_SIGNER)
            .filter(|value| !value.is_empty())
            .map(<[u8]>::to_vec);

        Ok(SignatureBlock {
            role,
            signature,
            signer,
            covered,
        })
    }

    /// Returns an error message if trust roots are configured and `anchor`
    /// is neither one of them nor issued by one.
    fn check_trust_roots(&self, anchor: &[u8]) -> Result<Option<String>> {
        let roots = self.config().trust.roots_der()?;
        if roots.is_empty() {
            return Ok(None);
        }
        for root in &roots {
            if root.as_slice() == anchor || crypto::verify_issued_by(anchor, root)? {
                return Ok(None);
            }
        }
        Ok(Some(
            "trusted certificate is not issued by a configured root".to_string(),
        ))
    }

    /// Verifies one signed portion of the card against `trusted`.
    ///
    /// # Arguments
    ///
    /// * `trusted` - The certificate the signer must chain to, usually the
    ///   intermediate CA read with [`read_certificate`](Self::read_certificate)
    ///   or a root the caller ships
    /// * `role` - The portion to verify
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] for [`SignatureRole::Registration`]
    ///   outside `1..=3`; block 4 is unsigned
    /// - [`Error::NotInitialized`] if the session is closed
    /// - [`Error::UnableToExecute`] if the role does not exist on the
    ///   detected family, including [`SignatureRole::Portrait`] on families
    ///   that fold the portrait into the fixed data signature
    /// - [`Error::DataMissing`] if a signature or data file is absent
    /// - [`Error::CertificateFormatCheck`] if a certificate cannot be parsed
    pub fn verify_signature(
        &mut self,
        trusted: &CertificateRef,
        role: SignatureRole,
    ) -> Result<VerificationResult> {
        self.check_signature_role(role)?;
        let mut errors = Vec::new();
        if let Some(error) = self.check_trust_roots(trusted.as_der())? {
            errors.push(error);
        }
        let block = self.load_signature_block(role)?;
        evaluate(trusted.as_der(), &block, errors)
    }

    /// Verifies `role` against the intermediate CA certificate stored on the
    /// card itself.
    ///
    /// # Errors
    ///
    /// Same as [`verify_signature`](Self::verify_signature).
    pub fn verify_with_card_anchor(&mut self, role: SignatureRole) -> Result<VerificationResult> {
        self.check_signature_role(role)?;
        let anchor = self.read_certificate(CertificateRole::IntermediateCa)?;
        self.verify_signature(&anchor, role)
    }

    /// Verifies vehicle registration block `index`.
    ///
    /// With `trusted`, the issuing authority certificate on the card must
    /// chain to it. Without, only the signature is checked against the
    /// issuing authority certificate.
    ///
    /// # Errors
    ///
    /// Same as [`verify_signature`](Self::verify_signature).
    pub fn verify_registration(
        &mut self,
        index: u8,
        trusted: Option<&CertificateRef>,
    ) -> Result<VerificationResult> {
        let role = SignatureRole::Registration(index);
        if let Some(trusted) = trusted {
            return self.verify_signature(trusted, role);
        }

        self.check_signature_role(role)?;
        let mut block = self.load_signature_block(role)?;
        let anchor = block.signer.take().ok_or_else(|| {
            Error::DataMissing(format!("issuing authority certificate of block {index}"))
        })?;
        evaluate(&anchor, &block, Vec::new())
    }
}

fn evaluate(
    anchor: &[u8],
    block: &SignatureBlock,
    mut errors: Vec<String>,
) -> Result<VerificationResult> {
    let signer = block.signer.as_deref().unwrap_or(anchor);
    let subject = crypto::parse_certificate(signer)?.subject;

    let mut chain_valid = errors.is_empty();
    if block.signer.is_some() && signer != anchor && !crypto::verify_issued_by(signer, anchor)? {
        chain_valid = false;
        errors.push(format!("{subject} is not issued by the trusted certificate"));
    }

    let signature_valid = crypto::verify_data_signature(signer, &block.covered, &block.signature)?;
    if !signature_valid {
        errors.push(format!("{:?} signature does not match the card data", block.role));
    }

    let result = VerificationResult {
        role: block.role,
        signer_subject: subject,
        chain_valid,
        signature_valid,
        errors,
    };
    if result.is_valid() {
        debug!(role = ?result.role, signer = %result.signer_subject, "signature verified");
    } else {
        warn!(role = ?result.role, errors = ?result.errors, "signature verification failed");
    }
    Ok(result)
}
