//! X.509 parsing and signature checks.
//!
//! Card data is signed with RSA PKCS#1 v1.5 or ECDSA P-256, both over
//! SHA-256. Certificates in a chain may additionally be signed with
//! SHA-384 or SHA-512 RSA.
//!
//! Functions return `Ok(false)` for a signature that does not match and an
//! error only when an input cannot be interpreted at all.

use p256::elliptic_curve::sec1::ToEncodedPoint as _;
use rsa::RsaPublicKey;
use rsa::pkcs1v15;
use rsa::pkcs8::DecodePublicKey as _;
use sha2::digest::const_oid::AssociatedOid;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::Verifier as _;

use crate::error::{Error, Result};

/// SubjectPublicKeyInfo algorithm OIDs.
mod key_oid {
    pub(super) const RSA: &str = "1.2.840.113549.1.1.1";
    pub(super) const EC: &str = "1.2.840.10045.2.1";
}

/// Certificate signature algorithm OIDs.
mod sig_oid {
    pub(super) const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
    pub(super) const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
    pub(super) const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";
    pub(super) const ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
}

/// The parts of a certificate the checks need.
#[derive(Debug, Clone)]
pub(crate) struct ParsedCertificate {
    pub(crate) subject: String,
    pub(crate) issuer: String,
    spki_der: Vec<u8>,
    key_oid: String,
    tbs_der: Vec<u8>,
    signature_oid: String,
    signature: Vec<u8>,
}

/// Parses a DER certificate.
///
/// # Errors
///
/// Returns [`Error::CertificateFormatCheck`] if `der` is not a certificate.
pub(crate) fn parse_certificate(der: &[u8]) -> Result<ParsedCertificate> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| Error::CertificateFormatCheck(format!("invalid certificate DER: {e}")))?;
    let tbs = &cert.tbs_certificate;

    Ok(ParsedCertificate {
        subject: tbs.subject.to_string(),
        issuer: tbs.issuer.to_string(),
        spki_der: tbs.subject_pki.raw.to_vec(),
        key_oid: tbs.subject_pki.algorithm.algorithm.to_string(),
        tbs_der: tbs.as_ref().to_vec(),
        signature_oid: cert.signature_algorithm.algorithm.to_string(),
        signature: cert.signature_value.data.to_vec(),
    })
}

fn rsa_key(spki_der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(spki_der)
        .map_err(|e| Error::CertificateFormatCheck(format!("bad RSA public key: {e}")))
}

fn p256_key(spki_der: &[u8]) -> Result<p256::ecdsa::VerifyingKey> {
    let key = p256::PublicKey::from_public_key_der(spki_der)
        .map_err(|e| Error::CertificateFormatCheck(format!("bad P-256 public key: {e}")))?;
    let point = key.to_encoded_point(false);
    p256::ecdsa::VerifyingKey::from_sec1_bytes(point.as_bytes())
        .map_err(|e| Error::CertificateFormatCheck(format!("bad P-256 public key: {e}")))
}

fn verify_rsa<D>(key: RsaPublicKey, message: &[u8], signature: &[u8]) -> bool
where
    D: Digest + AssociatedOid,
{
    let key = pkcs1v15::VerifyingKey::<D>::new(key);
    pkcs1v15::Signature::try_from(signature)
        .is_ok_and(|signature| key.verify(message, &signature).is_ok())
}

/// ECDSA signatures arrive DER-encoded, or as raw `r || s` from some cards.
fn verify_p256(key: &p256::ecdsa::VerifyingKey, message: &[u8], signature: &[u8]) -> bool {
    p256::ecdsa::Signature::from_der(signature)
        .or_else(|_| p256::ecdsa::Signature::from_slice(signature))
        .is_ok_and(|signature| key.verify(message, &signature).is_ok())
}

/// Checks `signature` over `data` with the key of the certificate `cert_der`.
///
/// # Errors
///
/// Returns [`Error::CertificateFormatCheck`] if the certificate cannot be
/// parsed or holds a key other than RSA or P-256.
pub fn verify_data_signature(cert_der: &[u8], data: &[u8], signature: &[u8]) -> Result<bool> {
    let cert = parse_certificate(cert_der)?;
    match cert.key_oid.as_str() {
        key_oid::RSA => Ok(verify_rsa::<Sha256>(
            rsa_key(&cert.spki_der)?,
            data,
            signature,
        )),
        key_oid::EC => Ok(verify_p256(&p256_key(&cert.spki_der)?, data, signature)),
        other => Err(Error::CertificateFormatCheck(format!(
            "unsupported public key algorithm {other}"
        ))),
    }
}

/// Checks that `issuer_der` signed the certificate `cert_der`.
///
/// # Errors
///
/// Returns [`Error::CertificateFormatCheck`] if either certificate cannot be
/// parsed or the signature algorithm is unsupported.
pub fn verify_issued_by(cert_der: &[u8], issuer_der: &[u8]) -> Result<bool> {
    let cert = parse_certificate(cert_der)?;
    let issuer = parse_certificate(issuer_der)?;
    if cert.issuer != issuer.subject {
        return Ok(false);
    }

    let (tbs, signature) = (&cert.tbs_der, &cert.signature);
    match cert.signature_oid.as_str() {
        sig_oid::SHA256_WITH_RSA => Ok(verify_rsa::<Sha256>(
            rsa_key(&issuer.spki_der)?,
            tbs,
            signature,
        )),
        sig_oid::SHA384_WITH_RSA => Ok(verify_rsa::<Sha384>(
            rsa_key(&issuer.spki_der)?,
            tbs,
            signature,
        )),
        sig_oid::SHA512_WITH_RSA => Ok(verify_rsa::<Sha512>(
            rsa_key(&issuer.spki_der)?,
            tbs,
            signature,
        )),
        sig_oid::ECDSA_WITH_SHA256 => Ok(verify_p256(&p256_key(&issuer.spki_der)?, tbs, signature)),
        other => Err(Error::CertificateFormatCheck(format!(
            "unsupported certificate signature algorithm {other}"
        ))),
    }
}
