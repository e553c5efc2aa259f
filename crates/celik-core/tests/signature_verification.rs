//! Signature verification against simulated cards and a generated PKI.

// Silence unused crate dependency warnings for test binary
#[cfg(feature = "pcsc")]
use pcsc as _;
use rand as _;
use rsa as _;
use serde as _;
use serde_json as _;
use sha2 as _;
use signature as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;
use x509_parser as _;

mod common;

use celik_core::card::CardFamily;
use celik_core::card::tlv;
use celik_core::config::{SignatureLayout, TrustSettings};
use celik_core::{CertificateRef, CertificateRole, Config, Error, ErrorKind, SignatureRole};
use common::{
    CARD_SIGNATURE, DOCUMENT, FIXED_SIGNATURE, PORTRAIT_SIGNATURE, Pki, READER, context_with,
    context_with_config, document_body, fixed_personal_body, id_card, portrait_body,
    signed_id_card, vehicle_card,
};

const IDENTITY_FAMILIES: [CardFamily; 4] = [
    CardFamily::IdCard2008,
    CardFamily::IdCard2014,
    CardFamily::ForeignerId2020,
    CardFamily::ResidencePermit2024,
];

#[test]
fn identity_roles_verify_on_every_family() {
    let pki = Pki::new("Verification CA");
    for family in IDENTITY_FAMILIES {
        let (mut context, _) = context_with(signed_id_card(family, &pki));
        let mut session = context.begin_read(READER, None).unwrap();

        for role in [SignatureRole::Card, SignatureRole::Fixed, SignatureRole::Variable] {
            let result = session.verify_signature(&pki.ca(), role).unwrap();
            assert!(result.is_valid(), "{family} {role:?}: {:?}", result.errors);
            assert!(result.signer_subject.contains("Verification CA Signer"));
            assert!(result.errors.is_empty());
        }
    }
}

#[test]
fn portrait_role_follows_the_layout() {
    let pki = Pki::new("Portrait CA");

    let (mut context, _) = context_with(signed_id_card(CardFamily::IdCard2008, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    let result = session
        .verify_signature(&pki.ca(), SignatureRole::Portrait)
        .unwrap();
    assert!(result.is_valid());
    drop(session);

    let (mut context, _) = context_with(signed_id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    let err = session
        .verify_signature(&pki.ca(), SignatureRole::Portrait)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnableToExecute);
    // The portrait is still covered, through the fixed data signature.
    assert!(
        session
            .verify_signature(&pki.ca(), SignatureRole::Fixed)
            .unwrap()
            .is_valid()
    );
}

#[test]
fn configured_layout_enables_separate_portrait_signature() {
    let pki = Pki::new("Layout CA");
    let card = id_card(CardFamily::IdCard2014, &pki)
        .with_file(FIXED_SIGNATURE, &pki.signature_file(&fixed_personal_body()))
        .unwrap()
        .with_file(PORTRAIT_SIGNATURE, &pki.signature_file(&portrait_body()))
        .unwrap();
    let config = Config {
        signature_layout: SignatureLayout {
            separate_portrait_signature: vec![CardFamily::IdCard2008, CardFamily::IdCard2014],
        },
        ..Config::default()
    };
    let (mut context, _) = context_with_config(card, config);
    let mut session = context.begin_read(READER, None).unwrap();

    for role in [SignatureRole::Fixed, SignatureRole::Portrait] {
        assert!(session.verify_signature(&pki.ca(), role).unwrap().is_valid());
    }
}

#[test]
fn tampered_data_fails_the_signature_check() {
    let pki = Pki::new("Tamper CA");
    let forged = tlv::encode(&[(1546, &b"999999999"[..])]).unwrap();
    let card = signed_id_card(CardFamily::IdCard2014, &pki)
        .with_file(DOCUMENT, &forged)
        .unwrap();
    let (mut context, _) = context_with(card);
    let mut session = context.begin_read(READER, None).unwrap();

    let result = session
        .verify_signature(&pki.ca(), SignatureRole::Card)
        .unwrap();
    assert!(result.chain_valid);
    assert!(!result.signature_valid);
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(
        result.into_result(),
        Err(Error::CardFormatCheck(_))
    ));
}

#[test]
fn foreign_anchor_fails_the_chain_check() {
    let pki = Pki::new("Genuine CA");
    let impostor = Pki::new("Impostor CA");
    let (mut context, _) = context_with(signed_id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();

    let result = session
        .verify_signature(&impostor.ca(), SignatureRole::Variable)
        .unwrap();
    assert!(!result.chain_valid);
    assert!(result.signature_valid);
    assert!(!result.is_valid());
}

#[test]
fn card_anchor_is_the_stored_intermediate_ca() {
    let pki = Pki::new("Anchor CA");
    let (mut context, _) = context_with(signed_id_card(CardFamily::ForeignerId2020, &pki));
    let mut session = context.begin_read(READER, None).unwrap();

    let result = session
        .verify_with_card_anchor(SignatureRole::Fixed)
        .unwrap();
    assert!(result.is_valid());
}

#[test]
fn signature_without_signer_uses_the_trusted_certificate() {
    let pki = Pki::new("Direct CA");
    let file = tlv::encode(&[(1, pki.sign(&document_body()).as_slice())]).unwrap();
    let card = id_card(CardFamily::IdCard2014, &pki)
        .with_file(CARD_SIGNATURE, &file)
        .unwrap();
    let (mut context, _) = context_with(card);
    let mut session = context.begin_read(READER, None).unwrap();

    let signer = CertificateRef::from_der(CertificateRole::User1, &pki.signer_der).unwrap();
    let result = session
        .verify_signature(&signer, SignatureRole::Card)
        .unwrap();
    assert!(result.is_valid());

    // The CA key did not make this signature.
    let result = session
        .verify_signature(&pki.ca(), SignatureRole::Card)
        .unwrap();
    assert!(!result.signature_valid);
}

#[test]
fn unusable_security_data() {
    let pki = Pki::new("Broken Security CA");
    let no_value = tlv::encode(&[(2, pki.signer_der.as_slice())]).unwrap();
    let card = id_card(CardFamily::IdCard2014, &pki)
        .with_file(CARD_SIGNATURE, &no_value)
        .unwrap();
    let (mut context, _) = context_with(card);
    let mut session = context.begin_read(READER, None).unwrap();

    assert!(matches!(
        session.verify_signature(&pki.ca(), SignatureRole::Card),
        Err(Error::CardFormatCheck(_))
    ));
    // No variable signature file on this card.
    assert_eq!(
        session
            .verify_signature(&pki.ca(), SignatureRole::Variable)
            .unwrap_err()
            .kind(),
        ErrorKind::DataMissing
    );
}

#[test]
fn garbage_anchor_is_a_certificate_error() {
    let pki = Pki::new("Garbage Anchor CA");
    let (mut context, _) = context_with(signed_id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();

    let garbage =
        CertificateRef::from_der(CertificateRole::IntermediateCa, b"not a certificate").unwrap();
    let err = session
        .verify_signature(&garbage, SignatureRole::Card)
        .unwrap_err();
    assert!(matches!(err, Error::CertificateFormatCheck(_)));
    assert_eq!(err.code(), -13);
    assert!(session.is_open());
}

#[test]
fn registration_blocks_verify() {
    let pki = Pki::new("Registration Authority");
    let (mut context, _) = context_with(vehicle_card(&pki));
    let mut session = context.begin_read(READER, None).unwrap();

    for index in 1..=3 {
        let result = session.verify_registration(index, None).unwrap();
        assert!(result.is_valid(), "block {index}: {:?}", result.errors);
        assert_eq!(result.role, SignatureRole::Registration(index));

        let anchored = session.verify_registration(index, Some(&pki.ca())).unwrap();
        assert!(anchored.is_valid());
    }

    let impostor = Pki::new("Impostor Authority");
    let result = session
        .verify_registration(2, Some(&impostor.ca()))
        .unwrap();
    assert!(!result.chain_valid);
}

#[test]
fn unsigned_registration_block_is_invalid_parameter() {
    let pki = Pki::new("Block Four CA");
    let (mut context, _) = context_with(vehicle_card(&pki));
    let mut session = context.begin_read(READER, None).unwrap();

    for index in [0, 4, 5] {
        assert_eq!(
            session.verify_registration(index, None).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
    }
    assert!(session.is_open());
}

#[test]
fn tampered_registration_block() {
    let pki = Pki::new("Tampered Registration CA");
    let mut blocks = common::vehicle_blocks();
    blocks[1][2] ^= 0x01;
    let card = vehicle_card(&pki)
        .with_file([0xD0, 0x21], &blocks[1])
        .unwrap();
    let (mut context, _) = context_with(card);
    let mut session = context.begin_read(READER, None).unwrap();

    assert!(session.verify_registration(1, None).unwrap().is_valid());
    let result = session.verify_registration(2, None).unwrap();
    assert!(!result.signature_valid);
}

#[test]
fn roles_are_guarded_by_family() {
    let pki = Pki::new("Role Guard CA");

    let (mut context, _) = context_with(signed_id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    assert_eq!(
        session.verify_registration(1, None).unwrap_err().kind(),
        ErrorKind::UnableToExecute
    );
    drop(session);

    let (mut context, _) = context_with(vehicle_card(&pki));
    let mut session = context.begin_read(READER, None).unwrap();
    assert_eq!(
        session
            .verify_signature(&pki.ca(), SignatureRole::Card)
            .unwrap_err()
            .kind(),
        ErrorKind::UnableToExecute
    );
    assert_eq!(
        session
            .verify_with_card_anchor(SignatureRole::Fixed)
            .unwrap_err()
            .kind(),
        ErrorKind::UnableToExecute
    );
}

#[test]
fn configured_trust_roots() {
    let pki = Pki::new("Rooted CA");
    let trusted = Config {
        trust: TrustSettings {
            trusted_roots: vec![hex::encode(&pki.ca_der)],
        },
        ..Config::default()
    };
    let (mut context, _) =
        context_with_config(signed_id_card(CardFamily::IdCard2014, &pki), trusted);
    let mut session = context.begin_read(READER, None).unwrap();
    assert!(
        session
            .verify_signature(&pki.ca(), SignatureRole::Card)
            .unwrap()
            .is_valid()
    );
    drop(session);

    let stranger = Pki::new("Unrelated Root");
    let untrusted = Config {
        trust: TrustSettings {
            trusted_roots: vec![hex::encode(&stranger.ca_der)],
        },
        ..Config::default()
    };
    let (mut context, _) =
        context_with_config(signed_id_card(CardFamily::IdCard2014, &pki), untrusted);
    let mut session = context.begin_read(READER, None).unwrap();
    let result = session
        .verify_signature(&pki.ca(), SignatureRole::Card)
        .unwrap();
    assert!(!result.chain_valid);
    assert!(result.signature_valid);
    assert!(result.errors[0].contains("root"));
}
