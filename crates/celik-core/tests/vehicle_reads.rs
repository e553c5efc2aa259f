//! Reading vehicle registration cards end to end.

// Silence unused crate dependency warnings for test binary
#[cfg(feature = "pcsc")]
use pcsc as _;
use hex as _;
use rand as _;
use rsa as _;
use serde as _;
use sha2 as _;
use signature as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;
use x509_parser as _;

mod common;

use celik_core::card::CardFamily;
use celik_core::card::ber::Ber;
use celik_core::{CertificateRole, DocumentRecord, Error, ErrorKind, RecordKind};
use common::{Pki, READER, context_with, id_card, vehicle_blocks, vehicle_card};

#[test]
fn decodes_merged_blocks() {
    let pki = Pki::new("Vehicle CA");
    let (mut context, _) = context_with(vehicle_card(&pki));
    let mut session = context.begin_read(READER, None).unwrap();

    let document = session.read_vehicle_document_data().unwrap();
    assert_eq!(document.state_issuing.as_str(), Some("RS"));
    assert_eq!(document.competent_authority.as_str(), Some("MUP RS"));
    assert_eq!(document.serial_number.as_str(), Some("000123456"));
    assert_eq!(document.expiry_date.as_str(), Some("20260514"));
    assert!(document.unambiguous_number.is_empty());

    let vehicle = session.read_vehicle_data().unwrap();
    assert_eq!(vehicle.registration_number_of_vehicle.as_str(), Some("BG1234AB"));
    assert_eq!(vehicle.vehicle_make.as_str(), Some("FIAT"));
    assert_eq!(vehicle.commercial_description.as_str(), Some("PUNTO"));
    assert_eq!(vehicle.engine_capacity.as_str(), Some("1242"));
    // Block 2 contributes to the same tree as block 1.
    assert_eq!(vehicle.year_of_production.as_str(), Some("2008"));
    assert_eq!(vehicle.colour_of_vehicle.as_str(), Some("CRNA"));
    assert!(vehicle.maximum_net_power.is_empty());
}

#[test]
fn owner_and_user() {
    let pki = Pki::new("Owner CA");
    let (mut context, _) = context_with(vehicle_card(&pki));
    let mut session = context.begin_read(READER, None).unwrap();

    let personal = session.read_personal_data().unwrap();
    assert_eq!(personal.owners_personal_no.as_str(), Some("0101990710123"));
    assert_eq!(
        personal.owners_surname_or_business_name.as_str(),
        Some("PETROVIC")
    );
    assert_eq!(personal.owner_name.as_str(), Some("MARKO"));
    assert_eq!(
        personal.owner_address.as_str(),
        Some("BEOGRAD, KNEZA MILOSA 10")
    );
    assert_eq!(
        personal.users_surname_or_business_name.as_str(),
        Some("JOVANOVIC")
    );
    assert_eq!(personal.users_name.as_str(), Some("ANA"));
    assert!(personal.users_address.is_empty());
    assert!(personal.users_personal_no.is_empty());
}

#[test]
fn registration_blocks() {
    let pki = Pki::new("Registration CA");
    let (mut context, _) = context_with(vehicle_card(&pki));
    let mut session = context.begin_read(READER, None).unwrap();
    let blocks = vehicle_blocks();

    let first = session.read_registration(1).unwrap();
    assert_eq!(first.index, 1);
    assert!(first.is_signed());
    assert_eq!(first.registration_data.as_bytes(), blocks[0].as_slice());
    assert_eq!(first.issuing_authority.as_bytes(), pki.signer_der.as_slice());
    assert!(!first.signature_data.is_empty());

    let unsigned = session.read_registration(4).unwrap();
    assert!(!unsigned.is_signed());
    assert_eq!(unsigned.registration_data.as_bytes(), blocks[3].as_slice());
    assert!(unsigned.issuing_authority.is_empty());

    for index in [0, 5] {
        assert!(matches!(
            session.read_registration(index),
            Err(Error::InvalidParameter(_))
        ));
    }
}

#[test]
fn broken_block_is_malformed() {
    let pki = Pki::new("Broken CA");
    let card = vehicle_card(&pki)
        .with_file([0xD0, 0x21], &[0x72, 0x05, 0x98])
        .unwrap();
    let (mut context, _) = context_with(card);
    let mut session = context.begin_read(READER, None).unwrap();

    assert!(matches!(
        session.read_vehicle_data(),
        Err(Error::MalformedResponse(_))
    ));
    assert!(session.is_open());
}

#[test]
fn oversized_vehicle_value_is_rejected() {
    let pki = Pki::new("Vehicle Overflow CA");
    let block = Ber::constructed(0x71, vec![Ber::primitive(0x81, vec![b'X'; 21])]);
    let card = vehicle_card(&pki)
        .with_file([0xD0, 0x11], &block.to_bytes())
        .unwrap();
    let (mut context, _) = context_with(card);
    let mut session = context.begin_read(READER, None).unwrap();

    assert!(matches!(
        session.read_vehicle_data(),
        Err(Error::FieldOverflow {
            field: "registration_number_of_vehicle",
            capacity: 20,
            actual: 21,
        })
    ));
}

#[test]
fn identity_operations_are_unavailable() {
    let pki = Pki::new("Vehicle Guard CA");
    let (mut context, _) = context_with(vehicle_card(&pki));
    let mut session = context.begin_read(READER, None).unwrap();

    assert_eq!(
        session.read_document_data().unwrap_err().kind(),
        ErrorKind::UnableToExecute
    );
    assert_eq!(
        session.read_portrait().unwrap_err().kind(),
        ErrorKind::UnableToExecute
    );
    assert_eq!(
        session
            .read_certificate(CertificateRole::IntermediateCa)
            .unwrap_err()
            .kind(),
        ErrorKind::UnableToExecute
    );
    assert!(matches!(
        session.change_password(common::PIN, "5678"),
        Err(Error::UnableToExecute(_))
    ));
}

#[test]
fn read_all_on_vehicle_card() {
    let pki = Pki::new("Vehicle Read All CA");
    let (mut context, _) = context_with(vehicle_card(&pki));
    let mut session = context.begin_read(READER, None).unwrap();

    let records = session.read_all().unwrap();
    assert_eq!(records.len(), 7);
    assert!(matches!(records[0], DocumentRecord::VehicleDocument(_)));
    let registrations: Vec<u8> = records
        .iter()
        .filter_map(|record| match record {
            DocumentRecord::Registration(data) => Some(data.index),
            _ => None,
        })
        .collect();
    assert_eq!(registrations, vec![1, 2, 3, 4]);
}

#[test]
fn record_kinds_follow_the_family() {
    let pki = Pki::new("Kinds CA");
    assert!(RecordKind::Registration(1).available_on(CardFamily::VehicleRegistration));
    assert!(!RecordKind::Portrait.available_on(CardFamily::VehicleRegistration));

    let (mut context, _) = context_with(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    assert!(matches!(
        session.read_record(RecordKind::Registration(1)),
        Err(Error::UnableToExecute(_))
    ));
}
