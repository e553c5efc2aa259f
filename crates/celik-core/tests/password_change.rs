//! PIN changes and the retry counter.

// Silence unused crate dependency warnings for test binary
#[cfg(feature = "pcsc")]
use pcsc as _;
use hex as _;
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

use celik_core::card::apdu::ins;
use celik_core::card::{
    Apdu, ApduResponse, CardFamily, Connector, FileLayout, Transport, VirtualCard, VirtualReader,
};
use celik_core::config::PasswordPolicy;
use celik_core::{API_VERSION, Config, EidContext, Error, ErrorKind, Result};
use common::{PIN, Pki, READER, context_with, context_with_config, id_card};

/// Reader whose connections fail the first SELECT that follows a VERIFY.
struct FlakyReader(VirtualReader);

struct FlakyTransport {
    inner: Box<dyn Transport>,
    verified: bool,
}

impl Connector for FlakyReader {
    fn connect(&mut self, reader: &str) -> Result<Box<dyn Transport>> {
        Ok(Box::new(FlakyTransport {
            inner: self.0.connect(reader)?,
            verified: false,
        }))
    }

    fn list_readers(&mut self) -> Result<Vec<String>> {
        self.0.list_readers()
    }
}

impl Transport for FlakyTransport {
    fn transmit(&mut self, apdu: &Apdu) -> Result<ApduResponse> {
        match apdu.ins() {
            ins::VERIFY => self.verified = true,
            ins::SELECT if self.verified => {
                self.verified = false;
                return Err(Error::Reader("reader glitch".to_string()));
            }
            _ => {}
        }
        self.inner.transmit(apdu)
    }

    fn atr(&mut self) -> Result<Vec<u8>> {
        self.inner.atr()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

fn flaky_context(card: VirtualCard) -> (EidContext, VirtualReader) {
    let reader = VirtualReader::with_card(READER, card);
    let handle = reader.clone();
    let context = EidContext::startup(API_VERSION, FlakyReader(reader)).unwrap();
    (context, handle)
}

#[test]
fn changes_the_pin() {
    let pki = Pki::new("PIN CA");
    let (mut context, reader) = context_with(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();

    let result = session.change_password(PIN, "567890").unwrap();
    assert_eq!(result.attempts_remaining, 3);
    assert!(!result.is_blocked());
    assert_eq!(reader.with_inserted(|card| card.pin_is("567890")), Some(true));

    // The old PIN no longer works, the new one does.
    assert!(matches!(
        session.change_password(PIN, "1111"),
        Err(Error::InvalidPassword {
            attempts_remaining: 2
        })
    ));
    assert!(session.change_password("567890", PIN).is_ok());
    assert_eq!(reader.with_inserted(|card| card.pin_is(PIN)), Some(true));
}

#[test]
fn wrong_pin_counts_down_then_blocks() {
    let pki = Pki::new("Counter CA");
    let (mut context, reader) = context_with(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();

    for expected in [2, 1, 0] {
        let err = session.change_password("0000", "5678").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidPassword { attempts_remaining } if attempts_remaining == expected
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidPassword);
        assert!(session.is_open());
    }

    let exchanges = reader.exchange_count();
    assert!(matches!(
        session.change_password(PIN, "5678"),
        Err(Error::PinBlocked)
    ));
    // Answered without asking the card.
    assert_eq!(reader.exchange_count(), exchanges);
    assert_eq!(reader.with_inserted(|card| card.pin_attempts_remaining()), Some(Some(0)));
}

#[test]
fn blocked_card_reports_blocked_in_a_new_session() {
    let pki = Pki::new("Blocked CA");
    let (mut context, _) = context_with(id_card(CardFamily::IdCard2008, &pki));
    {
        let mut session = context.begin_read(READER, None).unwrap();
        for _ in 0..3 {
            assert!(session.change_password("9999", "5678").is_err());
        }
    }

    let mut session = context.begin_read(READER, None).unwrap();
    let err = session.change_password(PIN, "5678").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PinBlocked);
    assert_eq!(err.code(), -15);
    // Reads are unaffected.
    assert!(session.read_document_data().is_ok());
}

#[test]
fn pin_format_is_checked_before_the_card() {
    let pki = Pki::new("Format CA");
    let (mut context, reader) = context_with(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    let exchanges = reader.exchange_count();

    for (old, new) in [("12", "5678"), (PIN, "123456789"), (PIN, "12a4"), ("", "5678")] {
        assert_eq!(
            session.change_password(old, new).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
    }
    assert_eq!(reader.exchange_count(), exchanges);
    assert_eq!(reader.with_inserted(|card| card.pin_attempts_remaining()), Some(Some(3)));
}

#[test]
fn policy_is_configurable() {
    let pki = Pki::new("Policy CA");
    let config = Config {
        password: PasswordPolicy {
            max_attempts: 5,
            min_length: 6,
            max_length: 8,
        },
        ..Config::default()
    };
    let card = id_card(CardFamily::IdCard2014, &pki)
        .with_pin("123456", 5)
        .unwrap();
    let (mut context, _) = context_with_config(card, config);
    let mut session = context.begin_read(READER, None).unwrap();

    assert!(matches!(
        session.change_password("123456", "5678"),
        Err(Error::InvalidParameter(_))
    ));
    let result = session.change_password("123456", "654321").unwrap();
    assert_eq!(result.attempts_remaining, 5);
}

#[test]
fn card_without_pkcs15_cannot_change_the_pin() {
    let family = CardFamily::IdCard2014;
    let mut card = VirtualCard::new(
        VirtualCard::identity(family).atr().to_vec(),
        FileLayout::for_family(family),
    );
    if let Some(application) = family.application_id() {
        card = card.with_application(application);
    }
    let (mut context, _) = context_with(card);
    let mut session = context.begin_read(READER, None).unwrap();

    assert!(matches!(
        session.change_password(PIN, "5678"),
        Err(Error::UnableToExecute(_))
    ));
    assert!(session.is_open());
}

#[test]
fn closed_session_cannot_change_the_pin() {
    let pki = Pki::new("Closed PIN CA");
    let (mut context, _) = context_with(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    session.end_read();
    assert!(matches!(
        session.change_password(PIN, "5678"),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn blocked_pin_is_reported_before_the_pin_format() {
    let pki = Pki::new("Precedence CA");
    let (mut context, _) = context_with(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    for _ in 0..3 {
        assert!(session.change_password("9999", "5678").is_err());
    }

    for (old, new) in [("12", "5678"), (PIN, "12a4"), ("", "")] {
        assert!(matches!(
            session.change_password(old, new),
            Err(Error::PinBlocked)
        ));
    }
}

#[test]
fn closed_session_is_reported_before_the_pin_format() {
    let pki = Pki::new("Closed Precedence CA");
    let (mut context, _) = context_with(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    session.end_read();

    for (old, new) in [("12", "5678"), (PIN, "123456789")] {
        assert!(matches!(
            session.change_password(old, new),
            Err(Error::NotInitialized)
        ));
    }
}

#[test]
fn change_stands_when_the_reselect_fails() {
    let pki = Pki::new("Reselect CA");
    let (mut context, reader) = flaky_context(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();
    let connects = reader.connect_count();

    let result = session.change_password(PIN, "5678").unwrap();
    assert_eq!(result.attempts_remaining, 3);
    assert_eq!(reader.with_inserted(|card| card.pin_is("5678")), Some(true));
    assert!(session.is_open());

    // The next read reconnects and selects the document application.
    assert!(session.read_document_data().is_ok());
    assert_eq!(reader.connect_count(), connects + 1);
}

#[test]
fn last_rejection_blocks_when_the_reselect_fails() {
    let pki = Pki::new("Reselect Block CA");
    let (mut context, reader) = flaky_context(id_card(CardFamily::IdCard2014, &pki));
    let mut session = context.begin_read(READER, None).unwrap();

    for expected in [2, 1, 0] {
        assert!(matches!(
            session.change_password("0000", "5678"),
            Err(Error::InvalidPassword { attempts_remaining }) if attempts_remaining == expected
        ));
    }

    let exchanges = reader.exchange_count();
    assert!(matches!(
        session.change_password(PIN, "5678"),
        Err(Error::PinBlocked)
    ));
    assert_eq!(reader.exchange_count(), exchanges);
}
