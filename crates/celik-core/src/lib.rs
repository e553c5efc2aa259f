//! Celik Core Library
//!
//! This crate reads Serbian electronic identity documents, vehicle
//! registration certificates and health insurance cards from contact smart
//! cards, and verifies that identity and vehicle data was signed by the
//! issuing authority.
//!
//! # Overview
//!
//! Supported card families:
//!
//! - **Identity card** (2008 and 2014 generations)
//! - **Foreigner identity card** (2020)
//! - **Residence permit** (2024)
//! - **Vehicle registration certificate**
//! - **Health insurance card** (read only, unsigned)
//!
//! The family is detected from the answer-to-reset and the applications the
//! card answers to; it is never assumed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Document   │ Certificate │  Signature   │    Password      │
//! │   Reader    │    Store    │  Verifier    │    Manager       │
//! ├─────────────────────────────────────────────────────────────┤
//! │          Card Session (EidContext / CardSession)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────────────┐ │
//! │  │  APDU   │  │ TLV/BER │  │ Family  │  │    Transport    │ │
//! │  │ Encode  │  │ Decode  │  │ Detect  │  │   Abstraction   │ │
//! │  └─────────┘  └─────────┘  └─────────┘  └─────────────────┘ │
//! ├─────────────────────────────────────────────────────────────┤
//! │              Transport Layer (PC/SC / virtual)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use celik_core::card::{CardFamily, VirtualCard, VirtualReader};
//! use celik_core::card::tlv;
//! use celik_core::{EidContext, API_VERSION};
//!
//! let document = tlv::encode(&[(1546, &b"012345678"[..]), (1547, &b"ID"[..])])?;
//! let card = VirtualCard::identity(CardFamily::IdCard2014).with_file([0x0F, 0x02], &document)?;
//! let reader = VirtualReader::with_card("Reader 0", card);
//!
//! let mut context = EidContext::startup(API_VERSION, reader)?;
//! let mut session = context.begin_read("Reader 0", None)?;
//! let data = session.read_document_data()?;
//! assert_eq!(data.doc_reg_no.as_str(), Some("012345678"));
//! # Ok::<(), celik_core::Error>(())
//! ```
//!
//! With a physical reader, enable the `pcsc` feature and start the context
//! with a [`card::PcscConnector`] instead.
//!
//! # Field Encoding
//!
//! Every value is a [`Field`]: a fixed-capacity byte buffer with an explicit
//! length and no terminator. Values longer than their capacity are rejected
//! with [`Error::FieldOverflow`], never truncated.
//!
//! # Feature Flags
//!
//! - `pcsc`: PC/SC transport for physical readers
//!
//! # Concurrency
//!
//! All card operations block for the duration of the exchange. A
//! [`CardSession`] must not be used from several threads at once; wrap it in
//! a mutex if that is needed.

#[cfg(test)]
use tracing_subscriber as _;

// Modules
pub mod card;
pub mod certificate;
pub mod config;
pub mod crypto;
pub mod error;
pub mod field;
pub mod password;
pub mod reader;
pub mod records;
pub mod session;
pub mod verify;

// Re-exports for convenience
pub use certificate::{CertificateRef, CertificateRole};
pub use config::{Config, SessionOption};
pub use error::{Error, ErrorKind, Result};
pub use field::Field;
pub use password::PasswordChangeResult;
pub use records::{
    DocumentData, DocumentRecord, FixedPersonalData, MedicalData, PersonalData, Portrait,
    RecordKind, RegistrationData, VariablePersonalData, VehicleData, VehicleDocumentData,
};
pub use session::{API_VERSION, CardSession, EidContext, SessionState};
pub use verify::{SignatureRole, VerificationResult};
