//! Shared fixtures: virtual cards with realistic files and a small PKI.

#![allow(dead_code)]

use celik_core::card::ber::Ber;
use celik_core::card::tlv;
use celik_core::card::{CardFamily, VirtualCard, VirtualReader};
use celik_core::{API_VERSION, CertificateRef, CertificateRole, Config, EidContext};
use p256::ecdsa::SigningKey;
use p256::ecdsa::signature::Signer as _;
use p256::pkcs8::DecodePrivateKey as _;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

pub const READER: &str = "Virtual Reader 0";

pub const DOCUMENT: [u8; 2] = [0x0F, 0x02];
pub const FIXED_PERSONAL: [u8; 2] = [0x0F, 0x03];
pub const VARIABLE_PERSONAL: [u8; 2] = [0x0F, 0x04];
pub const PORTRAIT: [u8; 2] = [0x0F, 0x06];
pub const CARD_SIGNATURE: [u8; 2] = [0x0F, 0x11];
pub const FIXED_SIGNATURE: [u8; 2] = [0x0F, 0x12];
pub const VARIABLE_SIGNATURE: [u8; 2] = [0x0F, 0x13];
pub const PORTRAIT_SIGNATURE: [u8; 2] = [0x0F, 0x14];
pub const INTERMEDIATE_CA: [u8; 2] = [0x0F, 0x21];
pub const USER_1: [u8; 2] = [0x0F, 0x22];
pub const USER_2: [u8; 2] = [0x0F, 0x23];

pub const PIN: &str = "1234";

/// Starts a context on a reader holding `card` and returns a handle to the
/// reader.
pub fn context_with(card: VirtualCard) -> (EidContext, VirtualReader) {
    context_with_config(card, Config::default())
}

pub fn context_with_config(card: VirtualCard, config: Config) -> (EidContext, VirtualReader) {
    let reader = VirtualReader::with_card(READER, card);
    let handle = reader.clone();
    let context = EidContext::with_config(API_VERSION, reader, config).unwrap();
    (context, handle)
}

fn params(name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(vec![]).unwrap();
    params
        .distinguished_name
        .push(DnType::CommonName, name.to_string());
    params
}

/// A CA and a signer certificate issued by it.
pub struct Pki {
    pub ca_der: Vec<u8>,
    pub signer_der: Vec<u8>,
    signer_key: SigningKey,
}

impl Pki {
    pub fn new(ca_name: &str) -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = params(ca_name);
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let signer_key = KeyPair::generate().unwrap();
        let signer = params(&format!("{ca_name} Signer"))
            .signed_by(&signer_key, &ca, &ca_key)
            .unwrap();

        Self {
            ca_der: ca.der().to_vec(),
            signer_der: signer.der().to_vec(),
            signer_key: SigningKey::from_pkcs8_der(&signer_key.serialize_der()).unwrap(),
        }
    }

    /// DER ECDSA signature over `data`.
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let signature: p256::ecdsa::Signature = self.signer_key.sign(data);
        signature.to_der().as_bytes().to_vec()
    }

    pub fn ca(&self) -> CertificateRef {
        CertificateRef::from_der(CertificateRole::IntermediateCa, &self.ca_der).unwrap()
    }

    /// An identity signature file over `covered`.
    pub fn signature_file(&self, covered: &[u8]) -> Vec<u8> {
        let signature = self.sign(covered);
        tlv::encode(&[(1, signature.as_slice()), (2, self.signer_der.as_slice())]).unwrap()
    }
}

pub fn document_body() -> Vec<u8> {
    tlv::encode(&[
        (1546, &b"012345678"[..]),
        (1547, &b"ID"[..]),
        (1548, &b"0012345678"[..]),
        (1549, &b"01.02.2020"[..]),
        (1550, &b"01.02.2030"[..]),
        (1551, &b"PU BEOGRAD"[..]),
    ])
    .unwrap()
}

pub fn fixed_personal_body() -> Vec<u8> {
    tlv::encode(&[
        (1558, &b"0101990710123"[..]),
        (1559, "PETROVIĆ".as_bytes()),
        (1560, &b"MARKO"[..]),
        (1561, &b"JOVAN"[..]),
        (1562, &b"M"[..]),
        (1563, &b"BEOGRAD"[..]),
        (1564, "VRAČAR".as_bytes()),
        (1565, &b"SRB"[..]),
        (1566, &b"01.01.1990"[..]),
    ])
    .unwrap()
}

pub fn variable_personal_body() -> Vec<u8> {
    tlv::encode(&[
        (1568, &b"SRB"[..]),
        (1569, &b"BEOGRAD"[..]),
        (1570, &b"BEOGRAD"[..]),
        (1571, &b"KNEZA MILOSA"[..]),
        (1572, &b"10"[..]),
        (1575, &b"3"[..]),
        (1578, &b"12"[..]),
        (1580, &b"15.03.2021"[..]),
    ])
    .unwrap()
}

pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0xFF, 0xD9];

pub fn portrait_body() -> Vec<u8> {
    let mut body = vec![0x00, 0x00, 0x00, 0x00];
    body.extend_from_slice(JPEG);
    body
}

/// An identity card with data files and the certificate files, but no
/// signatures.
pub fn id_card(family: CardFamily, pki: &Pki) -> VirtualCard {
    let mut card = VirtualCard::identity(family)
        .with_file(DOCUMENT, &document_body())
        .unwrap()
        .with_file(FIXED_PERSONAL, &fixed_personal_body())
        .unwrap()
        .with_file(VARIABLE_PERSONAL, &variable_personal_body())
        .unwrap()
        .with_file(PORTRAIT, &portrait_body())
        .unwrap()
        .with_file(INTERMEDIATE_CA, &pki.ca_der)
        .unwrap()
        .with_file(USER_1, &pki.signer_der)
        .unwrap()
        .with_pin(PIN, 3)
        .unwrap();
    if family != CardFamily::IdCard2008 {
        card = card.with_file(USER_2, &pki.signer_der).unwrap();
    }
    card
}

/// An identity card whose signature files follow the default layout:
/// separate portrait signature on ID 2008, folded everywhere else.
pub fn signed_id_card(family: CardFamily, pki: &Pki) -> VirtualCard {
    let mut fixed_covered = fixed_personal_body();
    let card = id_card(family, pki)
        .with_file(CARD_SIGNATURE, &pki.signature_file(&document_body()))
        .unwrap()
        .with_file(
            VARIABLE_SIGNATURE,
            &pki.signature_file(&variable_personal_body()),
        )
        .unwrap();

    if family == CardFamily::IdCard2008 {
        card.with_file(FIXED_SIGNATURE, &pki.signature_file(&fixed_covered))
            .unwrap()
            .with_file(PORTRAIT_SIGNATURE, &pki.signature_file(&portrait_body()))
            .unwrap()
    } else {
        fixed_covered.extend(portrait_body());
        card.with_file(FIXED_SIGNATURE, &pki.signature_file(&fixed_covered))
            .unwrap()
    }
}

/// Data blocks of a vehicle registration card. Block 4 is unsigned.
pub fn vehicle_blocks() -> [Vec<u8>; 4] {
    let block_1 = Ber::constructed(
        0x71,
        vec![
            Ber::primitive(0x81, b"BG1234AB".to_vec()),
            Ber::primitive(0x82, b"20190514".to_vec()),
            Ber::primitive(0x8A, b"ZFA19900000123456".to_vec()),
            Ber::primitive(0x8D, b"20260514".to_vec()),
            Ber::primitive(0x8E, b"20250514".to_vec()),
            Ber::constructed(
                0xA3,
                vec![
                    Ber::primitive(0x87, b"FIAT".to_vec()),
                    Ber::primitive(0x88, b"199".to_vec()),
                    Ber::primitive(0x89, b"PUNTO".to_vec()),
                ],
            ),
            Ber::constructed(0xA5, vec![Ber::primitive(0x90, b"1242".to_vec())]),
            Ber::primitive(0xC9, b"000123456".to_vec()),
            Ber::primitive(0x9F33, b"RS".to_vec()),
            Ber::primitive(0x9F35, b"MUP RS".to_vec()),
        ],
    );
    let block_2 = Ber::constructed(
        0x72,
        vec![
            Ber::primitive(0x98, b"M1".to_vec()),
            Ber::primitive(0xC5, b"2008".to_vec()),
            Ber::primitive(0x9F24, b"CRNA".to_vec()),
            Ber::primitive(0xC2, b"0101990710123".to_vec()),
        ],
    );
    let block_3 = Ber::constructed(
        0x72,
        vec![Ber::constructed(
            0xA1,
            vec![
                Ber::constructed(
                    0xA2,
                    vec![
                        Ber::primitive(0x83, b"PETROVIC".to_vec()),
                        Ber::primitive(0x84, b"MARKO".to_vec()),
                        Ber::primitive(0x85, b"BEOGRAD, KNEZA MILOSA 10".to_vec()),
                    ],
                ),
                Ber::constructed(
                    0xA9,
                    vec![
                        Ber::primitive(0x83, b"JOVANOVIC".to_vec()),
                        Ber::primitive(0x84, b"ANA".to_vec()),
                    ],
                ),
            ],
        )],
    );
    let block_4 = Ber::constructed(0x73, vec![Ber::primitive(0x80, b"unsigned".to_vec())]);

    [
        block_1.to_bytes(),
        block_2.to_bytes(),
        block_3.to_bytes(),
        block_4.to_bytes(),
    ]
}

/// A vehicle registration card with signed blocks 1 to 3.
pub fn vehicle_card(pki: &Pki) -> VirtualCard {
    let mut card = VirtualCard::vehicle();
    for (index, data) in (1u8..).zip(vehicle_blocks()) {
        let low = (index << 4) | 0x01;
        card = card.with_file([0xD0, low], &data).unwrap();
        if index <= 3 {
            let signature = Ber::primitive(0x04, pki.sign(&data)).to_bytes();
            card = card
                .with_file([0xE0, low], &signature)
                .unwrap()
                .with_file([0xC0, low], &pki.signer_der)
                .unwrap();
        }
    }
    card
}

pub const MEDICAL_DOCUMENT: [u8; 2] = [0x0D, 0x01];
pub const MEDICAL_FIXED_PERSONAL: [u8; 2] = [0x0D, 0x02];
pub const MEDICAL_VARIABLE_PERSONAL: [u8; 2] = [0x0D, 0x03];
pub const MEDICAL_VARIABLE_ADMIN: [u8; 2] = [0x0D, 0x04];

pub const INSURER: &str = "Републички фонд за здравствено осигурање";

pub fn utf16_le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

pub fn medical_document_body(insurer: &str) -> Vec<u8> {
    tlv::encode(&[
        (1553, utf16_le(insurer).as_slice()),
        (1554, &b"10000"[..]),
        (1555, &b"00012345678"[..]),
        (1557, &b"20230301"[..]),
        (1558, &b"20330301"[..]),
    ])
    .unwrap()
}

/// Health insurance files on top of `card`, which must frame them the
/// health insurance way.
pub fn with_medical_files(card: VirtualCard, insurer: &str) -> VirtualCard {
    let fixed = tlv::encode(&[
        (1569, &b"12345678901"[..]),
        (1570, utf16_le("ПЕТРОВИЋ").as_slice()),
        (1571, &b"P\0E\0T\0R\0O\0V\0I\0\x06\x01"[..]),
        (1572, utf16_le("МАРКО").as_slice()),
        (1574, &b"19900101"[..]),
    ])
    .unwrap();
    let variable = tlv::encode(&[(1586, &b"20251231"[..]), (1587, &b"0"[..])]).unwrap();
    let admin = tlv::encode(&[
        (1603, &b"01"[..]),
        (1604, &b"0101990710123"[..]),
        (1605, utf16_le("КНЕЗА МИЛОША").as_slice()),
        (1608, utf16_le("БЕОГРАД").as_slice()),
        (1626, utf16_le("Србија").as_slice()),
        (1617, &b"1"[..]),
        (1632, &b"100200300"[..]),
    ])
    .unwrap();

    card.with_file(MEDICAL_DOCUMENT, &medical_document_body(insurer))
        .unwrap()
        .with_file(MEDICAL_FIXED_PERSONAL, &fixed)
        .unwrap()
        .with_file(MEDICAL_VARIABLE_PERSONAL, &variable)
        .unwrap()
        .with_file(MEDICAL_VARIABLE_ADMIN, &admin)
        .unwrap()
}

pub fn medical_card() -> VirtualCard {
    with_medical_files(VirtualCard::medical(), INSURER)
}
