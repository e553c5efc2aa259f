//! Card families and their detection.
//!
//! A card is classified by its answer-to-reset (ATR) first. Several document
//! generations share an ATR, so the final decision is made by probing which
//! document application the card lets us select.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::channel::{CardChannel, FileLayout};
use super::tlv::{self, TlvMap};
use crate::error::{Error, Result};
use crate::reader::files;

/// Insurer named on every health insurance card.
const MEDICAL_INSURER: &str = "Републички фонд за здравствено осигурање";

/// Tag of the insurer name in the health insurance document file.
const MEDICAL_INSURER_TAG: u16 = 1553;

/// A generation or class of document with its own record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum CardFamily {
    /// Identity card issued from 2008 (Apollo chip).
    #[serde(rename = "id_card_2008")]
    IdCard2008,
    /// Identity card issued from 2014 (Gemalto chip).
    #[serde(rename = "id_card_2014")]
    IdCard2014,
    /// Identity card for foreigners, issued from 2020.
    #[serde(rename = "foreigner_id_2020")]
    ForeignerId2020,
    /// Residence permit, issued from 2024.
    #[serde(rename = "residence_permit_2024")]
    ResidencePermit2024,
    /// Vehicle registration certificate.
    VehicleRegistration,
    /// Public health insurance card.
    MedicalInsurance,
}

impl CardFamily {
    /// Returns the numeric card type of the public API.
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::IdCard2008 => 1,
            Self::IdCard2014 => 2,
            Self::ForeignerId2020 => 3,
            Self::ResidencePermit2024 => 4,
            Self::VehicleRegistration => 5,
            Self::MedicalInsurance => 6,
        }
    }

    /// Looks up a family by its numeric card type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for unknown ids.
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            1 => Ok(Self::IdCard2008),
            2 => Ok(Self::IdCard2014),
            3 => Ok(Self::ForeignerId2020),
            4 => Ok(Self::ResidencePermit2024),
            5 => Ok(Self::VehicleRegistration),
            6 => Ok(Self::MedicalInsurance),
            other => Err(Error::InvalidParameter(format!("unknown card type {other}"))),
        }
    }

    /// Returns `true` for the identity-document families.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        matches!(
            self,
            Self::IdCard2008 | Self::IdCard2014 | Self::ForeignerId2020 | Self::ResidencePermit2024
        )
    }

    /// Returns `true` for vehicle registration cards.
    #[must_use]
    pub const fn is_vehicle(self) -> bool {
        matches!(self, Self::VehicleRegistration)
    }

    /// Returns the document application selected on Gemalto-based cards.
    #[must_use]
    pub const fn application_id(self) -> Option<&'static [u8]> {
        match self {
            Self::IdCard2014 => Some(&aid::SERID),
            Self::ForeignerId2020 => Some(&aid::SERIF),
            Self::ResidencePermit2024 => Some(&aid::SERRP),
            Self::MedicalInsurance => Some(&aid::SERVSZK),
            Self::IdCard2008 | Self::VehicleRegistration => None,
        }
    }
}

impl fmt::Display for CardFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdCard2008 => "ID card (2008)",
            Self::IdCard2014 => "ID card (2014)",
            Self::ForeignerId2020 => "foreigner ID card (2020)",
            Self::ResidencePermit2024 => "residence permit (2024)",
            Self::VehicleRegistration => "vehicle registration",
            Self::MedicalInsurance => "health insurance card",
        };
        f.write_str(name)
    }
}

/// Application identifiers.
pub(crate) mod aid {
    /// Serbian identity card application.
    pub(crate) const SERID: [u8; 11] = [
        0xF3, 0x81, 0x00, 0x00, 0x02, 0x53, 0x45, 0x52, 0x49, 0x44, 0x01,
    ];

    /// Foreigner identity card application.
    pub(crate) const SERIF: [u8; 11] = [
        0xF3, 0x81, 0x00, 0x00, 0x02, 0x53, 0x45, 0x52, 0x49, 0x46, 0x01,
    ];

    /// Residence permit application.
    pub(crate) const SERRP: [u8; 11] = [
        0xF3, 0x81, 0x00, 0x00, 0x02, 0x53, 0x45, 0x52, 0x52, 0x50, 0x01,
    ];

    /// Health insurance card application.
    pub(crate) const SERVSZK: [u8; 13] = [
        0xF3, 0x81, 0x00, 0x00, 0x02, 0x53, 0x45, 0x52, 0x56, 0x53, 0x5A, 0x4B, 0x01,
    ];

    /// PKCS#15 application holding the PIN.
    pub(crate) const PKCS15: [u8; 12] = [
        0xA0, 0x00, 0x00, 0x00, 0x63, 0x50, 0x4B, 0x43, 0x53, 0x2D, 0x31, 0x35,
    ];

    /// Vehicle card application triplets, tried in order. Only the first
    /// selection of a triplet has to succeed.
    pub(crate) const VEHICLE: [[&[u8]; 3]; 3] = [
        [
            &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00],
            &[
                0xA0, 0x00, 0x00, 0x00, 0x77, 0x01, 0x08, 0x00, 0x07, 0x00, 0x00, 0xFE, 0x00,
                0x00, 0x01, 0x00,
            ],
            &[
                0xA0, 0x00, 0x00, 0x00, 0x77, 0x01, 0x08, 0x00, 0x07, 0x00, 0x00, 0xFE, 0x00,
                0x00, 0xAD, 0xF2,
            ],
        ],
        [
            &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00],
            &[
                0xF3, 0x81, 0x00, 0x00, 0x02, 0x53, 0x45, 0x52, 0x56, 0x4C, 0x04, 0x02, 0x01,
            ],
            &[
                0xA0, 0x00, 0x00, 0x00, 0x77, 0x01, 0x08, 0x00, 0x07, 0x00, 0x00, 0xFE, 0x00,
                0x00, 0xAD, 0xF2,
            ],
        ],
        [
            &[0xA0, 0x00, 0x00, 0x00, 0x18, 0x43, 0x4D, 0x00],
            &[
                0xA0, 0x00, 0x00, 0x00, 0x18, 0x34, 0x14, 0x01, 0x00, 0x65, 0x56, 0x4C, 0x2D,
                0x30, 0x30, 0x31,
            ],
            &[
                0xA0, 0x00, 0x00, 0x00, 0x18, 0x65, 0x56, 0x4C, 0x2D, 0x30, 0x30, 0x31,
            ],
        ],
    ];
}

/// Known answer-to-reset values.
pub mod atr {
    /// Apollo chip, identity cards from 2008.
    pub const APOLLO: [u8; 18] = [
        0x3B, 0xB9, 0x18, 0x00, 0x81, 0x31, 0xFE, 0x9E, 0x80, 0x73, 0xFF, 0x61, 0x40, 0x83, 0x00,
        0x00, 0x00, 0xDF,
    ];

    /// First Gemalto chip. Also used by some vehicle cards.
    pub const GEMALTO_1: [u8; 25] = [
        0x3B, 0xFF, 0x94, 0x00, 0x00, 0x81, 0x31, 0x80, 0x43, 0x80, 0x31, 0x80, 0x65, 0xB0, 0x85,
        0x02, 0x01, 0xF3, 0x12, 0x0F, 0xFF, 0x82, 0x90, 0x00, 0x79,
    ];

    /// Gemalto chip from 2023. Also used by health insurance cards.
    pub const GEMALTO_2: [u8; 19] = [
        0x3B, 0xF9, 0x96, 0x00, 0x00, 0x80, 0x31, 0xFE, 0x45, 0x53, 0x43, 0x45, 0x37, 0x20, 0x47,
        0x43, 0x4E, 0x33, 0x5E,
    ];

    /// Gemalto chip from mid 2023.
    pub const GEMALTO_3: [u8; 22] = [
        0x3B, 0x9E, 0x96, 0x80, 0x31, 0xFE, 0x45, 0x53, 0x43, 0x45, 0x20, 0x38, 0x2E, 0x30, 0x2D,
        0x43, 0x31, 0x56, 0x30, 0x0D, 0x0A, 0x6F,
    ];

    /// Gemalto chip from 2024.
    pub const GEMALTO_4: [u8; 22] = [
        0x3B, 0x9E, 0x96, 0x80, 0x31, 0xFE, 0x45, 0x53, 0x43, 0x45, 0x20, 0x38, 0x2E, 0x30, 0x2D,
        0x43, 0x32, 0x56, 0x30, 0x0D, 0x0A, 0x6C,
    ];

    /// First health insurance chip.
    pub const MEDICAL_1: [u8; 14] = [
        0x3B, 0xF4, 0x13, 0x00, 0x00, 0x81, 0x31, 0xFE, 0x45, 0x52, 0x46, 0x5A, 0x4F, 0xED,
    ];

    /// Health insurance chip from 2023.
    pub const MEDICAL_2: [u8; 22] = [
        0x3B, 0x9E, 0x97, 0x80, 0x31, 0xFE, 0x45, 0x53, 0x43, 0x45, 0x20, 0x38, 0x2E, 0x30, 0x2D,
        0x43, 0x31, 0x56, 0x30, 0x0D, 0x0A, 0x6E,
    ];

    /// Older vehicle registration chip.
    pub const VEHICLE_0: [u8; 22] = [
        0x3B, 0xDB, 0x96, 0x00, 0x80, 0xB1, 0xFE, 0x45, 0x1F, 0x83, 0x00, 0x31, 0xC0, 0x64, 0x1A,
        0x18, 0x01, 0x00, 0x0F, 0x90, 0x00, 0x52,
    ];

    /// Current vehicle registration chip.
    pub const VEHICLE_2: [u8; 21] = [
        0x3B, 0x9D, 0x13, 0x81, 0x31, 0x60, 0x37, 0x80, 0x31, 0xC0, 0x69, 0x4D, 0x54, 0x43, 0x4F,
        0x53, 0x73, 0x02, 0x02, 0x04, 0x40,
    ];
}

/// The chip platform implied by an ATR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    Apollo,
    Gemalto {
        shared_with_vehicle: bool,
        shared_with_medical: bool,
    },
    Medical,
    Vehicle,
}

impl Platform {
    fn from_atr(bytes: &[u8]) -> Option<Self> {
        if bytes == atr::APOLLO {
            Some(Self::Apollo)
        } else if bytes == atr::GEMALTO_1 {
            Some(Self::Gemalto {
                shared_with_vehicle: true,
                shared_with_medical: false,
            })
        } else if bytes == atr::GEMALTO_2 {
            Some(Self::Gemalto {
                shared_with_vehicle: false,
                shared_with_medical: true,
            })
        } else if bytes == atr::GEMALTO_3 || bytes == atr::GEMALTO_4 {
            Some(Self::Gemalto {
                shared_with_vehicle: false,
                shared_with_medical: false,
            })
        } else if bytes == atr::MEDICAL_1 || bytes == atr::MEDICAL_2 {
            Some(Self::Medical)
        } else if bytes == atr::VEHICLE_0 || bytes == atr::VEHICLE_2 {
            Some(Self::Vehicle)
        } else {
            None
        }
    }
}

/// The outcome of card detection at session open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedCard {
    family: CardFamily,
    #[serde(serialize_with = "serialize_hex")]
    atr: Vec<u8>,
}

fn serialize_hex<S: serde::Serializer>(
    bytes: &[u8],
    serializer: S,
) -> core::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode_upper(bytes))
}

impl DetectedCard {
    /// Returns the detected family.
    #[must_use]
    pub const fn family(&self) -> CardFamily {
        self.family
    }

    /// Returns the answer-to-reset.
    #[must_use]
    pub fn atr(&self) -> &[u8] {
        &self.atr
    }
}

/// Detects the family of the card behind `channel` and leaves its document
/// application selected.
///
/// # Errors
///
/// - [`Error::CardUnknown`] if the ATR is unknown or no application answers
/// - transport errors from the channel
pub(crate) fn detect(channel: &mut CardChannel<'_>, answer: &[u8]) -> Result<DetectedCard> {
    let unknown = || Error::CardUnknown {
        atr: hex::encode_upper(answer),
    };
    let platform = Platform::from_atr(answer).ok_or_else(unknown)?;
    debug!(?platform, "classified ATR");

    let family = match platform {
        Platform::Apollo => CardFamily::IdCard2008,
        Platform::Gemalto {
            shared_with_vehicle,
            shared_with_medical,
        } => {
            if shared_with_medical && holds_medical_application(channel)? {
                CardFamily::MedicalInsurance
            } else if let Some(family) = find_identity_application(channel)? {
                family
            } else if shared_with_vehicle && select_vehicle_application(channel)? {
                CardFamily::VehicleRegistration
            } else {
                return Err(unknown());
            }
        }
        Platform::Medical => {
            if !channel.select_application(&aid::SERVSZK, 0x00)? {
                return Err(unknown());
            }
            CardFamily::MedicalInsurance
        }
        Platform::Vehicle => {
            if !select_vehicle_application(channel)? {
                return Err(unknown());
            }
            CardFamily::VehicleRegistration
        }
    };

    Ok(DetectedCard {
        family,
        atr: answer.to_vec(),
    })
}

/// Selects the document application of an already detected `family`, as
/// needed after every reconnect.
///
/// # Errors
///
/// Returns [`Error::SessionOpenFailed`] if the card refuses the selection.
pub(crate) fn select_application(channel: &mut CardChannel<'_>, family: CardFamily) -> Result<()> {
    let selected = match family {
        CardFamily::IdCard2008 => true,
        CardFamily::VehicleRegistration => select_vehicle_application(channel)?,
        other => match other.application_id() {
            Some(aid) => channel.select_application(aid, 0x00)?,
            None => false,
        },
    };
    if selected {
        Ok(())
    } else {
        Err(Error::SessionOpenFailed(format!(
            "{family} application could not be selected"
        )))
    }
}

fn find_identity_application(channel: &mut CardChannel<'_>) -> Result<Option<CardFamily>> {
    for family in [
        CardFamily::IdCard2014,
        CardFamily::ForeignerId2020,
        CardFamily::ResidencePermit2024,
    ] {
        if let Some(aid) = family.application_id()
            && channel.select_application(aid, 0x00)?
        {
            return Ok(Some(family));
        }
    }
    Ok(None)
}

/// Checks for a health insurance card by its application and the insurer
/// named in its document file.
fn holds_medical_application(channel: &mut CardChannel<'_>) -> Result<bool> {
    if !channel.select_application(&aid::SERVSZK, 0x00)? {
        return Ok(false);
    }
    let body = match channel.read_file(FileLayout::Medical, files::MEDICAL_DOCUMENT) {
        Ok(body) => body,
        Err(err) if err.invalidates_session() => return Err(err),
        Err(err) => {
            debug!(error = %err, "health insurance check failed");
            return Ok(false);
        }
    };
    let insurer = TlvMap::parse(&body)
        .ok()
        .and_then(|map| map.get(MEDICAL_INSURER_TAG).and_then(tlv::decode_utf16));
    Ok(insurer.as_deref() == Some(MEDICAL_INSURER))
}

fn select_vehicle_application(channel: &mut CardChannel<'_>) -> Result<bool> {
    for [first, second, third] in aid::VEHICLE {
        if channel.select_application(first, 0x00)? {
            channel.select_application(second, 0x00)?;
            channel.select_application(third, 0x0C)?;
            return Ok(true);
        }
    }
    Ok(false)
}
