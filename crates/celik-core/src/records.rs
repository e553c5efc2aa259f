//! Document records.
//!
//! Each record is a plain collection of [`Field`]s with the capacities of the
//! public card API. Records are produced fresh by every read and are never
//! updated in place.

use serde::Serialize;

use crate::card::ber::Ber;
use crate::card::tlv::{self, TlvMap};
use crate::card::CardFamily;
use crate::certificate::CertificateRef;
use crate::error::Result;
use crate::field::Field;

/// Portrait capacity in bytes.
pub const PORTRAIT_CAPACITY: usize = 7700;

/// Registration data capacity in bytes.
pub const REGISTRATION_DATA_CAPACITY: usize = 4096;

/// Registration signature capacity in bytes.
pub const REGISTRATION_SIGNATURE_CAPACITY: usize = 1024;

/// Issuing authority certificate capacity in bytes.
pub const ISSUING_AUTHORITY_CAPACITY: usize = 4096;

fn tlv<const N: usize>(map: &TlvMap<'_>, tag: u16, name: &'static str) -> Result<Field<N>> {
    Field::from_slice(name, map.get_or_empty(tag))
}

fn utf16<const N: usize>(map: &TlvMap<'_>, tag: u16, name: &'static str) -> Result<Field<N>> {
    let text = map.get(tag).and_then(tlv::decode_utf16).unwrap_or_default();
    Field::from_slice(name, text.as_bytes())
}

fn flag(map: &TlvMap<'_>, tag: u16) -> bool {
    map.get(tag) == Some(&b"1"[..])
}

fn ber<const N: usize>(tree: &Ber, path: &[u32], name: &'static str) -> Result<Field<N>> {
    Field::from_slice(name, tree.access(path).unwrap_or_default())
}

/// Identity document data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentData {
    /// Document registration number.
    pub doc_reg_no: Field<9>,
    /// Document type code.
    pub document_type: Field<2>,
    /// Date of issue.
    pub issuing_date: Field<10>,
    /// Date of expiry.
    pub expiry_date: Field<10>,
    /// Issuing authority.
    pub issuing_authority: Field<100>,
    /// Document serial number.
    pub document_serial_number: Field<10>,
    /// Chip serial number.
    pub chip_serial_number: Field<14>,
    /// Document name.
    pub document_name: Field<100>,
}

impl DocumentData {
    pub(crate) fn from_tlv(map: &TlvMap<'_>) -> Result<Self> {
        Ok(Self {
            doc_reg_no: tlv(map, 1546, "doc_reg_no")?,
            document_type: tlv(map, 1547, "document_type")?,
            document_serial_number: tlv(map, 1548, "document_serial_number")?,
            issuing_date: tlv(map, 1549, "issuing_date")?,
            expiry_date: tlv(map, 1550, "expiry_date")?,
            issuing_authority: tlv(map, 1551, "issuing_authority")?,
            chip_serial_number: tlv(map, 1552, "chip_serial_number")?,
            document_name: tlv(map, 1553, "document_name")?,
        })
    }
}

/// Personal data that never changes over the life of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixedPersonalData {
    /// Unique personal number.
    pub personal_number: Field<13>,
    /// Surname.
    pub surname: Field<200>,
    /// Given name.
    pub given_name: Field<200>,
    /// Given name of a parent.
    pub parent_given_name: Field<200>,
    /// Sex.
    pub sex: Field<2>,
    /// Place of birth.
    pub place_of_birth: Field<200>,
    /// State of birth.
    pub state_of_birth: Field<200>,
    /// Date of birth.
    pub date_of_birth: Field<10>,
    /// Community of birth.
    pub community_of_birth: Field<200>,
    /// Status of a foreigner (foreigner cards and permits).
    pub status_of_foreigner: Field<200>,
    /// Nationality (foreigner cards and permits).
    pub nationality_full: Field<200>,
    /// Purpose of stay (residence permits).
    pub purpose_of_stay: Field<200>,
    /// Additional note.
    pub e_note: Field<200>,
}

impl FixedPersonalData {
    pub(crate) fn from_tlv(map: &TlvMap<'_>) -> Result<Self> {
        Ok(Self {
            personal_number: tlv(map, 1558, "personal_number")?,
            surname: tlv(map, 1559, "surname")?,
            given_name: tlv(map, 1560, "given_name")?,
            parent_given_name: tlv(map, 1561, "parent_given_name")?,
            sex: tlv(map, 1562, "sex")?,
            place_of_birth: tlv(map, 1563, "place_of_birth")?,
            community_of_birth: tlv(map, 1564, "community_of_birth")?,
            state_of_birth: tlv(map, 1565, "state_of_birth")?,
            date_of_birth: tlv(map, 1566, "date_of_birth")?,
            status_of_foreigner: tlv(map, 1567, "status_of_foreigner")?,
            nationality_full: tlv(map, 1583, "nationality_full")?,
            purpose_of_stay: tlv(map, 1584, "purpose_of_stay")?,
            e_note: tlv(map, 1585, "e_note")?,
        })
    }
}

/// Residence data, updated on the card when the holder moves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariablePersonalData {
    /// State.
    pub state: Field<100>,
    /// Community.
    pub community: Field<200>,
    /// Place.
    pub place: Field<200>,
    /// Street.
    pub street: Field<200>,
    /// House number.
    pub house_number: Field<20>,
    /// House letter.
    pub house_letter: Field<8>,
    /// Entrance.
    pub entrance: Field<10>,
    /// Floor.
    pub floor: Field<6>,
    /// Apartment number.
    pub apartment_number: Field<12>,
    /// Date the address was registered.
    pub address_date: Field<10>,
    /// Address label.
    pub address_label: Field<60>,
}

impl VariablePersonalData {
    pub(crate) fn from_tlv(map: &TlvMap<'_>) -> Result<Self> {
        Ok(Self {
            state: tlv(map, 1568, "state")?,
            community: tlv(map, 1569, "community")?,
            place: tlv(map, 1570, "place")?,
            street: tlv(map, 1571, "street")?,
            house_number: tlv(map, 1572, "house_number")?,
            house_letter: tlv(map, 1573, "house_letter")?,
            entrance: tlv(map, 1574, "entrance")?,
            floor: tlv(map, 1575, "floor")?,
            apartment_number: tlv(map, 1578, "apartment_number")?,
            address_date: tlv(map, 1580, "address_date")?,
            address_label: tlv(map, 1576, "address_label")?,
        })
    }
}

/// The holder's photograph, JPEG encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Portrait {
    /// Image bytes.
    pub portrait: Field<PORTRAIT_CAPACITY>,
}

/// One block of vehicle registration data with the material to verify it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationData {
    /// Block index, `1..=4`.
    pub index: u8,
    /// The BER-encoded data object.
    pub registration_data: Field<REGISTRATION_DATA_CAPACITY>,
    /// Signature over `registration_data` (empty for block 4).
    pub signature_data: Field<REGISTRATION_SIGNATURE_CAPACITY>,
    /// DER certificate of the signing authority (empty for block 4).
    pub issuing_authority: Field<ISSUING_AUTHORITY_CAPACITY>,
}

impl RegistrationData {
    /// Returns `true` if this block carries a signature.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.signature_data.is_empty()
    }
}

/// Document data of a vehicle registration certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VehicleDocumentData {
    /// Issuing state.
    pub state_issuing: Field<50>,
    /// Competent authority.
    pub competent_authority: Field<50>,
    /// Issuing authority.
    pub authority_issuing: Field<50>,
    /// Unambiguous document number.
    pub unambiguous_number: Field<30>,
    /// Date of issue.
    pub issuing_date: Field<16>,
    /// Date of expiry.
    pub expiry_date: Field<16>,
    /// Serial number.
    pub serial_number: Field<20>,
}

impl VehicleDocumentData {
    pub(crate) fn from_tree(tree: &Ber) -> Result<Self> {
        Ok(Self {
            state_issuing: ber(tree, &[0x71, 0x9F33], "state_issuing")?,
            competent_authority: ber(tree, &[0x71, 0x9F35], "competent_authority")?,
            authority_issuing: ber(tree, &[0x71, 0x9F36], "authority_issuing")?,
            unambiguous_number: ber(tree, &[0x71, 0x9F38], "unambiguous_number")?,
            issuing_date: ber(tree, &[0x71, 0x8E], "issuing_date")?,
            expiry_date: ber(tree, &[0x71, 0x8D], "expiry_date")?,
            serial_number: ber(tree, &[0x71, 0xC9], "serial_number")?,
        })
    }
}

/// Technical data of the vehicle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VehicleData {
    /// Date of first registration.
    pub date_of_first_registration: Field<16>,
    /// Year of production.
    pub year_of_production: Field<5>,
    /// Make.
    pub vehicle_make: Field<100>,
    /// Type.
    pub vehicle_type: Field<100>,
    /// Commercial description.
    pub commercial_description: Field<100>,
    /// Vehicle identification number.
    pub vehicle_id_number: Field<100>,
    /// Registration number.
    pub registration_number_of_vehicle: Field<20>,
    /// Maximum net power.
    pub maximum_net_power: Field<20>,
    /// Engine capacity.
    pub engine_capacity: Field<20>,
    /// Type of fuel.
    pub type_of_fuel: Field<100>,
    /// Power to weight ratio.
    pub power_weight_ratio: Field<20>,
    /// Mass.
    pub vehicle_mass: Field<20>,
    /// Maximum permissible laden mass.
    pub maximum_permissible_laden_mass: Field<20>,
    /// Type approval number.
    pub type_approval_number: Field<50>,
    /// Number of seats.
    pub number_of_seats: Field<20>,
    /// Number of standing places.
    pub number_of_standing_places: Field<20>,
    /// Engine identification number.
    pub engine_id_number: Field<100>,
    /// Number of axles.
    pub number_of_axles: Field<20>,
    /// Category.
    pub vehicle_category: Field<50>,
    /// Colour.
    pub colour_of_vehicle: Field<50>,
    /// Restriction on changing the owner.
    pub restriction_to_change_owner: Field<200>,
    /// Load.
    pub vehicle_load: Field<20>,
}

impl VehicleData {
    pub(crate) fn from_tree(tree: &Ber) -> Result<Self> {
        Ok(Self {
            date_of_first_registration: ber(tree, &[0x71, 0x82], "date_of_first_registration")?,
            year_of_production: ber(tree, &[0x72, 0xC5], "year_of_production")?,
            vehicle_make: ber(tree, &[0x71, 0xA3, 0x87], "vehicle_make")?,
            vehicle_type: ber(tree, &[0x71, 0xA3, 0x88], "vehicle_type")?,
            commercial_description: ber(tree, &[0x71, 0xA3, 0x89], "commercial_description")?,
            vehicle_id_number: ber(tree, &[0x71, 0x8A], "vehicle_id_number")?,
            registration_number_of_vehicle: ber(
                tree,
                &[0x71, 0x81],
                "registration_number_of_vehicle",
            )?,
            maximum_net_power: ber(tree, &[0x71, 0xA5, 0x91], "maximum_net_power")?,
            engine_capacity: ber(tree, &[0x71, 0xA5, 0x90], "engine_capacity")?,
            type_of_fuel: ber(tree, &[0x71, 0xA5, 0x92], "type_of_fuel")?,
            power_weight_ratio: ber(tree, &[0x71, 0x93], "power_weight_ratio")?,
            vehicle_mass: ber(tree, &[0x71, 0x8C], "vehicle_mass")?,
            maximum_permissible_laden_mass: ber(
                tree,
                &[0x71, 0xA4, 0x8B],
                "maximum_permissible_laden_mass",
            )?,
            type_approval_number: ber(tree, &[0x71, 0x8F], "type_approval_number")?,
            number_of_seats: ber(tree, &[0x71, 0xA6, 0x94], "number_of_seats")?,
            number_of_standing_places: ber(
                tree,
                &[0x71, 0xA6, 0x95],
                "number_of_standing_places",
            )?,
            engine_id_number: ber(tree, &[0x72, 0xA5, 0x9E], "engine_id_number")?,
            number_of_axles: ber(tree, &[0x72, 0x99], "number_of_axles")?,
            vehicle_category: ber(tree, &[0x72, 0x98], "vehicle_category")?,
            colour_of_vehicle: ber(tree, &[0x72, 0x9F24], "colour_of_vehicle")?,
            restriction_to_change_owner: ber(tree, &[0x72, 0xC1], "restriction_to_change_owner")?,
            vehicle_load: ber(tree, &[0x72, 0xC4], "vehicle_load")?,
        })
    }
}

/// Owner and user of the vehicle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonalData {
    /// Owner's personal number.
    pub owners_personal_no: Field<20>,
    /// Owner's surname or business name.
    pub owners_surname_or_business_name: Field<100>,
    /// Owner's name.
    pub owner_name: Field<100>,
    /// Owner's address.
    pub owner_address: Field<200>,
    /// User's personal number.
    pub users_personal_no: Field<20>,
    /// User's surname or business name.
    pub users_surname_or_business_name: Field<100>,
    /// User's name.
    pub users_name: Field<100>,
    /// User's address.
    pub users_address: Field<200>,
}

impl PersonalData {
    pub(crate) fn from_tree(tree: &Ber) -> Result<Self> {
        Ok(Self {
            owners_personal_no: ber(tree, &[0x72, 0xC2], "owners_personal_no")?,
            owners_surname_or_business_name: ber(
                tree,
                &[0x72, 0xA1, 0xA2, 0x83],
                "owners_surname_or_business_name",
            )?,
            owner_name: ber(tree, &[0x72, 0xA1, 0xA2, 0x84], "owner_name")?,
            owner_address: ber(tree, &[0x72, 0xA1, 0xA2, 0x85], "owner_address")?,
            users_personal_no: ber(tree, &[0x72, 0xC3], "users_personal_no")?,
            users_surname_or_business_name: ber(
                tree,
                &[0x72, 0xA1, 0xA9, 0x83],
                "users_surname_or_business_name",
            )?,
            users_name: ber(tree, &[0x72, 0xA1, 0xA9, 0x84], "users_name")?,
            users_address: ber(tree, &[0x72, 0xA1, 0xA9, 0x85], "users_address")?,
        })
    }
}

/// Data of a public health insurance card.
///
/// Text fields are decoded from the card's UTF-16 to UTF-8. Dates are kept
/// as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MedicalData {
    /// Insurer name.
    pub insurer_name: Field<200>,
    /// Insurer id.
    pub insurer_id: Field<20>,
    /// Card number.
    pub card_id: Field<20>,
    /// Date of issue.
    pub date_of_issue: Field<10>,
    /// Date of expiry.
    pub date_of_expiry: Field<10>,
    /// Language the card was printed in.
    pub print_language: Field<10>,

    /// Insurance number.
    pub insurant_number: Field<20>,
    /// Surname.
    pub family_name: Field<200>,
    /// Surname in Latin script.
    pub family_name_latin: Field<200>,
    /// Given name.
    pub given_name: Field<200>,
    /// Given name in Latin script.
    pub given_name_latin: Field<200>,
    /// Date of birth.
    pub date_of_birth: Field<10>,

    /// Insurance valid until.
    pub valid_until: Field<10>,
    /// Insurance does not expire.
    pub permanently_valid: bool,

    /// Given name of a parent.
    pub parent_name: Field<200>,
    /// Given name of a parent in Latin script.
    pub parent_name_latin: Field<200>,
    /// Sex, `01` male and `02` female.
    pub gender: Field<2>,
    /// Unique personal number.
    pub personal_number: Field<13>,
    /// Street.
    pub street: Field<200>,
    /// Municipality.
    pub municipality: Field<200>,
    /// Place.
    pub place: Field<200>,
    /// House number.
    pub number: Field<20>,
    /// Apartment.
    pub apartment: Field<20>,
    /// Country.
    pub country: Field<200>,
    /// Insurance basis code.
    pub insurance_basis: Field<20>,
    /// Insurance basis description.
    pub insurance_description: Field<300>,
    /// Relationship to the insurance carrier.
    pub carrier_relationship: Field<200>,
    /// Insured as a family member of the carrier.
    pub carrier_family_member: bool,
    /// Carrier's personal number.
    pub carrier_id_number: Field<13>,
    /// Carrier's insurance number.
    pub carrier_insurant_number: Field<20>,
    /// Carrier's surname.
    pub carrier_family_name: Field<200>,
    /// Carrier's surname in Latin script.
    pub carrier_family_name_latin: Field<200>,
    /// Carrier's given name.
    pub carrier_given_name: Field<200>,
    /// Carrier's given name in Latin script.
    pub carrier_given_name_latin: Field<200>,
    /// Start of the insurance.
    pub insurance_start_date: Field<10>,
    /// Taxpayer name.
    pub taxpayer_name: Field<200>,
    /// Taxpayer residence.
    pub taxpayer_residence: Field<200>,
    /// Taxpayer id: tax number, or registration number when that is absent.
    pub taxpayer_id_number: Field<20>,
    /// Taxpayer activity code.
    pub taxpayer_activity_code: Field<20>,
}

/// The four TLV files of a health insurance card.
pub(crate) struct MedicalFiles<'a> {
    pub(crate) document: TlvMap<'a>,
    pub(crate) fixed_personal: TlvMap<'a>,
    pub(crate) variable_personal: TlvMap<'a>,
    pub(crate) variable_admin: TlvMap<'a>,
}

impl MedicalData {
    pub(crate) fn from_files(files: &MedicalFiles<'_>) -> Result<Self> {
        let MedicalFiles {
            document,
            fixed_personal: fixed,
            variable_personal: variable,
            variable_admin: admin,
        } = files;
        let taxpayer_id = if admin.get_or_empty(1632).is_empty() { 1633 } else { 1632 };

        Ok(Self {
            insurer_name: utf16(document, 1553, "insurer_name")?,
            insurer_id: tlv(document, 1554, "insurer_id")?,
            card_id: tlv(document, 1555, "card_id")?,
            date_of_issue: tlv(document, 1557, "date_of_issue")?,
            date_of_expiry: tlv(document, 1558, "date_of_expiry")?,
            print_language: tlv(document, 1560, "print_language")?,

            insurant_number: tlv(fixed, 1569, "insurant_number")?,
            family_name: utf16(fixed, 1570, "family_name")?,
            family_name_latin: utf16(fixed, 1571, "family_name_latin")?,
            given_name: utf16(fixed, 1572, "given_name")?,
            given_name_latin: utf16(fixed, 1573, "given_name_latin")?,
            date_of_birth: tlv(fixed, 1574, "date_of_birth")?,

            valid_until: tlv(variable, 1586, "valid_until")?,
            permanently_valid: flag(variable, 1587),

            parent_name: utf16(admin, 1601, "parent_name")?,
            parent_name_latin: utf16(admin, 1602, "parent_name_latin")?,
            gender: tlv(admin, 1603, "gender")?,
            personal_number: tlv(admin, 1604, "personal_number")?,
            street: utf16(admin, 1605, "street")?,
            municipality: utf16(admin, 1607, "municipality")?,
            place: utf16(admin, 1608, "place")?,
            number: utf16(admin, 1610, "number")?,
            apartment: utf16(admin, 1612, "apartment")?,
            insurance_basis: tlv(admin, 1614, "insurance_basis")?,
            insurance_description: utf16(admin, 1615, "insurance_description")?,
            carrier_relationship: utf16(admin, 1616, "carrier_relationship")?,
            carrier_family_member: flag(admin, 1617),
            carrier_id_number: tlv(admin, 1618, "carrier_id_number")?,
            carrier_insurant_number: tlv(admin, 1619, "carrier_insurant_number")?,
            carrier_family_name: utf16(admin, 1620, "carrier_family_name")?,
            carrier_family_name_latin: utf16(admin, 1621, "carrier_family_name_latin")?,
            carrier_given_name: utf16(admin, 1622, "carrier_given_name")?,
            carrier_given_name_latin: utf16(admin, 1623, "carrier_given_name_latin")?,
            insurance_start_date: tlv(admin, 1624, "insurance_start_date")?,
            country: utf16(admin, 1626, "country")?,
            taxpayer_name: utf16(admin, 1630, "taxpayer_name")?,
            taxpayer_residence: utf16(admin, 1631, "taxpayer_residence")?,
            taxpayer_id_number: tlv(admin, taxpayer_id, "taxpayer_id_number")?,
            taxpayer_activity_code: tlv(admin, 1634, "taxpayer_activity_code")?,
        })
    }
}

/// Selects which record [`CardSession::read_record`] returns.
///
/// [`CardSession::read_record`]: crate::CardSession::read_record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// [`DocumentData`].
    IdentityDocument,
    /// [`FixedPersonalData`].
    FixedPersonal,
    /// [`VariablePersonalData`].
    VariablePersonal,
    /// [`Portrait`].
    Portrait,
    /// A card-resident certificate.
    Certificate(crate::certificate::CertificateRole),
    /// [`RegistrationData`] block `1..=4`.
    Registration(u8),
    /// [`VehicleDocumentData`].
    VehicleDocument,
    /// [`VehicleData`].
    Vehicle,
    /// [`PersonalData`].
    Personal,
    /// [`MedicalData`].
    Medical,
}

impl RecordKind {
    /// Returns `true` if this record can be read from `family`.
    #[must_use]
    pub const fn available_on(self, family: CardFamily) -> bool {
        match self {
            Self::IdentityDocument
            | Self::FixedPersonal
            | Self::VariablePersonal
            | Self::Portrait
            | Self::Certificate(_) => family.is_identity(),
            Self::Registration(_) | Self::VehicleDocument | Self::Vehicle | Self::Personal => {
                family.is_vehicle()
            }
            Self::Medical => matches!(family, CardFamily::MedicalInsurance),
        }
    }
}

/// Any record a card can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum DocumentRecord {
    /// Identity document data.
    IdentityDocument(DocumentData),
    /// Fixed personal data.
    FixedPersonal(Box<FixedPersonalData>),
    /// Variable personal data.
    VariablePersonal(VariablePersonalData),
    /// Portrait.
    Portrait(Box<Portrait>),
    /// Certificate.
    Certificate(Box<CertificateRef>),
    /// Vehicle registration block.
    Registration(Box<RegistrationData>),
    /// Vehicle document data.
    VehicleDocument(VehicleDocumentData),
    /// Vehicle data.
    Vehicle(Box<VehicleData>),
    /// Vehicle owner and user.
    Personal(PersonalData),
    /// Health insurance data.
    Medical(Box<MedicalData>),
}
