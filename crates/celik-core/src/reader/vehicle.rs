//! Vehicle registration card reads.
//!
//! The card holds four data blocks. Blocks 1 to 3 each come with a
//! signature and the certificate of the authority that signed them; block 4
//! is unsigned. The document, vehicle and personal records are decoded from
//! the BER trees of blocks 1 to 3 merged into one.

use super::files;
use crate::card::FileLayout;
use crate::card::ber::Ber;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::records::{PersonalData, RegistrationData, VehicleData, VehicleDocumentData};
use crate::session::CardSession;

/// Number of registration blocks.
pub const REGISTRATION_BLOCKS: u8 = 4;

/// Blocks that carry a signature.
pub const SIGNED_BLOCKS: std::ops::RangeInclusive<u8> = 1..=3;

/// Raw files of one registration block.
pub(crate) struct RawBlock {
    pub(crate) data: Vec<u8>,
    pub(crate) signature: Vec<u8>,
    pub(crate) certificate: Vec<u8>,
}

/// Unwraps the signature value from its BER primitive.
fn unwrap_signature(object: &[u8]) -> Result<Vec<u8>> {
    let tree = Ber::parse(object)?;
    tree.children()
        .first()
        .and_then(Ber::value)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| {
            Error::MalformedResponse("signature file holds no primitive value".to_string())
        })
}

fn check_index(index: u8) -> Result<()> {
    if (1..=REGISTRATION_BLOCKS).contains(&index) {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "registration block {index} out of range 1..={REGISTRATION_BLOCKS}"
        )))
    }
}

impl CardSession<'_> {
    /// Reads the raw files of block `index`.
    pub(crate) fn read_raw_block(&mut self, index: u8) -> Result<RawBlock> {
        check_index(index)?;
        self.exchange(|channel| {
            let data = channel.read_file(FileLayout::Vehicle, files::registration_data(index))?;
            if !SIGNED_BLOCKS.contains(&index) {
                return Ok(RawBlock {
                    data,
                    signature: Vec::new(),
                    certificate: Vec::new(),
                });
            }
            let signature = unwrap_signature(
                &channel.read_file(FileLayout::Vehicle, files::registration_signature(index))?,
            )?;
            let certificate =
                channel.read_file(FileLayout::Vehicle, files::registration_certificate(index))?;
            Ok(RawBlock {
                data,
                signature,
                certificate,
            })
        })
    }

    /// Reads registration block `index` with its signature and the issuing
    /// authority certificate.
    ///
    /// # Arguments
    ///
    /// * `index` - Block number, `1..=4`. Block 4 has no signature and comes
    ///   back with empty signature and certificate fields.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] for an index outside `1..=4`
    /// - [`Error::UnableToExecute`] on identity cards
    /// - [`Error::DataMissing`] if a file of the block is absent
    /// - [`Error::FieldOverflow`] if a file exceeds its capacity
    pub fn read_registration(&mut self, index: u8) -> Result<RegistrationData> {
        self.require_vehicle("reading registration data")?;
        let block = self.read_raw_block(index)?;
        Ok(RegistrationData {
            index,
            registration_data: Field::from_slice("registration_data", &block.data)?,
            signature_data: Field::from_slice("signature_data", &block.signature)?,
            issuing_authority: Field::from_slice("issuing_authority", &block.certificate)?,
        })
    }

    /// Reads the data of the signed blocks and merges them into one tree.
    fn read_vehicle_tree(&mut self) -> Result<Ber> {
        let blocks = self.exchange(|channel| {
            SIGNED_BLOCKS
                .map(|index| channel.read_file(FileLayout::Vehicle, files::registration_data(index)))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut tree = Ber::constructed(0, Vec::new());
        for block in blocks {
            tree.merge(Ber::parse(&block)?)?;
        }
        Ok(tree)
    }

    /// Reads the vehicle document data.
    ///
    /// # Errors
    ///
    /// - [`Error::UnableToExecute`] on identity cards
    /// - [`Error::DataMissing`] if a data block is absent
    /// - [`Error::MalformedResponse`] for broken BER
    pub fn read_vehicle_document_data(&mut self) -> Result<VehicleDocumentData> {
        self.require_vehicle("reading vehicle document data")?;
        VehicleDocumentData::from_tree(&self.read_vehicle_tree()?)
    }

    /// Reads the vehicle data.
    ///
    /// # Errors
    ///
    /// Same as [`read_vehicle_document_data`](Self::read_vehicle_document_data).
    pub fn read_vehicle_data(&mut self) -> Result<VehicleData> {
        self.require_vehicle("reading vehicle data")?;
        VehicleData::from_tree(&self.read_vehicle_tree()?)
    }

    /// Reads the owner and user of the vehicle.
    ///
    /// # Errors
    ///
    /// Same as [`read_vehicle_document_data`](Self::read_vehicle_document_data).
    pub fn read_personal_data(&mut self) -> Result<PersonalData> {
        self.require_vehicle("reading personal data")?;
        PersonalData::from_tree(&self.read_vehicle_tree()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_unwrapped() {
        let object = Ber::primitive(0x04, vec![0xAA, 0xBB]).to_bytes();
        assert_eq!(unwrap_signature(&object).unwrap(), vec![0xAA, 0xBB]);

        let constructed = Ber::constructed(0x30, vec![]).to_bytes();
        assert!(unwrap_signature(&constructed).is_err());
    }

    #[test]
    fn block_indexes() {
        assert!(check_index(1).is_ok());
        assert!(check_index(4).is_ok());
        assert!(matches!(check_index(0), Err(Error::InvalidParameter(_))));
        assert!(matches!(check_index(5), Err(Error::InvalidParameter(_))));
    }
}
