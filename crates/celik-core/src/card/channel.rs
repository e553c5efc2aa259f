//! File-level access on top of a [`Transport`].
//!
//! Identity and vehicle cards frame their elementary files differently. A
//! [`CardChannel`] hides that: it selects a file by id, reads its header, and
//! fetches the body in chunks small enough for every reader.

use tracing::debug;

use super::Transport;
use super::apdu::{Apdu, ApduResponse, ins};
use super::ber;
use super::family::CardFamily;
use crate::error::{Error, Result};

/// Largest chunk read from identity cards.
const IDENTITY_CHUNK: usize = 0xFF;

/// Largest chunk read from vehicle cards.
const VEHICLE_CHUNK: usize = 0x64;

/// Bytes read to locate the object inside a vehicle file.
const VEHICLE_HEADER: usize = 0x20;

/// How a family frames its elementary files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLayout {
    /// 4-byte header, body length little-endian at `[2..4]`.
    Gemalto,
    /// 6-byte header, body length little-endian at `[4..6]`.
    Apollo,
    /// FCI-style prefix followed by a single BER object.
    Vehicle,
    /// Gemalto framing, files selected by plain file id (`P1 = 00`).
    Medical,
}

impl FileLayout {
    /// Returns the layout used by `family`.
    #[must_use]
    pub const fn for_family(family: CardFamily) -> Self {
        match family {
            CardFamily::IdCard2008 => Self::Apollo,
            CardFamily::VehicleRegistration => Self::Vehicle,
            CardFamily::MedicalInsurance => Self::Medical,
            CardFamily::IdCard2014 | CardFamily::ForeignerId2020 | CardFamily::ResidencePermit2024 => {
                Self::Gemalto
            }
        }
    }

    /// Wraps `body` the way a card stores it.
    ///
    /// For [`FileLayout::Vehicle`], `body` must already be a complete BER
    /// object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `body` is longer than a header
    /// can describe.
    pub fn frame(self, body: &[u8]) -> Result<Vec<u8>> {
        let len = u16::try_from(body.len())
            .map_err(|_| Error::InvalidParameter("file body is too long".to_string()))?
            .to_le_bytes();
        let mut out = match self {
            Self::Gemalto | Self::Medical => vec![0x00, 0x00, len[0], len[1]],
            Self::Apollo => vec![0x00, 0x00, 0x00, 0x00, len[0], len[1]],
            Self::Vehicle => vec![
                0x78, 0x0E, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x00, 0x18, 0x65, 0x56, 0x4C, 0x2D,
                0x30, 0x30, 0x31,
            ],
        };
        out.extend_from_slice(body);
        Ok(out)
    }
}

/// A borrowed card connection with file-level helpers.
pub struct CardChannel<'t> {
    transport: &'t mut dyn Transport,
}

impl<'t> CardChannel<'t> {
    /// Wraps a transport.
    pub fn new(transport: &'t mut dyn Transport) -> Self {
        Self { transport }
    }

    /// Sends one command and logs the exchange.
    ///
    /// Command data is never logged, since it may carry a PIN.
    ///
    /// # Errors
    ///
    /// Returns transport errors unchanged.
    pub fn transmit(&mut self, apdu: &Apdu) -> Result<ApduResponse> {
        let response = self.transport.transmit(apdu)?;
        debug!(
            ins = apdu.ins(),
            p1 = apdu.p1(),
            p2 = apdu.p2(),
            sent = apdu.data().len(),
            received = response.data().len(),
            sw = response.status_word(),
            "apdu exchange"
        );
        Ok(response)
    }

    /// Selects an application by AID.
    ///
    /// Returns `Ok(false)` when the card answers with anything but `9000`.
    ///
    /// # Errors
    ///
    /// Returns transport errors only.
    pub fn select_application(&mut self, aid: &[u8], p2: u8) -> Result<bool> {
        let apdu = Apdu::new(0x00, ins::SELECT, 0x04, p2, aid.to_vec());
        Ok(self.transmit(&apdu)?.is_success())
    }

    /// Selects an elementary file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataMissing`] if the card does not have the file.
    pub fn select_file(&mut self, layout: FileLayout, file_id: [u8; 2]) -> Result<()> {
        let apdu = match layout {
            FileLayout::Gemalto | FileLayout::Apollo => {
                Apdu::with_ne(0x00, ins::SELECT, 0x08, 0x00, file_id.to_vec(), 4)
            }
            FileLayout::Vehicle => Apdu::new(0x00, ins::SELECT, 0x02, 0x04, file_id.to_vec()),
            FileLayout::Medical => Apdu::new(0x00, ins::SELECT, 0x00, 0x00, file_id.to_vec()),
        };
        self.transmit(&apdu)?.check().map_err(|err| match err {
            Error::DataMissing(_) => Error::DataMissing(format!("file {}", hex::encode_upper(file_id))),
            other => other,
        })
    }

    /// Reads up to `len` bytes at `offset` of the selected file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if `offset` or `len` cannot be
    /// encoded, and status errors from the card.
    pub fn read_binary(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let offset = u16::try_from(offset)
            .map_err(|_| Error::MalformedResponse(format!("file offset {offset} too large")))?;
        let len = u16::try_from(len)
            .ok()
            .filter(|len| (1..=256).contains(len))
            .ok_or_else(|| Error::MalformedResponse(format!("read length {len} out of range")))?;

        let response = self.transmit(&Apdu::read_binary(offset, len))?;
        response.check()?;
        Ok(response.into_data())
    }

    /// Reads exactly `len` bytes starting at `offset`, in chunks of `chunk`.
    fn read_exact(&mut self, mut offset: usize, len: usize, chunk: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let want = (len - out.len()).min(chunk);
            let mut data = self.read_binary(offset, want)?;
            if data.is_empty() {
                return Err(Error::MalformedResponse(format!(
                    "card returned no data at offset {offset}, {} bytes still expected",
                    len - out.len()
                )));
            }
            data.truncate(want);
            offset += data.len();
            out.extend_from_slice(&data);
        }
        Ok(out)
    }

    /// Selects a file and returns its body without framing.
    ///
    /// For [`FileLayout::Vehicle`] the body is the complete BER object,
    /// including its tag and length.
    ///
    /// # Errors
    ///
    /// - [`Error::DataMissing`] if the file does not exist
    /// - [`Error::MalformedResponse`] if the header cannot be decoded
    pub fn read_file(&mut self, layout: FileLayout, file_id: [u8; 2]) -> Result<Vec<u8>> {
        self.select_file(layout, file_id)?;

        let (header_len, len_at) = match layout {
            FileLayout::Gemalto | FileLayout::Medical => (4, 2),
            FileLayout::Apollo => (6, 4),
            FileLayout::Vehicle => return self.read_vehicle_object(),
        };

        let header = self.read_binary(0, header_len)?;
        let Some(&[lo, hi]) = header.get(len_at..len_at + 2) else {
            return Err(Error::MalformedResponse(format!(
                "file {} header too short ({} bytes)",
                hex::encode_upper(file_id),
                header.len()
            )));
        };
        let len = usize::from(u16::from_le_bytes([lo, hi]));
        self.read_exact(header_len, len, IDENTITY_CHUNK)
    }

    fn read_vehicle_object(&mut self) -> Result<Vec<u8>> {
        let header = self.read_binary(0, VEHICLE_HEADER)?;
        let too_short = || Error::MalformedResponse("vehicle file header too short".to_string());

        let offset = usize::from(*header.get(1).ok_or_else(too_short)?) + 2;
        let object = header.get(offset..).ok_or_else(too_short)?;
        let (_, _, tag_len) = ber::parse_tag(object)?;
        let (value_len, len_len) = ber::parse_length(object.get(tag_len..).ok_or_else(too_short)?)?;

        self.read_exact(offset, tag_len + len_len + value_len, VEHICLE_CHUNK)
    }
}
