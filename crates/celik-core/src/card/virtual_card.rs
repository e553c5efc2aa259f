//! An in-memory card and reader.
//!
//! [`VirtualCard`] answers the subset of ISO 7816-4 the document cards use:
//! application and file selection, `READ BINARY`, and PIN `VERIFY` /
//! `CHANGE REFERENCE DATA` with a retry counter. [`VirtualReader`] plays the
//! reader: it implements [`Connector`], and cards can be inserted or pulled
//! out while sessions are open.
//!
//! # Example
//!
//! ```
//! use celik_core::card::{CardFamily, Connector, VirtualCard, VirtualReader};
//!
//! let card = VirtualCard::identity(CardFamily::IdCard2014)
//!     .with_file([0x0F, 0x02], b"document")?;
//! let mut reader = VirtualReader::with_card("Virtual Reader 0", card);
//! let transport = reader.connect("Virtual Reader 0")?;
//! assert!(transport.is_connected());
//! # Ok::<(), celik_core::Error>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::apdu::{Apdu, ApduResponse, ins};
use super::channel::FileLayout;
use super::family::{CardFamily, aid, atr};
use super::{Connector, Transport};
use crate::error::{Error, Result};
use crate::password::{PIN_BLOCK, pin_block};

const SW_OK: u16 = 0x9000;
const SW_NOT_FOUND: u16 = 0x6A82;
const SW_NO_FILE_SELECTED: u16 = 0x6986;
const SW_WRONG_OFFSET: u16 = 0x6B00;
const SW_WRONG_LENGTH: u16 = 0x6700;
const SW_BLOCKED: u16 = 0x6983;
const SW_REFERENCE_NOT_FOUND: u16 = 0x6A88;
const SW_INS_NOT_SUPPORTED: u16 = 0x6D00;
const SW_CLA_NOT_SUPPORTED: u16 = 0x6E00;

#[derive(Debug, Clone)]
struct PinState {
    block: [u8; PIN_BLOCK],
    max_attempts: u8,
    remaining: u8,
}

/// A simulated document card.
#[derive(Clone)]
pub struct VirtualCard {
    atr: Vec<u8>,
    layout: FileLayout,
    applications: Vec<Vec<u8>>,
    files: HashMap<[u8; 2], Vec<u8>>,
    selected: Option<[u8; 2]>,
    pin: Option<PinState>,
}

impl fmt::Debug for VirtualCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualCard")
            .field("atr", &hex::encode_upper(&self.atr))
            .field("layout", &self.layout)
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl VirtualCard {
    /// Creates a blank card with the given ATR and file layout.
    #[must_use]
    pub fn new(atr: impl Into<Vec<u8>>, layout: FileLayout) -> Self {
        Self {
            atr: atr.into(),
            layout,
            applications: Vec::new(),
            files: HashMap::new(),
            selected: None,
            pin: None,
        }
    }

    /// Creates an empty identity card of `family` with its document and
    /// PKCS#15 applications installed.
    ///
    /// For [`CardFamily::VehicleRegistration`] this is [`VirtualCard::vehicle`],
    /// for [`CardFamily::MedicalInsurance`] [`VirtualCard::medical`].
    #[must_use]
    pub fn identity(family: CardFamily) -> Self {
        let atr: &[u8] = match family {
            CardFamily::IdCard2008 => &atr::APOLLO,
            CardFamily::IdCard2014 => &atr::GEMALTO_3,
            CardFamily::ForeignerId2020 | CardFamily::ResidencePermit2024 => &atr::GEMALTO_4,
            CardFamily::VehicleRegistration => return Self::vehicle(),
            CardFamily::MedicalInsurance => return Self::medical(),
        };
        let mut card = Self::new(atr, FileLayout::for_family(family));
        if let Some(app) = family.application_id() {
            card = card.with_application(app);
        }
        card.with_application(&aid::PKCS15)
    }

    /// Creates an empty vehicle registration card.
    #[must_use]
    pub fn vehicle() -> Self {
        let mut card = Self::new(atr::VEHICLE_2, FileLayout::Vehicle);
        for app in aid::VEHICLE[0] {
            card = card.with_application(app);
        }
        card
    }

    /// Creates an empty health insurance card.
    #[must_use]
    pub fn medical() -> Self {
        Self::new(atr::MEDICAL_2, FileLayout::Medical).with_application(&aid::SERVSZK)
    }

    /// Installs an application.
    #[must_use]
    pub fn with_application(mut self, aid: &[u8]) -> Self {
        self.applications.push(aid.to_vec());
        self
    }

    /// Stores `body` under `file_id`, framed the way this card frames files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `body` is too long to frame.
    pub fn with_file(mut self, file_id: [u8; 2], body: &[u8]) -> Result<Self> {
        let framed = self.layout.frame(body)?;
        self.files.insert(file_id, framed);
        Ok(self)
    }

    /// Stores file contents exactly as given, header included.
    #[must_use]
    pub fn with_raw_file(mut self, file_id: [u8; 2], contents: Vec<u8>) -> Self {
        self.files.insert(file_id, contents);
        self
    }

    /// Sets the PIN and its retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `pin` is longer than 8 bytes.
    pub fn with_pin(mut self, pin: &str, max_attempts: u8) -> Result<Self> {
        self.pin = Some(PinState {
            block: pin_block(pin)?,
            max_attempts,
            remaining: max_attempts,
        });
        Ok(self)
    }

    /// Returns the answer-to-reset.
    #[must_use]
    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    /// Returns the PIN attempts left, if a PIN is set.
    #[must_use]
    pub fn pin_attempts_remaining(&self) -> Option<u8> {
        self.pin.as_ref().map(|pin| pin.remaining)
    }

    /// Returns `true` if `pin` is the current PIN.
    #[must_use]
    pub fn pin_is(&self, pin: &str) -> bool {
        match (&self.pin, pin_block(pin)) {
            (Some(state), Ok(block)) => state.block == block,
            _ => false,
        }
    }

    /// Answers one command.
    pub fn respond(&mut self, apdu: &Apdu) -> ApduResponse {
        if apdu.cla() != 0x00 {
            return status(SW_CLA_NOT_SUPPORTED);
        }
        match apdu.ins() {
            ins::SELECT => self.select(apdu),
            ins::READ_BINARY => self.read_binary(apdu),
            ins::VERIFY => self.verify(apdu.data()),
            ins::CHANGE_REFERENCE_DATA => self.change(apdu.data()),
            _ => status(SW_INS_NOT_SUPPORTED),
        }
    }

    fn select(&mut self, apdu: &Apdu) -> ApduResponse {
        match apdu.p1() {
            0x04 => {
                if self.applications.iter().any(|app| app == apdu.data()) {
                    self.selected = None;
                    status(SW_OK)
                } else {
                    status(SW_NOT_FOUND)
                }
            }
            _ => match <[u8; 2]>::try_from(apdu.data()) {
                Ok(id) if self.files.contains_key(&id) => {
                    self.selected = Some(id);
                    status(SW_OK)
                }
                Ok(_) => status(SW_NOT_FOUND),
                Err(_) => status(SW_WRONG_LENGTH),
            },
        }
    }

    fn read_binary(&self, apdu: &Apdu) -> ApduResponse {
        let Some(file) = self.selected.and_then(|id| self.files.get(&id)) else {
            return status(SW_NO_FILE_SELECTED);
        };
        let offset = usize::from(u16::from_be_bytes([apdu.p1(), apdu.p2()]));
        if offset > file.len() {
            return status(SW_WRONG_OFFSET);
        }
        let ne = match usize::try_from(apdu.ne()) {
            Ok(0) | Err(_) => 256,
            Ok(ne) => ne,
        };
        let end = (offset + ne).min(file.len());
        ApduResponse::with_status(file[offset..end].to_vec(), SW_OK)
    }

    fn check_pin(&mut self, candidate: &[u8]) -> std::result::Result<(), ApduResponse> {
        let Some(pin) = self.pin.as_mut() else {
            return Err(status(SW_REFERENCE_NOT_FOUND));
        };
        if pin.remaining == 0 {
            return Err(status(SW_BLOCKED));
        }
        if candidate.is_empty() {
            return Err(status(0x63C0 | u16::from(pin.remaining)));
        }
        if candidate == pin.block {
            pin.remaining = pin.max_attempts;
            Ok(())
        } else {
            pin.remaining -= 1;
            Err(status(0x63C0 | u16::from(pin.remaining)))
        }
    }

    fn verify(&mut self, data: &[u8]) -> ApduResponse {
        if !data.is_empty() && data.len() != PIN_BLOCK {
            return status(SW_WRONG_LENGTH);
        }
        match self.check_pin(data) {
            Ok(()) => status(SW_OK),
            Err(response) => response,
        }
    }

    fn change(&mut self, data: &[u8]) -> ApduResponse {
        if data.len() != 2 * PIN_BLOCK {
            return status(SW_WRONG_LENGTH);
        }
        let (old, new) = data.split_at(PIN_BLOCK);
        if let Err(response) = self.check_pin(old) {
            return response;
        }
        if let Some(pin) = self.pin.as_mut() {
            pin.block.copy_from_slice(new);
        }
        status(SW_OK)
    }
}

fn status(sw: u16) -> ApduResponse {
    ApduResponse::with_status(Vec::new(), sw)
}

#[derive(Debug, Default)]
struct Slot {
    card: Option<VirtualCard>,
    insertion: u64,
    connects: usize,
    exchanges: usize,
}

/// A simulated reader holding at most one [`VirtualCard`].
///
/// Clones share the same slot, so a test can keep a handle while the
/// library owns another.
#[derive(Debug, Clone)]
pub struct VirtualReader {
    name: String,
    slot: Arc<Mutex<Slot>>,
}

impl VirtualReader {
    /// Creates an empty reader.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::default(),
        }
    }

    /// Creates a reader with `card` inserted.
    #[must_use]
    pub fn with_card(name: impl Into<String>, card: VirtualCard) -> Self {
        let reader = Self::new(name);
        reader.insert(card);
        reader
    }

    /// Returns the reader name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot>> {
        lock(&self.slot)
    }

    /// Inserts a card, replacing any card already present.
    pub fn insert(&self, card: VirtualCard) {
        if let Ok(mut slot) = self.lock() {
            slot.card = Some(card);
            slot.insertion += 1;
        }
    }

    /// Pulls the card out. Open transports report it missing from now on.
    pub fn remove(&self) -> Option<VirtualCard> {
        self.lock().ok().and_then(|mut slot| slot.card.take())
    }

    /// Runs `f` against the inserted card.
    pub fn with_inserted<R>(&self, f: impl FnOnce(&mut VirtualCard) -> R) -> Option<R> {
        let mut slot = self.lock().ok()?;
        slot.card.as_mut().map(f)
    }

    /// Returns how many times the reader was connected to.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.lock().map(|slot| slot.connects).unwrap_or_default()
    }

    /// Returns how many commands reached a card.
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.lock().map(|slot| slot.exchanges).unwrap_or_default()
    }
}

fn lock(slot: &Mutex<Slot>) -> Result<MutexGuard<'_, Slot>> {
    slot.lock()
        .map_err(|_| Error::Reader("virtual reader state poisoned".to_string()))
}

impl Connector for VirtualReader {
    fn connect(&mut self, reader: &str) -> Result<Box<dyn Transport>> {
        if reader != self.name {
            return Err(Error::Reader(format!("unknown reader {reader:?}")));
        }
        let mut slot = self.lock()?;
        if slot.card.is_none() {
            return Err(Error::CardMissing);
        }
        slot.connects += 1;
        Ok(Box::new(VirtualTransport {
            slot: Arc::clone(&self.slot),
            insertion: slot.insertion,
        }))
    }

    fn list_readers(&mut self) -> Result<Vec<String>> {
        Ok(vec![self.name.clone()])
    }
}

/// A connection to the card in a [`VirtualReader`].
#[derive(Debug)]
pub struct VirtualTransport {
    slot: Arc<Mutex<Slot>>,
    insertion: u64,
}

impl VirtualTransport {
    fn with_card<R>(&self, f: impl FnOnce(&mut VirtualCard) -> R) -> Result<R> {
        let mut slot = lock(&self.slot)?;
        if slot.insertion != self.insertion {
            return Err(Error::CardMissing);
        }
        slot.exchanges += 1;
        slot.card.as_mut().map(f).ok_or(Error::CardMissing)
    }
}

impl Transport for VirtualTransport {
    fn transmit(&mut self, apdu: &Apdu) -> Result<ApduResponse> {
        self.with_card(|card| card.respond(apdu))
    }

    fn atr(&mut self) -> Result<Vec<u8>> {
        self.with_card(|card| card.atr.clone())
    }

    fn is_connected(&self) -> bool {
        lock(&self.slot)
            .map(|slot| slot.card.is_some() && slot.insertion == self.insertion)
            .unwrap_or(false)
    }
}
