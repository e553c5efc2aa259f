//! Card holder PIN changes.

use serde::Serialize;
use tracing::{info, warn};

use crate::card::CardChannel;
use crate::card::apdu::{Apdu, ins};
use crate::card::family::{self, aid};
use crate::error::{Error, Result};
use crate::session::CardSession;

/// PIN reference of the card holder.
const PIN_REFERENCE: u8 = 0x80;

/// Length of a padded PIN block.
pub(crate) const PIN_BLOCK: usize = 8;

/// Pads a PIN with zero bytes to the block the cards expect.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `pin` is longer than the block.
pub(crate) fn pin_block(pin: &str) -> Result<[u8; PIN_BLOCK]> {
    let bytes = pin.as_bytes();
    if bytes.len() > PIN_BLOCK {
        return Err(Error::InvalidParameter(format!(
            "PIN longer than {PIN_BLOCK} characters"
        )));
    }
    let mut block = [0u8; PIN_BLOCK];
    block[..bytes.len()].copy_from_slice(bytes);
    Ok(block)
}

/// Outcome of a successful change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordChangeResult {
    /// Attempts the card grants before blocking, reset by the change.
    pub attempts_remaining: u8,
}

impl PasswordChangeResult {
    /// Returns `true` if no attempts remain.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.attempts_remaining == 0
    }
}

/// Verifies `old` and replaces it with `new`, leaving the PKCS#15
/// application selected.
fn change_reference_data(
    channel: &mut CardChannel<'_>,
    old: &[u8; PIN_BLOCK],
    new: &[u8; PIN_BLOCK],
) -> Result<()> {
    if !channel.select_application(&aid::PKCS15, 0x00)? {
        return Err(Error::UnableToExecute(
            "card has no PKCS#15 application".to_string(),
        ));
    }

    let verify = Apdu::new(0x00, ins::VERIFY, 0x00, PIN_REFERENCE, old.to_vec());
    channel.transmit(&verify)?.check()?;

    let mut data = old.to_vec();
    data.extend_from_slice(new);
    let change = Apdu::new(0x00, ins::CHANGE_REFERENCE_DATA, 0x00, PIN_REFERENCE, data);
    channel.transmit(&change)?.check()
}

impl CardSession<'_> {
    /// Changes the card holder PIN.
    ///
    /// The card first verifies `old`. Every rejection costs one attempt; the
    /// error carries the attempts left. When none are left the card blocks,
    /// and this session answers [`Error::PinBlocked`] from then on without
    /// asking the card.
    ///
    /// # Arguments
    ///
    /// * `old` - The current PIN
    /// * `new` - The new PIN; both must be 4 to 8 digits
    ///
    /// # Errors
    ///
    /// Checked in this order:
    ///
    /// - [`Error::NotInitialized`] if the session is closed
    /// - [`Error::UnableToExecute`] on vehicle registration cards
    /// - [`Error::PinBlocked`] if the PIN is blocked, whatever PINs are given
    /// - [`Error::InvalidParameter`] if a PIN has the wrong format
    /// - [`Error::InvalidPassword`] if the card rejects `old`
    ///
    /// # Example
    ///
    /// ```ignore
    /// match session.change_password("1234", "5678") {
    ///     Ok(_) => println!("changed"),
    ///     Err(Error::InvalidPassword { attempts_remaining }) => {
    ///         println!("wrong PIN, {attempts_remaining} attempts left");
    ///     }
    ///     Err(err) => return Err(err),
    /// }
    /// ```
    pub fn change_password(&mut self, old: &str, new: &str) -> Result<PasswordChangeResult> {
        self.require_identity("changing the PIN")?;
        if self.pin_blocked() {
            return Err(Error::PinBlocked);
        }
        let policy = self.config().password;
        policy.validate(old)?;
        policy.validate(new)?;

        let old_block = pin_block(old)?;
        let new_block = pin_block(new)?;

        // A failed re-select must not mask the change outcome.
        let family = self.family();
        let mut reselected = Ok(());
        let outcome = self.exchange(|channel| {
            let changed = change_reference_data(channel, &old_block, &new_block);
            reselected = family::select_application(channel, family);
            changed
        });
        if let Err(err) = reselected
            && self.is_open()
        {
            warn!(error = %err, "document application not re-selected, reconnecting");
            self.release_connection();
        }

        match outcome {
            Ok(()) => {
                info!("PIN changed");
                Ok(PasswordChangeResult {
                    attempts_remaining: policy.max_attempts,
                })
            }
            Err(Error::InvalidPassword {
                attempts_remaining,
            }) => {
                warn!(attempts_remaining, "PIN rejected");
                if attempts_remaining == 0 {
                    self.mark_pin_blocked();
                }
                Err(Error::InvalidPassword {
                    attempts_remaining,
                })
            }
            Err(Error::PinBlocked) => {
                self.mark_pin_blocked();
                Err(Error::PinBlocked)
            }
            Err(err) => Err(err),
        }
    }
}
