//! Persistent credential store.
//!
//! Credentials live in two fixed slots of a small byte-addressable image:
//!
//! ```text
//! offset 0                 50                100              300
//!        [ ssid .. \0 pad ][ password .. \0 pad ][ reserved ... ]
//! ```
//!
//! Each slot holds NUL-terminated text of at most [`MAX_FIELD_LEN`] bytes.
//! There is no header, so images written by earlier firmware load as-is.
//!
//! # Components
//!
//! - [`StorageMedium`] - raw read / write / commit capability
//! - [`CredentialStore`] - slot encoding on top of a medium
//! - [`FileMedium`] - image file on the host
//! - `NvsMedium` - NVS blob on ESP32 (feature `esp32`)
//!
//! [`MAX_FIELD_LEN`]: crate::config::MAX_FIELD_LEN

mod file;
#[cfg(feature = "esp32")]
mod nvs;

use crate::config::{fit_to_slot, Credentials, Field, SLOT_WIDTH};
use log::{debug, info, warn};
use std::fmt;

pub use file::{default_image_path, FileMedium};
#[cfg(feature = "esp32")]
pub use nvs::NvsMedium;

/// Byte value of erased flash.
const ERASED_BYTE: u8 = 0xFF;

/// Byte-addressable non-volatile storage with explicit commit.
///
/// Writes may be buffered until [`commit`](StorageMedium::commit); only
/// committed data is guaranteed to survive a power loss.
pub trait StorageMedium: Send {
    /// Total size in bytes.
    fn capacity(&self) -> usize;

    /// Fill `buf` with the bytes starting at `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `offset`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Flush pending writes to the physical medium.
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// Reject accesses that fall outside `[0, capacity)`.
pub(crate) fn check_bounds(offset: usize, len: usize, capacity: usize) -> Result<(), StorageError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StorageError::OutOfBounds {
            offset,
            len,
            capacity,
        }),
    }
}

/// Slot-encoded credential storage.
///
/// The store is used only by the boot-time load and the provisioning
/// server's write path, so it needs no locking of its own.
pub struct CredentialStore<M> {
    medium: M,
}

impl<M: StorageMedium> CredentialStore<M> {
    /// Wrap a medium.
    ///
    /// Fails if the medium cannot hold both slots.
    pub fn new(medium: M) -> Result<Self, StorageError> {
        let capacity = medium.capacity();
        if capacity < 2 * SLOT_WIDTH {
            return Err(StorageError::CapacityTooSmall {
                capacity,
                required: 2 * SLOT_WIDTH,
            });
        }
        Ok(Self { medium })
    }

    /// Load both slots.
    ///
    /// Never fails: a slot that cannot be read, or that reads as erased
    /// flash, comes back as an empty string.
    pub fn load_all(&self) -> Credentials {
        let ssid = self.load_field(Field::NetworkId);
        let password = self.load_field(Field::Secret);
        let creds = Credentials::new(ssid, password);
        info!(
            "[wifi] Loaded network '{}' (password {} bytes)",
            creds.ssid(),
            creds.password().len()
        );
        creds
    }

    fn load_field(&self, field: Field) -> String {
        let mut slot = [0u8; SLOT_WIDTH];
        if let Err(e) = self.medium.read(field.offset(), &mut slot) {
            warn!("Failed to read {} slot: {}", field, e);
            return String::new();
        }
        decode_slot(&slot)
    }

    /// Store one field and commit.
    ///
    /// The value is truncated to fit the slot; the rest of the slot is zero
    /// filled so the terminator always follows the text. The other slot is
    /// never touched.
    pub fn write_field(&mut self, field: Field, value: &str) -> Result<(), StorageError> {
        let slot = encode_slot(value);
        self.medium.write(field.offset(), &slot)?;
        self.medium.commit()?;
        debug!("Committed {} slot", field);
        Ok(())
    }

    /// Access the underlying medium.
    pub fn medium(&self) -> &M {
        &self.medium
    }
}

/// Text up to the first terminator, decoded lossily.
///
/// Both NUL and the erased-flash byte end a slot; 0xFF never occurs in valid
/// UTF-8 so it cannot be part of provisioned text.
fn decode_slot(slot: &[u8]) -> String {
    let end = slot
        .iter()
        .position(|&b| b == 0 || b == ERASED_BYTE)
        .unwrap_or(slot.len())
        .min(SLOT_WIDTH - 1);
    String::from_utf8_lossy(&slot[..end]).into_owned()
}

fn encode_slot(value: &str) -> [u8; SLOT_WIDTH] {
    let text = fit_to_slot(value).as_bytes();
    let mut slot = [0u8; SLOT_WIDTH];
    slot[..text.len()].copy_from_slice(text);
    slot
}

/// Errors reported by a storage medium.
#[derive(Debug)]
pub enum StorageError {
    /// Access outside the medium.
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    /// Medium too small for the slot layout.
    CapacityTooSmall { capacity: usize, required: usize },
    /// Data read back after a commit differs from what was written.
    VerifyFailed,
    /// Host file I/O error.
    Io(std::io::Error),
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "access of {} bytes at offset {} exceeds capacity {}",
                len, offset, capacity
            ),
            Self::CapacityTooSmall { capacity, required } => {
                write!(f, "capacity {} bytes, need at least {}", capacity, required)
            }
            Self::VerifyFailed => write!(f, "read-back verification failed"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for StorageError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
