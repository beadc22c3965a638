//! NVS-backed storage medium for ESP32.
//!
//! The image is kept as a single blob, key `eeprom` in namespace `eeprom`.
//! This is the layout the Arduino-ESP32 `EEPROM` emulation uses, so devices
//! provisioned by earlier firmware keep their credentials.
//!
//! Writes go to a RAM copy; [`commit`](StorageMedium::commit) stores the
//! whole blob with `set_raw`, which calls `nvs_commit` before returning.

use super::{check_bounds, StorageError, StorageMedium};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::{debug, warn};

/// NVS namespace of the emulated EEPROM.
const NVS_NAMESPACE: &str = "eeprom";

/// NVS key of the emulated EEPROM blob.
const NVS_KEY: &str = "eeprom";

/// Emulated EEPROM on top of NVS.
pub struct NvsMedium {
    nvs: EspNvs<NvsDefault>,
    image: Vec<u8>,
}

impl NvsMedium {
    /// Open the blob, or start a zeroed image if none is stored yet.
    pub fn new(partition: EspDefaultNvsPartition, capacity: usize) -> Result<Self, StorageError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        let mut image = vec![0u8; capacity];

        match nvs.get_raw(NVS_KEY, &mut image) {
            Ok(Some(bytes)) => debug!("Loaded {} byte EEPROM blob from NVS", bytes.len()),
            Ok(None) => debug!("No EEPROM blob in NVS, starting blank"),
            Err(e) => {
                // Blob larger than our image or unreadable: start blank
                warn!("Failed to read EEPROM blob from NVS: {:?}", e);
                image.fill(0);
            }
        }

        Ok(Self { nvs, image })
    }
}

impl StorageMedium for NvsMedium {
    fn capacity(&self) -> usize {
        self.image.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        check_bounds(offset, buf.len(), self.image.len())?;
        buf.copy_from_slice(&self.image[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        check_bounds(offset, data.len(), self.image.len())?;
        self.image[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.nvs.set_raw(NVS_KEY, &self.image)?;
        Ok(())
    }
}
