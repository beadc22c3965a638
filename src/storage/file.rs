//! Storage medium for host (development) builds.
//!
//! Keeps the image in memory and writes it to a file on commit. Uses
//! `~/.wifi-provision-esp32/eeprom.bin` by default.
//!
//! Commits write and sync a sibling temp file, rename it over the image and
//! read it back, so a crash mid-commit leaves the previous image intact.

use super::{check_bounds, StorageError, StorageMedium};
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

/// Get the default image file path.
///
/// Returns `~/.wifi-provision-esp32/eeprom.bin`
pub fn default_image_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".wifi-provision-esp32")
        .join("eeprom.bin"))
}

/// File-backed storage image.
#[derive(Debug)]
pub struct FileMedium {
    path: PathBuf,
    image: Vec<u8>,
}

impl FileMedium {
    /// Open the image at `path`, or start a zeroed one if the file is missing.
    ///
    /// A shorter file is zero padded and a longer one truncated to `capacity`.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, StorageError> {
        let path = path.into();
        let mut image = match fs::read(&path) {
            Ok(bytes) => {
                info!("Loaded storage image from {:?}", path);
                bytes
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No storage image at {:?}, starting blank", path);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        image.resize(capacity, 0);
        Ok(Self { path, image })
    }
}

impl StorageMedium for FileMedium {
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
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(&self.image)?;
        // Data must be on disk before the rename makes it visible
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;

        // Verify write by reading back
        if fs::read(&self.path)? != self.image {
            return Err(StorageError::VerifyFailed);
        }
        Ok(())
    }
}
