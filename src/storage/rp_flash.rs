//! [`FlashRegion`] over the Pico's internal QSPI flash.
//!
//! The region is carved from the end of flash, away from the firmware image.
//!
//! ⚠️ **Warning**: firmware and data share the one flash device, and erasing or
//! programming stalls execute-in-place for the duration of the operation. Saves happen
//! only after an accepted upload, one sector erase or chunk write at a time.

use embassy_rp::Peri;
use embassy_rp::flash::{Blocking, ERASE_SIZE, Flash};
use embassy_rp::peripherals::FLASH;

use super::{FlashRegion, PersistenceError};

// Internal flash size for Raspberry Pi Pico 2 (4 MB).
#[cfg(feature = "pico2")]
pub const INTERNAL_FLASH_SIZE: usize = 4 * 1024 * 1024;

// Internal flash size for Raspberry Pi Pico 1 W (2 MB).
#[cfg(not(feature = "pico2"))]
pub const INTERNAL_FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Bytes reserved for the saved animation: comfortably more than the upload limit.
pub const ANIMATION_REGION_SIZE: usize = 24 * ERASE_SIZE;

/// The last [`ANIMATION_REGION_SIZE`] bytes of internal flash.
pub struct RpFlashRegion {
    flash: Flash<'static, FLASH, Blocking, INTERNAL_FLASH_SIZE>,
    base: u32,
}

impl RpFlashRegion {
    /// Take the flash peripheral and claim the region at its end.
    #[must_use]
    pub fn new(peripheral: Peri<'static, FLASH>) -> Self {
        Self {
            flash: Flash::new_blocking(peripheral),
            base: (INTERNAL_FLASH_SIZE - ANIMATION_REGION_SIZE) as u32,
        }
    }

    fn absolute(&self, offset: usize, len: usize) -> Result<u32, PersistenceError> {
        if offset + len > ANIMATION_REGION_SIZE {
            return Err(PersistenceError::TooLarge {
                len: offset + len,
                capacity: ANIMATION_REGION_SIZE,
            });
        }
        Ok(self.base + offset as u32)
    }
}

impl FlashRegion for RpFlashRegion {
    const ERASE_SIZE: usize = ERASE_SIZE;

    fn capacity(&self) -> usize {
        ANIMATION_REGION_SIZE
    }

    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), PersistenceError> {
        let start = self.absolute(offset, buffer.len())?;
        self.flash.blocking_read(start, buffer).map_err(|err| {
            error!("Flash: read failed: {:?}", err);
            PersistenceError::Io
        })
    }

    fn erase(&mut self, from: usize, to: usize) -> Result<(), PersistenceError> {
        let start = self.absolute(from, 0)?;
        let end = self.absolute(to, 0)?;
        self.flash.blocking_erase(start, end).map_err(|err| {
            error!("Flash: erase failed: {:?}", err);
            PersistenceError::Io
        })
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), PersistenceError> {
        let start = self.absolute(offset, data.len())?;
        self.flash.blocking_write(start, data).map_err(|err| {
            error!("Flash: write failed: {:?}", err);
            PersistenceError::Io
        })
    }
}
