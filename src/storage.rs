//! Persistence of the last accepted upload, stored verbatim.
//!
//! The bytes saved are exactly the JSON that was uploaded. Loading hands them back so they
//! can go through [`validate`](crate::animation::validate) again, which means a damaged or
//! outdated record degrades to "nothing to play" rather than a crash.
//!
//! [`FlashAnimationStorage`] keeps the text as one record in a reserved flash region:
//!
//! ```text
//! offset  size  field
//!      0     4  magic "ANIM" (u32 LE)
//!      4     4  payload length (u32 LE)
//!      8     4  CRC-32 of magic, length, and payload (u32 LE)
//!     12     n  payload
//! ```
//!
//! Erasing and programming the Pico's flash stalls the whole chip, so
//! [`FlashAnimationStorage::save`] works one sector erase or one chunk write at a time and
//! yields to the executor in between. Playback can then fall behind by at most one sector
//! erase while a save is in progress.
#[cfg(feature = "host")]
pub mod file;
#[cfg(not(feature = "host"))]
pub mod rp_flash;

use crc32fast::Hasher;
use embassy_futures::yield_now;

#[cfg(feature = "host")]
pub use file::FileAnimationStorage;

/// Why a load or save failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistenceError {
    /// The underlying device or file system reported an error.
    #[display("storage I/O failed")]
    Io,
    /// A record was found but its length or checksum is wrong.
    #[display("stored animation is corrupted")]
    Corrupted,
    /// The payload does not fit.
    #[display("{len} bytes do not fit in {capacity} bytes of storage")]
    TooLarge {
        /// Bytes offered or found.
        len: usize,
        /// Bytes available.
        capacity: usize,
    },
}

/// Durable home for the most recent upload.
pub trait AnimationStorage {
    /// Copy the saved bytes into `buffer` and return their length, or `None` if nothing
    /// has been saved.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on I/O failure, a damaged record, or a record larger
    /// than `buffer`.
    fn load(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, PersistenceError>;

    /// Replace the saved bytes with `raw`.
    ///
    /// Implementations that stall the CPU should yield between bounded steps.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on I/O failure or when `raw` is too large.
    async fn save(&mut self, raw: &[u8]) -> Result<(), PersistenceError>;
}

impl<S: AnimationStorage> AnimationStorage for &mut S {
    fn load(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, PersistenceError> {
        (**self).load(buffer)
    }

    async fn save(&mut self, raw: &[u8]) -> Result<(), PersistenceError> {
        (**self).save(raw).await
    }
}

/// A contiguous, erasable window of NOR flash, addressed from 0.
pub trait FlashRegion {
    /// Erase granularity in bytes. Erases and the region size are multiples of it.
    const ERASE_SIZE: usize;

    /// Size of the region in bytes.
    fn capacity(&self) -> usize;

    /// Read `buffer.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] if the device fails.
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), PersistenceError>;

    /// Erase `from..to` (both multiples of [`ERASE_SIZE`](Self::ERASE_SIZE)) to `0xFF`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] if the device fails.
    fn erase(&mut self, from: usize, to: usize) -> Result<(), PersistenceError>;

    /// Program `data` at `offset` into previously erased flash.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] if the device fails.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), PersistenceError>;
}

const MAGIC: u32 = 0x414E_494D; // 'ANIM'
const HEADER_SIZE: usize = 4 + 4 + 4; // Magic + PayloadLen + Crc
const CHUNK_SIZE: usize = 256;

/// [`AnimationStorage`] backed by a [`FlashRegion`].
pub struct FlashAnimationStorage<F> {
    region: F,
}

impl<F: FlashRegion> FlashAnimationStorage<F> {
    /// Store records in `region`.
    #[must_use]
    pub const fn new(region: F) -> Self {
        Self { region }
    }

    /// Largest payload the region can hold.
    #[must_use]
    pub fn max_payload(&self) -> usize {
        self.region.capacity().saturating_sub(HEADER_SIZE)
    }

    /// Give back the region.
    pub fn into_inner(self) -> F {
        self.region
    }

    /// Erase the record so the next load returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] if the erase fails.
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.region.erase(0, F::ERASE_SIZE)?;
        info!("Flash: Cleared animation record");
        Ok(())
    }
}

impl<F: FlashRegion> AnimationStorage for FlashAnimationStorage<F> {
    fn load(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, PersistenceError> {
        let mut header = [0u8; HEADER_SIZE];
        self.region.read(0, &mut header)?;
        let [m0, m1, m2, m3, l0, l1, l2, l3, c0, c1, c2, c3] = header;

        let magic = u32::from_le_bytes([m0, m1, m2, m3]);
        if magic != MAGIC {
            info!("Flash: No animation saved");
            return Ok(None);
        }

        let payload_len = u32::from_le_bytes([l0, l1, l2, l3]) as usize;
        if payload_len > self.max_payload() {
            error!("Flash: Invalid payload length {}", payload_len);
            return Err(PersistenceError::Corrupted);
        }
        if payload_len > buffer.len() {
            return Err(PersistenceError::TooLarge {
                len: payload_len,
                capacity: buffer.len(),
            });
        }

        let payload = &mut buffer[..payload_len];
        self.region.read(HEADER_SIZE, payload)?;

        let stored_crc = u32::from_le_bytes([c0, c1, c2, c3]);
        let computed_crc = compute_crc(&header[..8], payload);
        if stored_crc != computed_crc {
            error!(
                "Flash: CRC mismatch (expected {}, found {})",
                computed_crc, stored_crc
            );
            return Err(PersistenceError::Corrupted);
        }

        info!("Flash: Loaded {} bytes", payload_len);
        Ok(Some(payload_len))
    }

    async fn save(&mut self, raw: &[u8]) -> Result<(), PersistenceError> {
        let capacity = self.max_payload();
        if raw.len() > capacity {
            return Err(PersistenceError::TooLarge {
                len: raw.len(),
                capacity,
            });
        }
        let payload_len =
            u32::try_from(raw.len()).map_err(|_| PersistenceError::TooLarge {
                len: raw.len(),
                capacity,
            })?;

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&payload_len.to_le_bytes());
        let crc = compute_crc(&header[..8], raw);
        header[8..12].copy_from_slice(&crc.to_le_bytes());

        let used = HEADER_SIZE + raw.len();
        let erase_to = used.div_ceil(F::ERASE_SIZE) * F::ERASE_SIZE;
        // Sector 0 holds the header, so the old record is gone after the first step.
        for sector in (0..erase_to).step_by(F::ERASE_SIZE) {
            self.region.erase(sector, sector + F::ERASE_SIZE)?;
            yield_now().await;
        }

        // Payload first, header last: a save cut short leaves no valid magic.
        for (index, chunk) in raw.chunks(CHUNK_SIZE).enumerate() {
            self.region
                .write(HEADER_SIZE + index * CHUNK_SIZE, chunk)?;
            yield_now().await;
        }
        self.region.write(0, &header)?;

        info!("Flash: Saved {} bytes", raw.len());
        Ok(())
    }
}

/// CRC-32 over the header fields and the payload.
fn compute_crc(header: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(header);
    hasher.update(payload);
    hasher.finalize()
}
