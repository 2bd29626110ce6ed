#![allow(missing_docs)]
//! Flash record format against a RAM-backed region, and the host file backend.

use matrix_player::storage::{
    AnimationStorage, FileAnimationStorage, FlashAnimationStorage, FlashRegion, PersistenceError,
};
use core::pin::pin;
use core::task::{Context, Poll, Waker};

use embassy_futures::block_on;
use tempfile::tempdir;

const SECTOR: usize = 4096;

/// NOR-like flash in RAM: erase sets 0xFF, programming can only clear bits.
struct RamFlash {
    bytes: Vec<u8>,
    fail_writes_at: Option<usize>,
    erases: Vec<(usize, usize)>,
    writes: usize,
}

impl RamFlash {
    fn new(sectors: usize) -> Self {
        Self {
            bytes: vec![0xFF; sectors * SECTOR],
            fail_writes_at: None,
            erases: Vec::new(),
            writes: 0,
        }
    }
}

impl FlashRegion for RamFlash {
    const ERASE_SIZE: usize = SECTOR;

    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), PersistenceError> {
        let source = self
            .bytes
            .get(offset..offset + buffer.len())
            .ok_or(PersistenceError::Io)?;
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn erase(&mut self, from: usize, to: usize) -> Result<(), PersistenceError> {
        assert_eq!(from % SECTOR, 0, "unaligned erase start");
        assert_eq!(to % SECTOR, 0, "unaligned erase end");
        self.erases.push((from, to));
        self.bytes
            .get_mut(from..to)
            .ok_or(PersistenceError::Io)?
            .fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), PersistenceError> {
        if self.fail_writes_at == Some(offset) {
            return Err(PersistenceError::Io);
        }
        self.writes += 1;
        let target = self
            .bytes
            .get_mut(offset..offset + data.len())
            .ok_or(PersistenceError::Io)?;
        for (cell, &byte) in target.iter_mut().zip(data) {
            *cell &= byte;
        }
        Ok(())
    }
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|index| (index * 7 % 251) as u8).collect()
}

#[test]
fn blank_flash_has_nothing_saved() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(2));
    let mut buffer = [0u8; 64];
    assert_eq!(storage.load(&mut buffer)?, None);
    Ok(())
}

#[test]
fn saved_bytes_come_back_verbatim() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(4));
    // Longer than one write chunk and one sector.
    let raw = payload(5_000);
    block_on(storage.save(&raw))?;

    let mut buffer = vec![0u8; 8_000];
    let len = storage.load(&mut buffer)?.expect("record present");
    assert_eq!(&buffer[..len], raw.as_slice());
    Ok(())
}

#[test]
fn later_save_replaces_earlier() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(2));
    block_on(storage.save(&payload(3_000)))?;
    block_on(storage.save(b"[[\"#FF0000\"]]"))?;

    let mut buffer = [0u8; 64];
    let len = storage.load(&mut buffer)?.expect("record present");
    assert_eq!(&buffer[..len], b"[[\"#FF0000\"]]");
    Ok(())
}

#[test]
fn empty_payload_round_trips() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(1));
    block_on(storage.save(&[]))?;
    let mut buffer = [0u8; 4];
    assert_eq!(storage.load(&mut buffer)?, Some(0));
    Ok(())
}

#[test]
fn payload_over_capacity_is_refused() {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(1));
    let capacity = storage.max_payload();
    assert_eq!(capacity, SECTOR - 12);

    assert_eq!(
        block_on(storage.save(&payload(capacity + 1))),
        Err(PersistenceError::TooLarge {
            len: capacity + 1,
            capacity
        })
    );
    assert_eq!(block_on(storage.save(&payload(capacity))), Ok(()));
}

#[test]
fn buffer_too_small_for_record() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(1));
    block_on(storage.save(&payload(100)))?;

    let mut buffer = [0u8; 99];
    assert_eq!(
        storage.load(&mut buffer),
        Err(PersistenceError::TooLarge {
            len: 100,
            capacity: 99
        })
    );
    Ok(())
}

#[test]
fn flipped_payload_bit_is_corruption() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(1));
    block_on(storage.save(&payload(300)))?;
    let mut flash = storage.into_inner();
    flash.bytes[12 + 150] ^= 0x01;
    let mut storage = FlashAnimationStorage::new(flash);

    let mut buffer = [0u8; 512];
    assert_eq!(storage.load(&mut buffer), Err(PersistenceError::Corrupted));
    Ok(())
}

#[test]
fn impossible_length_is_corruption() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(1));
    block_on(storage.save(&payload(10)))?;
    let mut flash = storage.into_inner();
    flash.bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    let mut storage = FlashAnimationStorage::new(flash);

    let mut buffer = [0u8; 64];
    assert_eq!(storage.load(&mut buffer), Err(PersistenceError::Corrupted));
    Ok(())
}

#[test]
fn interrupted_save_leaves_nothing_saved() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(1));
    block_on(storage.save(&payload(40)))?;
    let mut flash = storage.into_inner();
    // The header goes in last, at offset 0.
    flash.fail_writes_at = Some(0);
    let mut storage = FlashAnimationStorage::new(flash);

    assert_eq!(block_on(storage.save(&payload(50))), Err(PersistenceError::Io));
    let mut buffer = [0u8; 64];
    assert_eq!(storage.load(&mut buffer)?, None);
    Ok(())
}

#[test]
fn save_erases_one_sector_per_step_and_yields_between_steps() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(4));
    // Header plus payload spans three sectors.
    let raw = payload(2 * SECTOR + 100);
    let mut context = Context::from_waker(Waker::noop());

    let mut pending = 0;
    {
        let mut save = pin!(storage.save(&raw));
        loop {
            match save.as_mut().poll(&mut context) {
                Poll::Ready(result) => break result?,
                Poll::Pending => pending += 1,
            }
        }
    }

    let flash = storage.into_inner();
    assert_eq!(
        flash.erases,
        [(0, SECTOR), (SECTOR, 2 * SECTOR), (2 * SECTOR, 3 * SECTOR)]
    );
    let chunks = raw.len().div_ceil(256);
    assert_eq!(flash.writes, chunks + 1);
    assert_eq!(pending, 3 + chunks);
    Ok(())
}

#[test]
fn clear_forgets_the_record() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(1));
    block_on(storage.save(&payload(10)))?;
    storage.clear()?;

    let mut buffer = [0u8; 64];
    assert_eq!(storage.load(&mut buffer)?, None);
    Ok(())
}

fn save_through<S: AnimationStorage>(mut storage: S, raw: &[u8]) -> Result<(), PersistenceError> {
    block_on(storage.save(raw))
}

#[test]
fn storage_works_through_a_mutable_reference() -> Result<(), PersistenceError> {
    let mut storage = FlashAnimationStorage::new(RamFlash::new(1));
    save_through(&mut storage, b"[]")?;
    let mut buffer = [0u8; 8];
    assert_eq!(storage.load(&mut buffer)?, Some(2));
    Ok(())
}

#[test]
fn file_storage_missing_file_is_nothing_saved() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut storage = FileAnimationStorage::new(dir.path().join("last.json"));
    let mut buffer = [0u8; 16];
    assert_eq!(storage.load(&mut buffer)?, None);
    Ok(())
}

#[test]
fn file_storage_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut storage = FileAnimationStorage::new(dir.path().join("last.json"));
    block_on(storage.save(b"[[\"#00FF00\"]]"))?;

    assert!(storage.path().exists());
    let mut buffer = [0u8; 64];
    let len = storage.load(&mut buffer)?.expect("file present");
    assert_eq!(&buffer[..len], b"[[\"#00FF00\"]]");
    Ok(())
}

#[test]
fn file_storage_reports_small_buffer() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut storage = FileAnimationStorage::new(dir.path().join("last.json"));
    block_on(storage.save(&payload(32)))?;

    let mut buffer = [0u8; 8];
    assert_eq!(
        storage.load(&mut buffer),
        Err(PersistenceError::TooLarge {
            len: 32,
            capacity: 8
        })
    );
    Ok(())
}

#[test]
fn file_storage_in_missing_directory_fails_to_save() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut storage = FileAnimationStorage::new(dir.path().join("missing").join("last.json"));
    assert_eq!(block_on(storage.save(b"[]")), Err(PersistenceError::Io));
    Ok(())
}
