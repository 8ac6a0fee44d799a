//! Persistence of the last dim level
//!
//! The level is written as small records appended into a single erase sector
//! of NOR flash. The newest record wins; a full sector is erased before the
//! next write.
//!
//! Writes never run on the event path. The controller posts levels into a
//! [`Signal`] and [`persist_levels`] drains it from its own task.

use core::fmt;

use embassy_futures::block_on;
use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};
use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};

/// Size of one record slot in bytes
const SLOT_LEN: usize = 8;
const MAGIC: [u8; 2] = *b"LS";
const ERASED: u8 = 0xFF;

/// Durable home of the last dim level.
pub trait LevelStore {
    /// Stored level, `0` when nothing (or nothing readable) was stored.
    fn load(&mut self) -> Result<u8, StoreError>;
    fn save(&mut self, level: u8) -> Result<(), StoreError>;
}

/// Level store I/O failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Flash geometry cannot hold a record slot at the given offset
    Geometry,
    NotAligned,
    OutOfBounds,
    /// Backend specific failure
    Flash,
}

impl StoreError {
    fn from_flash<E: NorFlashError>(error: E) -> Self {
        match error.kind() {
            NorFlashErrorKind::NotAligned => Self::NotAligned,
            NorFlashErrorKind::OutOfBounds => Self::OutOfBounds,
            _ => Self::Flash,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geometry => f.write_str("flash geometry does not fit a level record"),
            Self::NotAligned => f.write_str("unaligned flash access"),
            Self::OutOfBounds => f.write_str("flash access out of bounds"),
            Self::Flash => f.write_str("flash operation failed"),
        }
    }
}

fn encode(level: u8) -> [u8; SLOT_LEN] {
    [MAGIC[0], MAGIC[1], level, !level, ERASED, ERASED, ERASED, ERASED]
}

fn decode(record: &[u8; SLOT_LEN]) -> Option<u8> {
    (record[..2] == MAGIC && record[3] == !record[2]).then_some(record[2])
}

fn is_erased(record: &[u8; SLOT_LEN]) -> bool {
    record.iter().all(|&byte| byte == ERASED)
}

/// Level store on one erase sector of a NOR flash.
pub struct FlashLevelStore<F> {
    flash: F,
    /// Start of the sector
    offset: u32,
    /// Next unwritten slot, once known
    next_slot: Option<usize>,
    last_saved: Option<u8>,
}

impl<F: NorFlash> FlashLevelStore<F> {
    /// `offset` must be the start of an erase sector.
    pub fn new(flash: F, offset: u32) -> Result<Self, StoreError> {
        let sector = F::ERASE_SIZE;
        let fits = sector >= SLOT_LEN
            && sector % SLOT_LEN == 0
            && SLOT_LEN % F::WRITE_SIZE == 0
            && SLOT_LEN % F::READ_SIZE == 0
            && offset as usize % sector == 0
            && offset as usize + sector <= flash.capacity();
        if !fits {
            return Err(StoreError::Geometry);
        }
        Ok(Self {
            flash,
            offset,
            next_slot: None,
            last_saved: None,
        })
    }

    /// Give the flash back.
    pub fn into_inner(self) -> F {
        self.flash
    }

    fn slots() -> usize {
        F::ERASE_SIZE / SLOT_LEN
    }

    fn slot_offset(&self, slot: usize) -> u32 {
        self.offset + (slot * SLOT_LEN) as u32
    }

    /// Find the newest record and the first free slot.
    fn scan(&mut self) -> Result<(Option<[u8; SLOT_LEN]>, usize), StoreError> {
        let mut newest = None;
        let mut used = 0;
        for slot in 0..Self::slots() {
            let mut record = [0; SLOT_LEN];
            self.flash
                .read(self.slot_offset(slot), &mut record)
                .map_err(StoreError::from_flash)?;
            if is_erased(&record) {
                break;
            }
            newest = Some(record);
            used = slot + 1;
        }
        self.next_slot = Some(used);
        Ok((newest, used))
    }
}

impl<F: NorFlash> LevelStore for FlashLevelStore<F> {
    fn load(&mut self) -> Result<u8, StoreError> {
        let (newest, _) = self.scan()?;
        let Some(record) = newest else {
            debug!("No stored level");
            return Ok(0);
        };
        match decode(&record) {
            Some(level) => {
                self.last_saved = Some(level);
                Ok(level)
            }
            None => {
                warn!("Stored level is corrupt, using 0");
                Ok(0)
            }
        }
    }

    fn save(&mut self, level: u8) -> Result<(), StoreError> {
        if self.last_saved == Some(level) {
            return Ok(());
        }
        let mut slot = match self.next_slot {
            Some(slot) => slot,
            None => self.scan()?.1,
        };
        if slot >= Self::slots() {
            let end = self.offset + F::ERASE_SIZE as u32;
            self.flash
                .erase(self.offset, end)
                .map_err(|error| self.forget(error))?;
            slot = 0;
        }
        self.flash
            .write(self.slot_offset(slot), &encode(level))
            .map_err(|error| self.forget(error))?;
        self.next_slot = Some(slot + 1);
        self.last_saved = Some(level);
        trace!("Stored level {} in slot {}", level, slot);
        Ok(())
    }
}

impl<F> FlashLevelStore<F> {
    /// After a failed erase or write the sector layout is unknown again.
    fn forget<E: NorFlashError>(&mut self, error: E) -> StoreError {
        self.next_slot = None;
        self.last_saved = None;
        StoreError::from_flash(error)
    }
}

/// Level to start with. Read failures fall back to 0.
pub fn restore_level<S: LevelStore>(store: &mut S) -> u8 {
    match store.load() {
        Ok(level) => {
            info!("Restored dim level {}", level);
            level
        }
        Err(error) => {
            warn!("Reading stored level failed: {:?}", error);
            0
        }
    }
}

/// Write a queued level, if any. Returns whether a level was taken from the
/// queue. Failures are logged and dropped.
pub fn flush_pending<M: RawMutex, S: LevelStore>(pending: &Signal<M, u8>, store: &mut S) -> bool {
    if !pending.signaled() {
        return false;
    }
    // A signaled wait completes on its first poll
    let level = block_on(pending.wait());
    write_level(store, level);
    true
}

/// Writer task body: store every level posted to `pending`. Levels posted
/// faster than the flash accepts them collapse into the newest one.
pub async fn persist_levels<M: RawMutex, S: LevelStore>(pending: &Signal<M, u8>, store: &mut S) -> ! {
    loop {
        let level = pending.wait().await;
        write_level(store, level);
    }
}

fn write_level<S: LevelStore>(store: &mut S, level: u8) {
    if let Err(error) = store.save(level) {
        warn!("Storing level {} failed: {:?}", level, error);
    }
}
