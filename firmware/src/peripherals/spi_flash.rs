//! SPI flash module
//!
//! Driver for the XT25F32B 4 MiB NOR flash of the PineTime, exposed through
//! the `embedded-storage` NOR flash traits.

use embedded_hal::spi::{Operation, SpiDevice};
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_READ: u8 = 0x03;
const CMD_READ_STATUS: u8 = 0x05;
const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_SECTOR_ERASE: u8 = 0x20;
const CMD_RELEASE_POWER_DOWN: u8 = 0xab;

/// Write in progress bit of the status register
const STATUS_BUSY: u8 = 0x01;

const CAPACITY: usize = 4 * 1024 * 1024;
const PAGE_SIZE: usize = 256;
const SECTOR_SIZE: usize = 4096;

#[derive(Debug)]
pub enum Error<E> {
    Spi(E),
    NotAligned,
    OutOfBounds,
}

impl<E: core::fmt::Debug> NorFlashError for Error<E> {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Self::Spi(_) => NorFlashErrorKind::Other,
            Self::NotAligned => NorFlashErrorKind::NotAligned,
            Self::OutOfBounds => NorFlashErrorKind::OutOfBounds,
        }
    }
}

struct FlashConfig<SPI> {
    /// Flash SPI interface
    interface: SPI,
}

pub struct Flash<SPI> {
    /// Flash configuration
    config: FlashConfig<SPI>,
}

impl<SPI: SpiDevice> Flash<SPI> {
    /// Configure flash settings on boot
    pub fn init(spi: SPI) -> Self {
        Self {
            config: FlashConfig { interface: spi },
        }
    }

    /// Wake from deep power down state and read device ID
    pub fn wake_and_read_id(&mut self) -> Result<u8, Error<SPI::Error>> {
        let buf: &mut [u8] = &mut [CMD_RELEASE_POWER_DOWN, 0x00, 0x00, 0x00, 0x00];
        // Shift instruction code `ABH` followed by 3 dummy bytes, the ID follows
        self.config
            .interface
            .transfer_in_place(buf)
            .map_err(Error::Spi)?;
        Ok(buf[4])
    }

    fn command(&mut self, bytes: &[u8]) -> Result<(), Error<SPI::Error>> {
        self.config.interface.write(bytes).map_err(Error::Spi)
    }

    fn wait_ready(&mut self) -> Result<(), Error<SPI::Error>> {
        loop {
            let mut status = [0];
            self.config
                .interface
                .transaction(&mut [
                    Operation::Write(&[CMD_READ_STATUS]),
                    Operation::Read(&mut status),
                ])
                .map_err(Error::Spi)?;
            if status[0] & STATUS_BUSY == 0 {
                return Ok(());
            }
        }
    }

    fn check(offset: u32, len: usize) -> Result<(), Error<SPI::Error>> {
        if offset as usize + len > CAPACITY {
            return Err(Error::OutOfBounds);
        }
        Ok(())
    }
}

fn address(offset: u32) -> [u8; 3] {
    let [_, a2, a1, a0] = offset.to_be_bytes();
    [a2, a1, a0]
}

impl<SPI: SpiDevice> ErrorType for Flash<SPI> {
    type Error = Error<SPI::Error>;
}

impl<SPI: SpiDevice> ReadNorFlash for Flash<SPI> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        Self::check(offset, bytes.len())?;
        let [a2, a1, a0] = address(offset);
        self.config
            .interface
            .transaction(&mut [
                Operation::Write(&[CMD_READ, a2, a1, a0]),
                Operation::Read(bytes),
            ])
            .map_err(Error::Spi)
    }

    fn capacity(&self) -> usize {
        CAPACITY
    }
}

impl<SPI: SpiDevice> NorFlash for Flash<SPI> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from as usize % SECTOR_SIZE != 0 || to as usize % SECTOR_SIZE != 0 || to < from {
            return Err(Error::NotAligned);
        }
        Self::check(from, (to - from) as usize)?;
        for sector in (from..to).step_by(SECTOR_SIZE) {
            let [a2, a1, a0] = address(sector);
            self.command(&[CMD_WRITE_ENABLE])?;
            self.command(&[CMD_SECTOR_ERASE, a2, a1, a0])?;
            self.wait_ready()?;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        Self::check(offset, bytes.len())?;
        let mut offset = offset;
        let mut bytes = bytes;
        while !bytes.is_empty() {
            // A page program wraps around at the page end
            let room = PAGE_SIZE - offset as usize % PAGE_SIZE;
            let (chunk, rest) = bytes.split_at(room.min(bytes.len()));
            let [a2, a1, a0] = address(offset);
            self.command(&[CMD_WRITE_ENABLE])?;
            self.config
                .interface
                .transaction(&mut [
                    Operation::Write(&[CMD_PAGE_PROGRAM, a2, a1, a0]),
                    Operation::Write(chunk),
                ])
                .map_err(Error::Spi)?;
            self.wait_ready()?;
            offset += chunk.len() as u32;
            bytes = rest;
        }
        Ok(())
    }
}
