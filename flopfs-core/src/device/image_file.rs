//! Floppy image file on the host filesystem.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::block_device::{check_transfer, BlockDevice};
use crate::error::DeviceResult;
use crate::layout::SECTOR_SIZE;

/// Disk image backed by a regular file. Every write goes straight to the file.
#[derive(Debug)]
pub struct ImageFile {
    file: File,
    drive: u8,
    sectors: u32,
}

impl ImageFile {
    /// Open an existing image for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> DeviceResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let sectors = (file.metadata()?.len() / SECTOR_SIZE as u64) as u32;
        Ok(Self {
            file,
            drive: 0,
            sectors,
        })
    }

    /// Create (or truncate) a zero-filled image of `sectors` sectors.
    pub fn create(path: impl AsRef<Path>, sectors: u32) -> DeviceResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(u64::from(sectors) * SECTOR_SIZE as u64)?;
        Ok(Self {
            file,
            drive: 0,
            sectors,
        })
    }

    /// Answer to `drive` instead of drive 0.
    pub fn with_drive(mut self, drive: u8) -> Self {
        self.drive = drive;
        self
    }
}

impl BlockDevice for ImageFile {
    fn read_sector(&mut self, drive: u8, sector: u32, buf: &mut [u8]) -> DeviceResult<()> {
        let offset = check_transfer(self.drive, self.sectors, drive, sector, buf.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_sector(&mut self, drive: u8, sector: u32, buf: &[u8]) -> DeviceResult<()> {
        let offset = check_transfer(self.drive, self.sectors, drive, sector, buf.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn sector_count(&self) -> u32 {
        self.sectors
    }
}
