//! Copy-on-write sector overlay.

use std::collections::BTreeMap;

use super::block_device::{check_transfer, BlockDevice};
use crate::error::DeviceResult;
use crate::layout::SECTOR_SIZE;

/// Copy-on-write overlay on top of a base device.
///
/// - Reads come from the overlay first, then fall back to the base
/// - Writes go to the overlay only (base is never modified)
/// - `commit` pushes the overlay to the base, `discard` drops it
pub struct OverlayDisk<B: BlockDevice> {
    base: B,
    drive: u8,
    overlay: BTreeMap<u32, [u8; SECTOR_SIZE]>,
}

impl<B: BlockDevice> OverlayDisk<B> {
    /// Overlay `base`, which answers to `drive`.
    pub fn new(base: B, drive: u8) -> Self {
        Self {
            base,
            drive,
            overlay: BTreeMap::new(),
        }
    }

    /// Get the underlying base device.
    pub fn base(&self) -> &B {
        &self.base
    }

    /// Sectors written since the last commit or discard, in ascending order.
    pub fn modified_sectors(&self) -> impl Iterator<Item = u32> + '_ {
        self.overlay.keys().copied()
    }

    /// Check if a sector was written through the overlay.
    pub fn is_modified(&self, sector: u32) -> bool {
        self.overlay.contains_key(&sector)
    }

    /// Write all overlaid sectors to the base device.
    pub fn commit(&mut self) -> DeviceResult<()> {
        while let Some((sector, data)) = self.overlay.pop_first() {
            if let Err(e) = self.base.write_sector(self.drive, sector, &data) {
                self.overlay.insert(sector, data);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drop all overlay modifications.
    pub fn discard(&mut self) {
        self.overlay.clear();
    }

    pub fn into_base(self) -> B {
        self.base
    }
}

impl<B: BlockDevice> BlockDevice for OverlayDisk<B> {
    fn read_sector(&mut self, drive: u8, sector: u32, buf: &mut [u8]) -> DeviceResult<()> {
        check_transfer(self.drive, self.sector_count(), drive, sector, buf.len())?;

        for (i, chunk) in buf.chunks_mut(SECTOR_SIZE).enumerate() {
            let current = sector + i as u32;
            match self.overlay.get(&current) {
                Some(data) => chunk.copy_from_slice(data),
                None => self.base.read_sector(drive, current, chunk)?,
            }
        }
        Ok(())
    }

    fn write_sector(&mut self, drive: u8, sector: u32, buf: &[u8]) -> DeviceResult<()> {
        check_transfer(self.drive, self.sector_count(), drive, sector, buf.len())?;

        for (i, chunk) in buf.chunks(SECTOR_SIZE).enumerate() {
            let mut data = [0u8; SECTOR_SIZE];
            data.copy_from_slice(chunk);
            self.overlay.insert(sector + i as u32, data);
        }
        Ok(())
    }

    fn sector_count(&self) -> u32 {
        self.base.sector_count()
    }
}
