//! In-memory disk implementation.

use super::block_device::{check_transfer, BlockDevice};
use crate::error::DeviceResult;
use crate::layout::SECTOR_SIZE;

/// Simple Vec-backed disk answering to a single drive number.
#[derive(Debug, Clone)]
pub struct MemoryDisk {
    drive: u8,
    data: Vec<u8>,
}

impl MemoryDisk {
    /// Create a zero-filled disk of `sectors` sectors on drive 0.
    pub fn new(sectors: u32) -> Self {
        Self {
            drive: 0,
            data: vec![0; sectors as usize * SECTOR_SIZE],
        }
    }

    /// Wrap an existing image. Trailing bytes short of a full sector are dropped.
    pub fn from_bytes(mut data: Vec<u8>) -> Self {
        data.truncate(data.len() / SECTOR_SIZE * SECTOR_SIZE);
        Self { drive: 0, data }
    }

    /// Answer to a different drive number.
    pub fn with_drive(mut self, drive: u8) -> Self {
        self.drive = drive;
        self
    }

    /// Raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw image bytes (for corrupting images in tests).
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes of one sector, if it exists.
    pub fn sector(&self, sector: u32) -> Option<&[u8]> {
        let start = sector as usize * SECTOR_SIZE;
        self.data.get(start..start + SECTOR_SIZE)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl BlockDevice for MemoryDisk {
    fn read_sector(&mut self, drive: u8, sector: u32, buf: &mut [u8]) -> DeviceResult<()> {
        let start = check_transfer(self.drive, self.sector_count(), drive, sector, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write_sector(&mut self, drive: u8, sector: u32, buf: &[u8]) -> DeviceResult<()> {
        let start = check_transfer(self.drive, self.sector_count(), drive, sector, buf.len())?;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn sector_count(&self) -> u32 {
        (self.data.len() / SECTOR_SIZE) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;

    #[test]
    fn test_write_read_sector() {
        let mut disk = MemoryDisk::new(4);
        disk.write_sector(0, 2, &[0xAB; 512]).unwrap();

        let mut buf = [0u8; 512];
        disk.read_sector(0, 2, &mut buf).unwrap();
        assert_eq!(buf, [0xAB; 512]);
        assert_eq!(disk.sector(1), Some(&[0u8; 512][..]));
    }

    #[test]
    fn test_multi_sector_transfer() {
        let mut disk = MemoryDisk::new(4);
        let mut data = vec![1u8; 512];
        data.extend_from_slice(&[2u8; 512]);
        disk.write_sector(0, 1, &data).unwrap();

        assert_eq!(disk.sector(1).unwrap()[0], 1);
        assert_eq!(disk.sector(2).unwrap()[511], 2);
    }

    #[test]
    fn test_out_of_range() {
        let mut disk = MemoryDisk::new(2);
        let mut buf = [0u8; 512];
        assert!(matches!(
            disk.read_sector(0, 2, &mut buf),
            Err(DeviceError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_with_drive() {
        let mut disk = MemoryDisk::new(2).with_drive(1);
        let mut buf = [0u8; 512];
        assert!(disk.read_sector(1, 0, &mut buf).is_ok());
        assert!(matches!(
            disk.read_sector(0, 0, &mut buf),
            Err(DeviceError::NoSuchDrive(0))
        ));
    }

    #[test]
    fn test_from_bytes_truncates() {
        let disk = MemoryDisk::from_bytes(vec![0u8; 1300]);
        assert_eq!(disk.sector_count(), 2);
    }
}
