//! BlockDevice trait - sector-level interface to a disk drive.

use crate::error::{DeviceError, DeviceResult};
use crate::layout::SECTOR_SIZE;

/// Synchronous sector I/O on a single drive.
///
/// Transfers are blocking and always cover whole sectors: the buffer length
/// is the transfer length and must be a multiple of 512.
pub trait BlockDevice {
    /// Read `buf.len()` bytes starting at `sector`.
    fn read_sector(&mut self, drive: u8, sector: u32, buf: &mut [u8]) -> DeviceResult<()>;

    /// Write `buf.len()` bytes starting at `sector`.
    fn write_sector(&mut self, drive: u8, sector: u32, buf: &[u8]) -> DeviceResult<()>;

    /// Number of 512-byte sectors on this device.
    fn sector_count(&self) -> u32;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn read_sector(&mut self, drive: u8, sector: u32, buf: &mut [u8]) -> DeviceResult<()> {
        (**self).read_sector(drive, sector, buf)
    }

    fn write_sector(&mut self, drive: u8, sector: u32, buf: &[u8]) -> DeviceResult<()> {
        (**self).write_sector(drive, sector, buf)
    }

    fn sector_count(&self) -> u32 {
        (**self).sector_count()
    }
}

/// Validate a transfer against a device's drive number and size.
///
/// Returns the byte offset of `sector` on success.
pub fn check_transfer(
    expected_drive: u8,
    sector_count: u32,
    drive: u8,
    sector: u32,
    len: usize,
) -> DeviceResult<usize> {
    if drive != expected_drive {
        return Err(DeviceError::NoSuchDrive(drive));
    }
    if len % SECTOR_SIZE != 0 {
        return Err(DeviceError::UnalignedLength(len));
    }
    let count = (len / SECTOR_SIZE) as u32;
    let out_of_range = DeviceError::OutOfRange { sector, count };
    let end = sector.checked_add(count).ok_or(out_of_range)?;
    if end > sector_count {
        return Err(DeviceError::OutOfRange { sector, count });
    }
    Ok(sector as usize * SECTOR_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transfer_ok() {
        assert_eq!(check_transfer(0, 10, 0, 3, 1024).unwrap(), 1536);
        assert_eq!(check_transfer(0, 10, 0, 9, 512).unwrap(), 4608);
    }

    #[test]
    fn test_check_transfer_wrong_drive() {
        assert!(matches!(
            check_transfer(0, 10, 1, 0, 512),
            Err(DeviceError::NoSuchDrive(1))
        ));
    }

    #[test]
    fn test_check_transfer_unaligned() {
        assert!(matches!(
            check_transfer(0, 10, 0, 0, 100),
            Err(DeviceError::UnalignedLength(100))
        ));
    }

    #[test]
    fn test_check_transfer_out_of_range() {
        assert!(matches!(
            check_transfer(0, 10, 0, 9, 1024),
            Err(DeviceError::OutOfRange { sector: 9, count: 2 })
        ));
        assert!(check_transfer(0, 10, 0, u32::MAX, 512).is_err());
    }
}
