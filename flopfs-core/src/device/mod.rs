//! Block devices for flopfs.
//!
//! This module provides the sector-level storage layer:
//! - `BlockDevice`: synchronous sector read/write contract
//! - `MemoryDisk`: Vec-backed disk
//! - `ImageFile`: floppy image on the host filesystem
//! - `OverlayDisk`: copy-on-write sector overlay

mod block_device;
mod image_file;
mod memory_disk;
mod overlay_disk;

pub use block_device::{check_transfer, BlockDevice};
pub use image_file::ImageFile;
pub use memory_disk::MemoryDisk;
pub use overlay_disk::OverlayDisk;
