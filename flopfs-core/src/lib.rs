//! flopfs - cluster-chain filesystem for floppy disks
//!
//! This crate provides the storage layer of a small operating system:
//! - Doubly-redundant allocation table (primary + mirror) of 16-bit entries
//! - Flat directory of 32-byte entries
//! - A single open-file session staged in memory
//!
//! # Architecture
//!
//! The filesystem uses a layered design:
//! - `BlockDevice` trait: synchronous sector I/O (memory, image file, overlay)
//! - `AllocationTable`: cluster chains mirrored across both table copies
//! - `Directory`: fixed-size entry slots of the current directory
//! - `FileSession`: the open file's staged data and cursor
//! - `FileSystem`: facade sequencing the above and flushing to the device
//!
//! ```
//! use flopfs_core::{FileSystem, FsConfig, MemoryDisk};
//!
//! let config = FsConfig::default();
//! let mut disk = MemoryDisk::new(config.geometry.total_sectors);
//! FileSystem::format(&mut disk, &config).unwrap();
//!
//! let mut fs = FileSystem::init(disk, config).unwrap();
//! fs.create("HELLO", "TXT").unwrap();
//! fs.open("HELLO", "TXT").unwrap();
//! fs.write_bytes(b'A', 600).unwrap();
//! fs.close().unwrap();
//!
//! fs.open("HELLO", "TXT").unwrap();
//! assert_eq!(fs.read_byte(599).unwrap(), b'A');
//! ```

pub mod config;
pub mod device;
pub mod directory;
pub mod error;
pub mod filesystem;
pub mod layout;
pub mod session;
pub mod shared;
pub mod table;

pub use config::{FsConfig, GrowthPolicy};
pub use device::{BlockDevice, ImageFile, MemoryDisk, OverlayDisk};
pub use directory::{pad_name, split_filename, DirEntry, Directory};
pub use error::{DeviceError, DeviceResult, FsError, FsResult};
pub use filesystem::{DamagedFile, FileSystem, VerifyReport};
pub use layout::{Geometry, CLUSTER_SIZE, END_OF_CHAIN, FREE_CLUSTER, SECTOR_SIZE};
pub use session::{FileSession, OpenFile};
pub use shared::SharedFileSystem;
pub use table::{AllocationTable, TableCopy};
