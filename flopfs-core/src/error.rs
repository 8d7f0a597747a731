//! Error types for the floppy filesystem.

use thiserror::Error;

/// Errors reported by a block device.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No such drive: {0}")]
    NoSuchDrive(u8),

    #[error("Transfer length {0} is not a whole number of sectors")]
    UnalignedLength(usize),

    #[error("Sector range {sector}+{count} is outside the device")]
    OutOfRange { sector: u32, count: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during filesystem operations.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("No file is open")]
    NotOpen,

    #[error("A file is already open")]
    AlreadyOpen,

    #[error("File not found")]
    NotFound,

    #[error("File exists")]
    FileExists,

    #[error("Invalid file name")]
    InvalidName,

    #[error("Allocation table copies differ at cluster {0}")]
    Corrupted(u16),

    #[error("Chain links to invalid cluster {0:#06X}")]
    InvalidCluster(u16),

    #[error("File exceeds the disk capacity of {limit} clusters")]
    FileTooLarge { limit: usize },

    #[error("File size {size} exceeds its allocated {capacity} bytes")]
    SizeExceedsChain { size: u32, capacity: usize },

    #[error("Directory full")]
    DirectoryFull,

    #[error("No free clusters")]
    AllocationExhausted,

    #[error("End of file")]
    EndOfFile,

    #[error("Device error: {0}")]
    Io(#[from] DeviceError),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Cannot read config: {0}")]
    ConfigFile(#[from] std::io::Error),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for block device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;
