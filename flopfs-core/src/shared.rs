//! Thread-safe handle to a mounted volume.
//!
//! The filesystem has no internal locking: a flush writes both table copies and
//! the directory one after another, so a half-finished mutation is visible to
//! anyone reading in between. `SharedFileSystem` serializes every operation
//! behind one mutex that spans lookup, mutation and flush.

use std::sync::{Arc, Mutex};

use crate::device::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::filesystem::FileSystem;

/// Shared volume handle. Clone is cheap (just clones the Arc).
pub struct SharedFileSystem<D: BlockDevice> {
    inner: Arc<Mutex<FileSystem<D>>>,
}

impl<D: BlockDevice> Clone for SharedFileSystem<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: BlockDevice> SharedFileSystem<D> {
    pub fn new(fs: FileSystem<D>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(fs)),
        }
    }

    /// Run `f` with exclusive access to the volume.
    pub fn with<T>(&self, f: impl FnOnce(&mut FileSystem<D>) -> FsResult<T>) -> FsResult<T> {
        let mut fs = self.inner.lock().map_err(|_| FsError::LockPoisoned)?;
        f(&mut fs)
    }

    /// Create, open, write and close a file in one critical section.
    pub fn write_file(&self, name: &str, ext: &str, data: &[u8]) -> FsResult<()> {
        self.with(|fs| {
            fs.create(name, ext)?;
            fs.open(name, ext)?;
            fs.write_all(data)?;
            fs.close()
        })
    }

    /// Read a whole file in one critical section.
    pub fn read_file(&self, name: &str, ext: &str) -> FsResult<Vec<u8>> {
        self.with(|fs| {
            fs.open(name, ext)?;
            let size = fs.open_file().map_or(0, |file| file.file_size());
            let data = (0..size).map(|i| fs.read_byte(i)).collect::<FsResult<Vec<u8>>>();
            fs.close()?;
            data
        })
    }

    /// Recover the volume once every other handle is gone.
    pub fn into_inner(self) -> FsResult<FileSystem<D>> {
        let mutex = Arc::try_unwrap(self.inner).map_err(|_| FsError::LockPoisoned)?;
        mutex.into_inner().map_err(|_| FsError::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::device::MemoryDisk;
    use std::thread;

    fn shared() -> SharedFileSystem<MemoryDisk> {
        let config = FsConfig::default();
        let mut disk = MemoryDisk::new(config.geometry.total_sectors);
        FileSystem::format(&mut disk, &config).unwrap();
        SharedFileSystem::new(FileSystem::init(disk, config).unwrap())
    }

    #[test]
    fn test_write_read_file() {
        let fs = shared();
        fs.write_file("HELLO", "TXT", b"hi there").unwrap();

        let data = fs.read_file("HELLO", "TXT").unwrap();
        // A new file starts with one zeroed cluster
        assert_eq!(data.len(), 512);
        assert_eq!(&data[..8], b"hi there");
        assert!(!fs.with(|fs| Ok(fs.is_open())).unwrap());
    }

    #[test]
    fn test_concurrent_writers() {
        let fs = shared();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let fs = fs.clone();
                thread::spawn(move || {
                    let name = format!("FILE{}", i);
                    fs.write_file(&name, "DAT", &[i as u8; 700])
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let fs = fs.into_inner().unwrap();
        assert_eq!(fs.list().len(), 4);
        assert!(fs.verify().is_clean());
        for entry in fs.list() {
            assert_eq!(entry.file_size, 700);
        }
    }
}
