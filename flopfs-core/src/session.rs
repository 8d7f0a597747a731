//! The single active file handle.
//!
//! While open, the whole file lives in a staged buffer sized in whole clusters.
//! Reads and writes only touch that buffer; the filesystem commits it to disk
//! on close.

use crate::directory::DirEntry;
use crate::error::{FsError, FsResult};
use crate::layout::{clusters_for, CLUSTER_SIZE};

/// State of an open file.
#[derive(Debug, Clone)]
pub struct OpenFile {
    /// Directory slot holding the entry.
    pub(crate) slot: usize,
    /// Working copy of the entry; written back on close.
    pub(crate) entry: DirEntry,
    /// Clusters committed on disk, in chain order.
    pub(crate) chain: Vec<u16>,
    pub(crate) buffer: Vec<u8>,
    pub(crate) cursor: u32,
    /// Hard cap on the buffer (the largest chain the disk can hold).
    pub(crate) max_bytes: usize,
}

impl OpenFile {
    pub(crate) fn new(slot: usize, entry: DirEntry, chain: Vec<u16>, buffer: Vec<u8>, max_bytes: usize) -> Self {
        Self {
            slot,
            entry,
            chain,
            buffer,
            cursor: 0,
            max_bytes,
        }
    }

    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    pub fn file_size(&self) -> u32 {
        self.entry.file_size
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Clusters currently committed to the file's chain.
    pub fn chain(&self) -> &[u16] {
        &self.chain
    }

    /// Bytes the staged buffer can hold without growing.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Clusters needed to hold the current file size.
    pub fn clusters_needed(&self) -> usize {
        clusters_for(self.entry.file_size as usize)
    }

    fn read(&mut self, index: u32) -> FsResult<u8> {
        if index >= self.entry.file_size {
            return Err(FsError::EndOfFile);
        }
        let byte = *self
            .buffer
            .get(index as usize)
            .ok_or(FsError::EndOfFile)?;
        self.cursor = index + 1;
        Ok(byte)
    }

    fn write(&mut self, byte: u8, index: u32) -> FsResult<()> {
        let idx = index as usize;
        if idx >= self.max_bytes {
            return Err(FsError::FileTooLarge {
                limit: self.max_bytes / CLUSTER_SIZE,
            });
        }
        if idx >= self.buffer.len() {
            self.buffer.resize(clusters_for(idx + 1) * CLUSTER_SIZE, 0);
        }
        self.buffer[idx] = byte;
        self.entry.file_size = self.entry.file_size.max(index + 1);
        self.cursor = index + 1;
        Ok(())
    }
}

/// Open/closed state of the file handle.
#[derive(Debug, Clone, Default)]
pub enum FileSession {
    #[default]
    Closed,
    Open(OpenFile),
}

impl FileSession {
    pub fn is_open(&self) -> bool {
        matches!(self, FileSession::Open(_))
    }

    pub fn file(&self) -> FsResult<&OpenFile> {
        match self {
            FileSession::Open(file) => Ok(file),
            FileSession::Closed => Err(FsError::NotOpen),
        }
    }

    pub(crate) fn file_mut(&mut self) -> FsResult<&mut OpenFile> {
        match self {
            FileSession::Open(file) => Ok(file),
            FileSession::Closed => Err(FsError::NotOpen),
        }
    }

    /// Transition `Closed -> Open`.
    pub(crate) fn begin(&mut self, file: OpenFile) -> FsResult<()> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        *self = FileSession::Open(file);
        Ok(())
    }

    /// Transition `Open -> Closed`, handing back the file state.
    pub(crate) fn end(&mut self) -> Option<OpenFile> {
        match std::mem::take(self) {
            FileSession::Open(file) => Some(file),
            FileSession::Closed => None,
        }
    }

    /// Byte at `index`; the cursor moves to `index + 1`.
    pub fn read(&mut self, index: u32) -> FsResult<u8> {
        self.file_mut()?.read(index)
    }

    /// Byte at the cursor.
    pub fn read_next(&mut self) -> FsResult<u8> {
        let file = self.file_mut()?;
        file.read(file.cursor)
    }

    /// Store `byte` at `index`, growing the staged buffer if needed.
    pub fn write(&mut self, byte: u8, index: u32) -> FsResult<()> {
        self.file_mut()?.write(byte, index)
    }

    /// Store `byte` at the cursor.
    pub fn write_next(&mut self, byte: u8) -> FsResult<()> {
        let file = self.file_mut()?;
        file.write(byte, file.cursor)
    }

    /// Write `byte` `count` times at the cursor, stopping at the first failure.
    pub fn write_many(&mut self, byte: u8, count: u32) -> FsResult<()> {
        for _ in 0..count {
            self.write_next(byte)?;
        }
        Ok(())
    }
}
