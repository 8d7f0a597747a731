//! Flat directory of fixed-size entries.
//!
//! The directory keeps an in-memory image of its whole on-disk region. Lookups
//! and mutations work on that image; the filesystem flushes it back to disk.

mod entry;

pub use entry::{pad_field, pad_name, split_filename, DirEntry, EXT_LEN, NAME_LEN};

use log::debug;

use crate::error::{FsError, FsResult};
use crate::layout::{DIR_ENTRY_SIZE, END_OF_CHAIN};

/// The current directory: its own entry and the image of its entry region.
#[derive(Debug, Clone)]
pub struct Directory {
    /// Entry describing this directory. The root has a synthetic one since
    /// it lives in no parent directory.
    entry: DirEntry,
    region: Vec<u8>,
}

impl Directory {
    /// The root directory over a loaded region image.
    pub fn root(region: Vec<u8>) -> Self {
        Self {
            entry: DirEntry::new(*b"ROOT    ", *b"   ", 0, END_OF_CHAIN),
            region,
        }
    }

    /// This directory's own entry.
    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    /// Raw region image, ready to be written to disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.region
    }

    /// Number of entry slots in the region.
    pub fn capacity(&self) -> usize {
        self.region.len() / DIR_ENTRY_SIZE
    }

    fn record(&self, slot: usize) -> Option<&[u8]> {
        let start = slot.checked_mul(DIR_ENTRY_SIZE)?;
        self.region.get(start..start.checked_add(DIR_ENTRY_SIZE)?)
    }

    fn record_mut(&mut self, slot: usize) -> Option<&mut [u8]> {
        let start = slot.checked_mul(DIR_ENTRY_SIZE)?;
        self.region.get_mut(start..start.checked_add(DIR_ENTRY_SIZE)?)
    }

    /// Whether `slot` exists and is unused.
    pub fn is_free(&self, slot: usize) -> bool {
        self.record(slot).is_some_and(|record| record[0] == 0x00)
    }

    /// Entry stored in `slot`, if the slot is in use.
    pub fn get(&self, slot: usize) -> Option<DirEntry> {
        self.record(slot)
            .filter(|record| record[0] != 0x00)
            .map(DirEntry::decode)
    }

    /// In-use entries with their slot numbers, in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, DirEntry)> + '_ {
        (0..self.capacity()).filter_map(|slot| self.get(slot).map(|entry| (slot, entry)))
    }

    /// First entry whose padded name and extension match exactly.
    pub fn find_entry(
        &self,
        name: &[u8; NAME_LEN],
        ext: &[u8; EXT_LEN],
    ) -> Option<(usize, DirEntry)> {
        self.entries().find(|(_, entry)| entry.matches(name, ext))
    }

    /// First unused slot.
    pub fn find_free_slot(&self) -> FsResult<usize> {
        (0..self.capacity())
            .find(|&slot| self.is_free(slot))
            .ok_or(FsError::DirectoryFull)
    }

    /// Store `entry` in `slot`. Slots past the region are ignored.
    pub(crate) fn write_entry(&mut self, slot: usize, entry: &DirEntry) {
        if let Some(record) = self.record_mut(slot) {
            entry.encode(record);
            debug!("directory: wrote {} to slot {}", entry.filename(), slot);
        }
    }

    /// Zero all 32 bytes of `slot`.
    pub(crate) fn erase_entry(&mut self, slot: usize) {
        if let Some(record) = self.record_mut(slot) {
            record.fill(0);
            debug!("directory: erased slot {}", slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, ext: &str, cluster: u16) -> DirEntry {
        let (name, ext) = pad_name(name, ext);
        DirEntry::new(name, ext, 512, cluster)
    }

    #[test]
    fn test_root_entry() {
        let dir = Directory::root(vec![0; 512]);
        assert_eq!(dir.entry().name_str(), "ROOT");
        assert_eq!(dir.capacity(), 16);
        assert_eq!(dir.entries().count(), 0);
    }

    #[test]
    fn test_write_find_erase() {
        let mut dir = Directory::root(vec![0; 512]);
        dir.write_entry(0, &entry("FOO", "TXT", 2));
        dir.write_entry(1, &entry("BAR", "TXT", 3));

        let (name, ext) = pad_name("BAR", "TXT");
        let (slot, found) = dir.find_entry(&name, &ext).unwrap();
        assert_eq!(slot, 1);
        assert_eq!(found.starting_cluster, 3);

        dir.erase_entry(1);
        assert!(dir.find_entry(&name, &ext).is_none());
        assert!(dir.as_bytes()[32..64].iter().all(|&b| b == 0));
        assert_eq!(dir.find_free_slot().unwrap(), 1);
    }

    #[test]
    fn test_scan_continues_past_holes() {
        let mut dir = Directory::root(vec![0; 512]);
        dir.write_entry(0, &entry("A", "", 2));
        dir.write_entry(1, &entry("B", "", 3));
        dir.write_entry(2, &entry("C", "", 4));
        dir.erase_entry(1);

        let (name, ext) = pad_name("C", "");
        assert_eq!(dir.find_entry(&name, &ext).map(|(slot, _)| slot), Some(2));
        let slots: Vec<usize> = dir.entries().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![0, 2]);
    }

    #[test]
    fn test_directory_full() {
        let mut dir = Directory::root(vec![0; 64]);
        dir.write_entry(0, &entry("A", "", 2));
        dir.write_entry(1, &entry("B", "", 3));
        assert!(matches!(dir.find_free_slot(), Err(FsError::DirectoryFull)));
    }

    #[test]
    fn test_slots_out_of_range() {
        let mut dir = Directory::root(vec![0; 64]);
        assert!(dir.get(5).is_none());
        assert!(!dir.is_free(2));
        assert!(!dir.is_free(usize::MAX));

        dir.write_entry(2, &entry("X", "", 2));
        dir.erase_entry(usize::MAX);
        assert_eq!(dir.as_bytes(), &[0u8; 64][..]);
        assert_eq!(dir.entries().count(), 0);
    }
}
