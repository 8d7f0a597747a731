//! Directory entry record.
//!
//! Layout (32 bytes):
//! - Bytes 0-7: Filename (space-padded)
//! - Bytes 8-10: Extension (space-padded)
//! - Bytes 11-14: File size in bytes (u32, little-endian)
//! - Bytes 15-16: Starting cluster (u16, little-endian)
//! - Bytes 17-31: Reserved
//!
//! A record whose first byte is `0x00` is a free slot.

use crate::layout::DIR_ENTRY_SIZE;

/// Width of the filename field.
pub const NAME_LEN: usize = 8;

/// Width of the extension field.
pub const EXT_LEN: usize = 3;

const SIZE_OFFSET: usize = 11;
const CLUSTER_OFFSET: usize = 15;

/// Decoded directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; NAME_LEN],
    pub ext: [u8; EXT_LEN],
    pub file_size: u32,
    pub starting_cluster: u16,
}

impl DirEntry {
    pub fn new(name: [u8; NAME_LEN], ext: [u8; EXT_LEN], file_size: u32, starting_cluster: u16) -> Self {
        Self {
            name,
            ext,
            file_size,
            starting_cluster,
        }
    }

    /// Decode a 32-byte record.
    pub fn decode(raw: &[u8]) -> Self {
        debug_assert!(raw.len() >= DIR_ENTRY_SIZE);
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&raw[..NAME_LEN]);
        let mut ext = [0u8; EXT_LEN];
        ext.copy_from_slice(&raw[NAME_LEN..NAME_LEN + EXT_LEN]);

        let file_size = u32::from_le_bytes([
            raw[SIZE_OFFSET],
            raw[SIZE_OFFSET + 1],
            raw[SIZE_OFFSET + 2],
            raw[SIZE_OFFSET + 3],
        ]);
        let starting_cluster = u16::from_le_bytes([raw[CLUSTER_OFFSET], raw[CLUSTER_OFFSET + 1]]);

        Self {
            name,
            ext,
            file_size,
            starting_cluster,
        }
    }

    /// Encode into a 32-byte record. Reserved bytes are zeroed.
    pub fn encode(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= DIR_ENTRY_SIZE);
        out[..DIR_ENTRY_SIZE].fill(0);
        out[..NAME_LEN].copy_from_slice(&self.name);
        out[NAME_LEN..NAME_LEN + EXT_LEN].copy_from_slice(&self.ext);
        out[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&self.file_size.to_le_bytes());
        out[CLUSTER_OFFSET..CLUSTER_OFFSET + 2].copy_from_slice(&self.starting_cluster.to_le_bytes());
    }

    /// Check the padded name and extension fields byte for byte.
    pub fn matches(&self, name: &[u8; NAME_LEN], ext: &[u8; EXT_LEN]) -> bool {
        &self.name == name && &self.ext == ext
    }

    /// Filename without padding.
    pub fn name_str(&self) -> String {
        trimmed(&self.name)
    }

    /// Extension without padding.
    pub fn ext_str(&self) -> String {
        trimmed(&self.ext)
    }

    /// Full filename with extension.
    pub fn filename(&self) -> String {
        let name = self.name_str();
        let ext = self.ext_str();
        if ext.is_empty() {
            name
        } else {
            format!("{}.{}", name, ext)
        }
    }
}

fn trimmed(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_end_matches([' ', '\0'])
        .to_string()
}

/// Pad a name field to `N` bytes.
///
/// Bytes are copied up to the first null or `N`, whichever comes first; the
/// rest of the field is filled with spaces. Longer input is truncated. Case
/// is preserved.
pub fn pad_field<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut field = [b' '; N];
    for (slot, &byte) in field.iter_mut().zip(raw.iter().take_while(|&&b| b != 0)) {
        *slot = byte;
    }
    field
}

/// Padded filename and extension fields.
pub fn pad_name(name: &str, ext: &str) -> ([u8; NAME_LEN], [u8; EXT_LEN]) {
    (pad_field(name.as_bytes()), pad_field(ext.as_bytes()))
}

/// Split `NAME.EXT` into its two parts (split at the last dot).
///
/// # Examples
/// ```
/// use flopfs_core::split_filename;
/// assert_eq!(split_filename("TESTFILE.TXT"), ("TESTFILE", "TXT"));
/// assert_eq!(split_filename("README"), ("README", ""));
/// ```
pub fn split_filename(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) => (&filename[..pos], &filename[pos + 1..]),
        None => (filename, ""),
    }
}
