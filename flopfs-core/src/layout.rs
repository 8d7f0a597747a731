//! On-disk layout of a flopfs volume.
//!
//! Default layout (1.44 MB floppy, 512-byte sectors):
//! - Sector 0: boot area (unused by the filesystem)
//! - Sectors 1-9: primary allocation table
//! - Sectors 10-18: mirror allocation table
//! - Sectors 19-32: directory, 32-byte entries
//! - Sector `cluster + 31` onward: cluster payload

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

/// Bytes per sector. Every transfer is a multiple of this.
pub const SECTOR_SIZE: usize = 512;

/// Bytes per cluster (one sector per cluster).
pub const CLUSTER_SIZE: usize = SECTOR_SIZE;

/// Table value of an unallocated cluster.
pub const FREE_CLUSTER: u16 = 0x0000;

/// Table value marking the last cluster of a chain.
pub const END_OF_CHAIN: u16 = 0xFFFF;

/// First cluster index available for file data. Clusters 0 and 1 are reserved.
pub const FIRST_DATA_CLUSTER: u16 = 2;

/// Size of one directory entry record.
pub const DIR_ENTRY_SIZE: usize = 32;

/// Sector geometry of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    /// Total sectors on the device.
    pub total_sectors: u32,
    /// First sector of the primary table.
    pub table_start: u32,
    /// Sectors occupied by one table copy.
    pub table_sectors: u32,
    /// First sector of the mirror table.
    pub mirror_start: u32,
    /// First sector of the directory region.
    pub directory_start: u32,
    /// Sectors occupied by the directory region.
    pub directory_sectors: u32,
    /// Added to a cluster index to get its data sector.
    pub data_offset: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::FLOPPY_1440K
    }
}

impl Geometry {
    /// The 3.5" 1.44 MB floppy layout.
    pub const FLOPPY_1440K: Geometry = Geometry {
        total_sectors: 2880,
        table_start: 1,
        table_sectors: 9,
        mirror_start: 10,
        directory_start: 19,
        directory_sectors: 14,
        data_offset: 31,
    };

    /// Check that the regions are in order, do not overlap, and fit on the disk.
    pub fn validate(&self) -> FsResult<()> {
        let invalid = |msg: &str| Err(FsError::InvalidGeometry(msg.to_string()));

        if self.table_sectors == 0 || self.directory_sectors == 0 {
            return invalid("table and directory regions must be non-empty");
        }
        if self.table_start == 0 {
            return invalid("sector 0 is reserved for the boot area");
        }
        let table_end = region_end(self.table_start, self.table_sectors, "primary table")?;
        if self.mirror_start < table_end {
            return invalid("mirror table overlaps the primary table");
        }
        let mirror_end = region_end(self.mirror_start, self.table_sectors, "mirror table")?;
        if self.directory_start < mirror_end {
            return invalid("directory overlaps the mirror table");
        }
        let directory_end = region_end(self.directory_start, self.directory_sectors, "directory")?;
        let first_data = region_end(self.data_offset, u32::from(FIRST_DATA_CLUSTER), "data area")?;
        if first_data < directory_end {
            return invalid("data area overlaps the directory");
        }
        if first_data >= self.total_sectors {
            return invalid("no room for data clusters");
        }
        if self.table_entries() > usize::from(u16::MAX) {
            return invalid("table has more entries than 16-bit cluster indices allow");
        }
        Ok(())
    }

    /// Number of 16-bit entries in one table copy.
    pub fn table_entries(&self) -> usize {
        self.table_sectors as usize * SECTOR_SIZE / 2
    }

    /// Bytes in one table copy.
    pub fn table_bytes(&self) -> usize {
        self.table_sectors as usize * SECTOR_SIZE
    }

    /// Number of entry slots in the directory region.
    pub fn directory_capacity(&self) -> usize {
        self.directory_bytes() / DIR_ENTRY_SIZE
    }

    /// Bytes in the directory region.
    pub fn directory_bytes(&self) -> usize {
        self.directory_sectors as usize * SECTOR_SIZE
    }

    /// Sector just past the directory region.
    pub fn directory_end(&self) -> u32 {
        self.directory_start.saturating_add(self.directory_sectors)
    }

    /// Sector holding the first data cluster.
    pub fn first_data_sector(&self) -> u32 {
        self.data_offset.saturating_add(u32::from(FIRST_DATA_CLUSTER))
    }

    /// Exclusive upper bound on usable cluster indices.
    ///
    /// Limited both by the table length and by the sectors left on the disk.
    pub fn cluster_limit(&self) -> usize {
        let on_disk = self.total_sectors.saturating_sub(self.data_offset) as usize;
        self.table_entries().min(on_disk)
    }

    /// Largest number of clusters a single chain can hold.
    pub fn max_file_clusters(&self) -> usize {
        self.cluster_limit()
            .saturating_sub(usize::from(FIRST_DATA_CLUSTER))
    }

    /// Map a cluster index to its data sector.
    pub fn cluster_sector(&self, cluster: u16) -> u32 {
        u32::from(cluster) + self.data_offset
    }
}

/// First sector past a region, or `InvalidGeometry` if it runs off the
/// sector numbering.
fn region_end(start: u32, len: u32, region: &str) -> FsResult<u32> {
    start.checked_add(len).ok_or_else(|| {
        FsError::InvalidGeometry(format!("{} ends beyond sector {}", region, u32::MAX))
    })
}

/// Number of whole clusters needed to hold `bytes`.
pub fn clusters_for(bytes: usize) -> usize {
    bytes.div_ceil(CLUSTER_SIZE)
}
