//! Mirrored cluster allocation table.
//!
//! Each table copy is a flat array of little-endian 16-bit entries indexed by
//! cluster number. `0x0000` marks a free cluster, `0xFFFF` the end of a chain,
//! and any other value the next cluster of the chain. Clusters 0 and 1 are
//! reserved.
//!
//! Every mutation goes through [`AllocationTable::set`], which writes the
//! primary and the mirror together, so the two copies only diverge when the
//! on-disk image was already inconsistent.

use log::{debug, warn};

use crate::error::{FsError, FsResult};
use crate::layout::{Geometry, END_OF_CHAIN, FIRST_DATA_CLUSTER, FREE_CLUSTER};

/// One of the two table copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCopy {
    Primary,
    Mirror,
}

/// The primary/mirror table pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationTable {
    primary: Vec<u16>,
    mirror: Vec<u16>,
    /// Exclusive upper bound on clusters that map to a sector on the disk.
    limit: usize,
}

impl AllocationTable {
    /// Blank table for a freshly formatted volume.
    pub fn new(geometry: &Geometry) -> Self {
        let mut entries = vec![FREE_CLUSTER; geometry.table_entries()];
        entries[0] = END_OF_CHAIN;
        entries[1] = END_OF_CHAIN;
        Self {
            primary: entries.clone(),
            mirror: entries,
            limit: geometry.cluster_limit(),
        }
    }

    /// Decode both copies from their on-disk bytes.
    pub fn from_bytes(primary: &[u8], mirror: &[u8], geometry: &Geometry) -> Self {
        Self {
            primary: decode(primary),
            mirror: decode(mirror),
            limit: geometry.cluster_limit().min(primary.len() / 2),
        }
    }

    /// Encode one copy to its on-disk bytes.
    pub fn to_bytes(&self, copy: TableCopy) -> Vec<u8> {
        self.copy(copy)
            .iter()
            .flat_map(|entry| entry.to_le_bytes())
            .collect()
    }

    fn copy(&self, copy: TableCopy) -> &[u16] {
        match copy {
            TableCopy::Primary => &self.primary,
            TableCopy::Mirror => &self.mirror,
        }
    }

    /// Number of entries in each copy.
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Primary entry for `cluster`.
    pub fn entry(&self, cluster: u16) -> Option<u16> {
        self.primary.get(usize::from(cluster)).copied()
    }

    /// Mirror entry for `cluster`.
    pub fn mirror_entry(&self, cluster: u16) -> Option<u16> {
        self.mirror.get(usize::from(cluster)).copied()
    }

    /// Largest number of clusters a chain may hold.
    pub fn max_chain_len(&self) -> usize {
        self.limit.saturating_sub(usize::from(FIRST_DATA_CLUSTER))
    }

    /// Whether `cluster` can hold file data.
    pub fn is_data_cluster(&self, cluster: u16) -> bool {
        cluster >= FIRST_DATA_CLUSTER && usize::from(cluster) < self.limit
    }

    /// Write `value` into both copies.
    fn set(&mut self, cluster: u16, value: u16) {
        let idx = usize::from(cluster);
        self.primary[idx] = value;
        self.mirror[idx] = value;
    }

    /// First free cluster at or after cluster 2.
    pub fn find_free_cluster(&self) -> FsResult<u16> {
        (usize::from(FIRST_DATA_CLUSTER)..self.limit)
            .find(|&idx| self.primary[idx] == FREE_CLUSTER)
            .map(|idx| idx as u16)
            .ok_or(FsError::AllocationExhausted)
    }

    /// Number of free data clusters.
    pub fn free_count(&self) -> usize {
        self.primary
            .get(usize::from(FIRST_DATA_CLUSTER)..self.limit)
            .map_or(0, |data| data.iter().filter(|&&e| e == FREE_CLUSTER).count())
    }

    /// Claim a free cluster as a new one-cluster chain.
    pub fn allocate(&mut self) -> FsResult<u16> {
        let cluster = self.find_free_cluster()?;
        self.set(cluster, END_OF_CHAIN);
        debug!("table: allocated cluster {}", cluster);
        Ok(cluster)
    }

    /// Allocate a cluster and link it after `tail`. Returns the new cluster.
    pub fn extend_chain(&mut self, tail: u16) -> FsResult<u16> {
        if !self.is_data_cluster(tail) {
            return Err(FsError::InvalidCluster(tail));
        }
        let cluster = self.find_free_cluster()?;
        self.set(cluster, END_OF_CHAIN);
        self.set(tail, cluster);
        debug!("table: linked cluster {} after {}", cluster, tail);
        Ok(cluster)
    }

    /// Free every cluster of the chain starting at `head`.
    ///
    /// The chain is walked in full before anything is freed, so a broken chain
    /// leaves the table untouched. Returns the number of clusters released.
    pub fn release_chain(&mut self, head: u16) -> FsResult<usize> {
        let chain = self.chain(head)?;
        for &cluster in &chain {
            self.set(cluster, FREE_CLUSTER);
        }
        debug!("table: released {} clusters from {}", chain.len(), head);
        Ok(chain.len())
    }

    /// Free everything linked after `tail` and make `tail` the last cluster.
    pub fn truncate_after(&mut self, tail: u16) -> FsResult<usize> {
        let next = self.entry(tail).ok_or(FsError::InvalidCluster(tail))?;
        let released = if next == END_OF_CHAIN {
            0
        } else {
            self.release_chain(next)?
        };
        self.set(tail, END_OF_CHAIN);
        Ok(released)
    }

    /// Walk the chain from `head`, comparing both copies at every step.
    pub fn validate_chain(&self, head: u16) -> FsResult<()> {
        self.walk(head, |table, cluster| {
            if table.primary[usize::from(cluster)] != table.mirror[usize::from(cluster)] {
                warn!("table: copies differ at cluster {}", cluster);
                return Err(FsError::Corrupted(cluster));
            }
            Ok(())
        })
        .map(|_| ())
    }

    /// Clusters of the chain starting at `head`, in order.
    ///
    /// A head of `0xFFFF` is an empty chain.
    pub fn chain(&self, head: u16) -> FsResult<Vec<u16>> {
        self.walk(head, |_, _| Ok(()))
    }

    fn walk<F>(&self, head: u16, mut visit: F) -> FsResult<Vec<u16>>
    where
        F: FnMut(&Self, u16) -> FsResult<()>,
    {
        let limit = self.max_chain_len();
        let mut out = Vec::new();
        let mut cluster = head;

        while cluster != END_OF_CHAIN {
            if !self.is_data_cluster(cluster) {
                return Err(FsError::InvalidCluster(cluster));
            }
            if out.len() == limit {
                return Err(FsError::FileTooLarge { limit });
            }
            visit(self, cluster)?;
            out.push(cluster);
            cluster = self.primary[usize::from(cluster)];
        }
        Ok(out)
    }

    /// Clusters whose primary and mirror entries differ.
    pub fn mismatches(&self) -> Vec<u16> {
        self.primary
            .iter()
            .zip(&self.mirror)
            .enumerate()
            .filter(|(_, (p, m))| p != m)
            .map(|(idx, _)| idx as u16)
            .collect()
    }

    /// Overwrite the other copy with `source`.
    pub fn restore_from(&mut self, source: TableCopy) {
        match source {
            TableCopy::Primary => self.mirror.clone_from(&self.primary),
            TableCopy::Mirror => self.primary.clone_from(&self.mirror),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_raw(&mut self, copy: TableCopy, cluster: u16, value: u16) {
        match copy {
            TableCopy::Primary => self.primary[usize::from(cluster)] = value,
            TableCopy::Mirror => self.mirror[usize::from(cluster)] = value,
        }
    }
}

fn decode(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_geometry() -> Geometry {
        Geometry {
            total_sectors: 12,
            table_start: 1,
            table_sectors: 1,
            mirror_start: 2,
            directory_start: 3,
            directory_sectors: 1,
            data_offset: 2,
        }
    }

    #[test]
    fn test_new_table_reserves_first_clusters() {
        let table = AllocationTable::new(&Geometry::default());
        assert_eq!(table.len(), 2304);
        assert_eq!(table.entry(0), Some(END_OF_CHAIN));
        assert_eq!(table.entry(1), Some(END_OF_CHAIN));
        assert_eq!(table.find_free_cluster().unwrap(), 2);
    }

    #[test]
    fn test_extend_and_walk_chain() {
        let mut table = AllocationTable::new(&Geometry::default());
        let head = table.allocate().unwrap();
        let second = table.extend_chain(head).unwrap();
        let third = table.extend_chain(second).unwrap();

        assert_eq!((head, second, third), (2, 3, 4));
        assert_eq!(table.chain(head).unwrap(), vec![2, 3, 4]);
        assert_eq!(table.entry(4), Some(END_OF_CHAIN));
        assert!(table.mismatches().is_empty());
        assert!(table.validate_chain(head).is_ok());
    }

    #[test]
    fn test_free_scan_skips_used_clusters() {
        let mut table = AllocationTable::new(&Geometry::default());
        let a = table.allocate().unwrap();
        let b = table.allocate().unwrap();
        table.release_chain(a).unwrap();

        assert_eq!(b, 3);
        assert_eq!(table.find_free_cluster().unwrap(), 2);
    }

    #[test]
    fn test_allocation_exhausted() {
        // 12 sectors - data offset 2 => clusters 2..10 usable
        let mut table = AllocationTable::new(&small_geometry());
        for _ in 0..8 {
            table.allocate().unwrap();
        }
        assert_eq!(table.free_count(), 0);
        assert!(matches!(
            table.allocate(),
            Err(FsError::AllocationExhausted)
        ));
    }

    #[test]
    fn test_release_chain_zeroes_both_copies() {
        let mut table = AllocationTable::new(&Geometry::default());
        let head = table.allocate().unwrap();
        let tail = table.extend_chain(head).unwrap();

        assert_eq!(table.release_chain(head).unwrap(), 2);
        for cluster in [head, tail] {
            assert_eq!(table.entry(cluster), Some(FREE_CLUSTER));
            assert_eq!(table.mirror_entry(cluster), Some(FREE_CLUSTER));
        }
    }

    #[test]
    fn test_truncate_after() {
        let mut table = AllocationTable::new(&Geometry::default());
        let head = table.allocate().unwrap();
        let second = table.extend_chain(head).unwrap();
        table.extend_chain(second).unwrap();

        assert_eq!(table.truncate_after(head).unwrap(), 2);
        assert_eq!(table.chain(head).unwrap(), vec![head]);
        assert_eq!(table.free_count(), table.max_chain_len() - 1);
    }

    #[test]
    fn test_validate_detects_mirror_mismatch() {
        let mut table = AllocationTable::new(&Geometry::default());
        let head = table.allocate().unwrap();
        let tail = table.extend_chain(head).unwrap();
        table.set_raw(TableCopy::Mirror, tail, 0x0042);

        assert!(matches!(
            table.validate_chain(head),
            Err(FsError::Corrupted(c)) if c == tail
        ));
        assert_eq!(table.mismatches(), vec![tail]);

        table.restore_from(TableCopy::Primary);
        assert!(table.validate_chain(head).is_ok());
    }

    #[test]
    fn test_cycle_is_bounded() {
        let mut table = AllocationTable::new(&small_geometry());
        let head = table.allocate().unwrap();
        let tail = table.extend_chain(head).unwrap();
        table.set_raw(TableCopy::Primary, tail, head);
        table.set_raw(TableCopy::Mirror, tail, head);

        assert!(matches!(
            table.chain(head),
            Err(FsError::FileTooLarge { limit: 8 })
        ));
        assert!(matches!(
            table.validate_chain(head),
            Err(FsError::FileTooLarge { .. })
        ));
        // Broken chains are left alone
        assert!(table.release_chain(head).is_err());
        assert_eq!(table.entry(head), Some(tail));
    }

    #[test]
    fn test_invalid_link() {
        let mut table = AllocationTable::new(&Geometry::default());
        let head = table.allocate().unwrap();
        table.set_raw(TableCopy::Primary, head, FREE_CLUSTER);
        table.set_raw(TableCopy::Mirror, head, FREE_CLUSTER);

        assert!(matches!(
            table.chain(head),
            Err(FsError::InvalidCluster(0))
        ));
        assert!(matches!(
            table.extend_chain(1),
            Err(FsError::InvalidCluster(1))
        ));
    }

    #[test]
    fn test_empty_chain() {
        let table = AllocationTable::new(&Geometry::default());
        assert!(table.chain(END_OF_CHAIN).unwrap().is_empty());
        assert!(table.validate_chain(END_OF_CHAIN).is_ok());
    }

    #[test]
    fn test_bytes_round_trip() {
        let geometry = Geometry::default();
        let mut table = AllocationTable::new(&geometry);
        let head = table.allocate().unwrap();
        table.extend_chain(head).unwrap();

        let primary = table.to_bytes(TableCopy::Primary);
        assert_eq!(primary.len(), geometry.table_bytes());
        assert_eq!(&primary[4..6], &[3, 0]);
        assert_eq!(&primary[6..8], &[0xFF, 0xFF]);

        let mirror = table.to_bytes(TableCopy::Mirror);
        let decoded = AllocationTable::from_bytes(&primary, &mirror, &geometry);
        assert_eq!(decoded, table);
    }
}
