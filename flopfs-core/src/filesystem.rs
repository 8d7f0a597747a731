//! Filesystem facade.
//!
//! `FileSystem` owns the block device together with the in-memory images of
//! both allocation tables, the current directory and the file session. Every
//! operation that mutates the tables or the directory ends with a flush of all
//! three metadata regions.

use std::collections::HashSet;

use log::{debug, error, info, warn};

use crate::config::{FsConfig, GrowthPolicy};
use crate::device::BlockDevice;
use crate::directory::{pad_name, DirEntry, Directory};
use crate::error::{DeviceResult, FsError, FsResult};
use crate::layout::{Geometry, CLUSTER_SIZE, END_OF_CHAIN, FIRST_DATA_CLUSTER, FREE_CLUSTER};
use crate::session::{FileSession, OpenFile};
use crate::table::{AllocationTable, TableCopy};

/// A file whose chain failed verification.
#[derive(Debug)]
pub struct DamagedFile {
    pub filename: String,
    pub error: FsError,
}

/// Result of a full consistency check.
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Clusters whose primary and mirror entries differ.
    pub mismatches: Vec<u16>,
    /// Files whose chain is broken, cyclic or disagrees between the copies.
    pub damaged: Vec<DamagedFile>,
    /// Allocated clusters no intact file chain reaches.
    pub orphaned: Vec<u16>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.damaged.is_empty() && self.orphaned.is_empty()
    }
}

/// A mounted volume.
pub struct FileSystem<D: BlockDevice> {
    device: D,
    config: FsConfig,
    table: AllocationTable,
    directory: Directory,
    session: FileSession,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Write an empty filesystem: blank tables in both copies and an empty
    /// directory. Data sectors are left as they are.
    pub fn format(device: &mut D, config: &FsConfig) -> FsResult<()> {
        let geometry = config.geometry;
        check_device(&geometry, device)?;

        let table = AllocationTable::new(&geometry);
        device.write_sector(config.drive, geometry.table_start, &table.to_bytes(TableCopy::Primary))?;
        device.write_sector(config.drive, geometry.mirror_start, &table.to_bytes(TableCopy::Mirror))?;
        device.write_sector(
            config.drive,
            geometry.directory_start,
            &vec![0u8; geometry.directory_bytes()],
        )?;

        info!(
            "fs: formatted {} sectors ({} data clusters, {} directory slots)",
            geometry.total_sectors,
            geometry.max_file_clusters(),
            geometry.directory_capacity()
        );
        Ok(())
    }

    /// Load both table copies and the root directory from `device`.
    pub fn init(mut device: D, config: FsConfig) -> FsResult<Self> {
        let geometry = config.geometry;
        check_device(&geometry, &device)?;

        let mut primary = vec![0u8; geometry.table_bytes()];
        device.read_sector(config.drive, geometry.table_start, &mut primary)?;
        let mut mirror = vec![0u8; geometry.table_bytes()];
        device.read_sector(config.drive, geometry.mirror_start, &mut mirror)?;
        let table = AllocationTable::from_bytes(&primary, &mirror, &geometry);

        let mut region = vec![0u8; geometry.directory_bytes()];
        device.read_sector(config.drive, geometry.directory_start, &mut region)?;
        let directory = Directory::root(region);

        info!(
            "fs: mounted drive {} ({} files, {} free clusters)",
            config.drive,
            directory.entries().count(),
            table.free_count()
        );

        Ok(Self {
            device,
            config,
            table,
            directory,
            session: FileSession::Closed,
        })
    }

    /// Open a file and stage its data in memory.
    pub fn open(&mut self, name: &str, ext: &str) -> FsResult<()> {
        if self.session.is_open() {
            return Err(FsError::AlreadyOpen);
        }

        let (name, ext) = pad_name(name, ext);
        let (slot, entry) = self
            .directory
            .find_entry(&name, &ext)
            .ok_or(FsError::NotFound)?;

        self.table.validate_chain(entry.starting_cluster)?;
        let chain = self.table.chain(entry.starting_cluster)?;

        let mut buffer = vec![0u8; chain.len() * CLUSTER_SIZE];
        for (cluster, data) in chain.iter().zip(buffer.chunks_mut(CLUSTER_SIZE)) {
            self.device.read_sector(
                self.config.drive,
                self.config.geometry.cluster_sector(*cluster),
                data,
            )?;
        }

        if entry.file_size as usize > buffer.len() {
            warn!(
                "fs: {} claims {} bytes but its chain holds {}",
                entry.filename(),
                entry.file_size,
                buffer.len()
            );
            return Err(FsError::SizeExceedsChain {
                size: entry.file_size,
                capacity: buffer.len(),
            });
        }

        debug!(
            "fs: opened {} ({} bytes, {} clusters)",
            entry.filename(),
            entry.file_size,
            chain.len()
        );
        let max_bytes = self.table.max_chain_len() * CLUSTER_SIZE;
        self.session
            .begin(OpenFile::new(slot, entry, chain, buffer, max_bytes))
    }

    /// Create a one-cluster file. The file is not opened.
    pub fn create(&mut self, name: &str, ext: &str) -> FsResult<()> {
        if self.session.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        if name.is_empty() || name.as_bytes()[0] == 0 {
            return Err(FsError::InvalidName);
        }

        let (name, ext) = pad_name(name, ext);
        if self.directory.find_entry(&name, &ext).is_some() {
            return Err(FsError::FileExists);
        }
        let slot = self.directory.find_free_slot()?;
        let cluster = self.table.allocate()?;

        let zeroed = [0u8; CLUSTER_SIZE];
        let sector = self.config.geometry.cluster_sector(cluster);
        if let Err(e) = self.device.write_sector(self.config.drive, sector, &zeroed) {
            self.table.release_chain(cluster)?;
            return Err(e.into());
        }

        let entry = DirEntry::new(name, ext, CLUSTER_SIZE as u32, cluster);
        self.directory.write_entry(slot, &entry);
        if let Err(e) = self.flush_metadata() {
            self.directory.erase_entry(slot);
            self.table.release_chain(cluster)?;
            return Err(e);
        }

        info!("fs: created {} at cluster {}", entry.filename(), cluster);
        Ok(())
    }

    /// Commit the open file: grow its chain, write every cluster, flush the
    /// metadata and close the session.
    ///
    /// On failure the session stays open and `close` can be retried.
    pub fn close(&mut self) -> FsResult<()> {
        let drive = self.config.drive;
        let geometry = self.config.geometry;
        let file = self.session.file_mut()?;

        grow_chain(&mut self.table, file, self.config.growth)?;

        let committed = file.chain.len() * CLUSTER_SIZE;
        if file.buffer.len() < committed {
            file.buffer.resize(committed, 0);
        }
        for (cluster, data) in file.chain.iter().zip(file.buffer.chunks(CLUSTER_SIZE)) {
            self.device
                .write_sector(drive, geometry.cluster_sector(*cluster), data)?;
        }

        let (slot, entry) = (file.slot, file.entry);
        self.directory.write_entry(slot, &entry);
        self.flush_metadata()?;
        self.session.end();

        info!("fs: closed {} ({} bytes)", entry.filename(), entry.file_size);
        Ok(())
    }

    /// Delete the open file: free its chain, erase its entry and close the
    /// session.
    ///
    /// If the flush fails the table and the entry are restored and the
    /// session stays open.
    pub fn delete(&mut self) -> FsResult<()> {
        let entry = *self.session.file()?.entry();

        let (slot, stored) = self
            .directory
            .find_entry(&entry.name, &entry.ext)
            .ok_or(FsError::NotFound)?;

        let saved_table = self.table.clone();
        let released = if entry.starting_cluster == END_OF_CHAIN {
            0
        } else {
            self.table.release_chain(entry.starting_cluster)?
        };
        self.directory.erase_entry(slot);
        if let Err(e) = self.flush_metadata() {
            self.table = saved_table;
            self.directory.write_entry(slot, &stored);
            return Err(e);
        }
        self.session.end();

        info!("fs: deleted {} ({} clusters freed)", entry.filename(), released);
        Ok(())
    }

    /// Byte at `index` of the open file.
    pub fn read_byte(&mut self, index: u32) -> FsResult<u8> {
        self.session.read(index)
    }

    /// Byte at the cursor of the open file.
    pub fn read_next_byte(&mut self) -> FsResult<u8> {
        self.session.read_next()
    }

    /// Write `byte` at `index` of the open file (in memory until `close`).
    pub fn write_byte(&mut self, byte: u8, index: u32) -> FsResult<()> {
        self.session.write(byte, index)
    }

    /// Write `byte` at the cursor.
    pub fn write_next_byte(&mut self, byte: u8) -> FsResult<()> {
        self.session.write_next(byte)
    }

    /// Write `byte` `count` times at the cursor.
    pub fn write_bytes(&mut self, byte: u8, count: u32) -> FsResult<()> {
        self.session.write_many(byte, count)
    }

    /// Write `data` sequentially at the cursor.
    pub fn write_all(&mut self, data: &[u8]) -> FsResult<()> {
        data.iter().try_for_each(|&byte| self.session.write_next(byte))
    }

    /// In-use directory entries in slot order.
    pub fn list(&self) -> Vec<DirEntry> {
        self.directory.entries().map(|(_, entry)| entry).collect()
    }

    /// Compare both table copies in full and check every file's chain.
    pub fn verify(&self) -> VerifyReport {
        let mut report = VerifyReport {
            mismatches: self.table.mismatches(),
            ..Default::default()
        };

        let mut reachable = HashSet::new();
        for (_, entry) in self.directory.entries() {
            let checked = self
                .table
                .validate_chain(entry.starting_cluster)
                .and_then(|_| self.table.chain(entry.starting_cluster));
            match checked {
                Ok(chain) => reachable.extend(chain),
                Err(error) => report.damaged.push(DamagedFile {
                    filename: entry.filename(),
                    error,
                }),
            }
        }

        report.orphaned = (FIRST_DATA_CLUSTER..)
            .take(self.table.max_chain_len())
            .filter(|c| self.table.entry(*c).is_some_and(|e| e != FREE_CLUSTER))
            .filter(|c| !reachable.contains(c))
            .collect();

        if !report.is_clean() {
            warn!(
                "fs: verify found {} mismatches, {} damaged files, {} orphaned clusters",
                report.mismatches.len(),
                report.damaged.len(),
                report.orphaned.len()
            );
        }
        report
    }

    /// Copy one table over the other and flush both.
    ///
    /// This is the only repair path; nothing calls it implicitly.
    pub fn restore_mirror(&mut self, source: TableCopy) -> FsResult<()> {
        warn!("fs: restoring allocation tables from {:?} copy", source);
        self.table.restore_from(source);
        self.flush_metadata()
    }

    fn flush_metadata(&mut self) -> FsResult<()> {
        if self.config.validate_on_flush {
            if let Some(&cluster) = self.table.mismatches().first() {
                error!("fs: refusing to flush, table copies differ at cluster {}", cluster);
                return Err(FsError::Corrupted(cluster));
            }
        }

        match self.write_metadata() {
            Ok(()) => {
                debug!("fs: flushed tables and directory");
                Ok(())
            }
            Err(e) => {
                error!("fs: metadata flush failed: {}", e);
                Err(e.into())
            }
        }
    }

    fn write_metadata(&mut self) -> DeviceResult<()> {
        let drive = self.config.drive;
        let geometry = self.config.geometry;
        self.device.write_sector(
            drive,
            geometry.table_start,
            &self.table.to_bytes(TableCopy::Primary),
        )?;
        self.device.write_sector(
            drive,
            geometry.mirror_start,
            &self.table.to_bytes(TableCopy::Mirror),
        )?;
        self.device
            .write_sector(drive, geometry.directory_start, self.directory.as_bytes())
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// The open file, if any.
    pub fn open_file(&self) -> Option<&OpenFile> {
        self.session.file().ok()
    }

    pub fn session(&self) -> &FileSession {
        &self.session
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Unmount, handing back the device. An open file is not committed.
    pub fn into_device(self) -> D {
        self.device
    }
}

fn check_device<D: BlockDevice>(geometry: &Geometry, device: &D) -> FsResult<()> {
    geometry.validate()?;
    if device.sector_count() < geometry.total_sectors {
        return Err(FsError::InvalidGeometry(format!(
            "device has {} sectors, geometry needs {}",
            device.sector_count(),
            geometry.total_sectors
        )));
    }
    Ok(())
}

/// Extend the open file's chain to cover its size, as far as `policy` allows.
///
/// Clusters added here are released again if allocation fails partway.
fn grow_chain(table: &mut AllocationTable, file: &mut OpenFile, policy: GrowthPolicy) -> FsResult<()> {
    let current = file.chain.len();
    let needed = file.clusters_needed();
    if needed <= current {
        return Ok(());
    }

    let wanted = match policy {
        GrowthPolicy::Exact => needed - current,
        GrowthPolicy::OneClusterPerClose => 1,
    };

    for _ in 0..wanted {
        let allocated = match file.chain.last() {
            Some(&tail) => table.extend_chain(tail),
            None => table.allocate(),
        };
        match allocated {
            Ok(cluster) => file.chain.push(cluster),
            Err(e) => {
                match file.chain.get(..current).and_then(|kept| kept.last()) {
                    Some(&tail) => {
                        table.truncate_after(tail)?;
                    }
                    None => {
                        if let Some(&head) = file.chain.first() {
                            table.release_chain(head)?;
                        }
                    }
                }
                file.chain.truncate(current);
                warn!("fs: cannot grow {}: {}", file.entry.filename(), e);
                return Err(e);
            }
        }
    }

    if current == 0 {
        file.entry.starting_cluster = file.chain[0];
    }

    let capacity = file.chain.len() * CLUSTER_SIZE;
    if file.entry.file_size as usize > capacity {
        warn!(
            "fs: one-cluster growth drops {} bytes of {}",
            file.entry.file_size as usize - capacity,
            file.entry.filename()
        );
        file.entry.file_size = capacity as u32;
    }
    debug!(
        "fs: {} grew from {} to {} clusters",
        file.entry.filename(),
        current,
        file.chain.len()
    );
    Ok(())
}
