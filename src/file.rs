//! Open indexed file handle
//!
//! [`IndexedFile`] owns one [`BlockStore`] and the in-memory mirror of the
//! [`FileHeader`]. Every operation goes through the handle; block contents
//! are re-read on each access and never cached.

use crate::block::{Block, OverflowLink};
use crate::config::{FileConfig, Geometry, KeyRangeMode};
use crate::error::{IsamError, Result};
use crate::header::{FileHeader, HEADER_SIZE};
use crate::io::{BlockStore, DiskStore, MemoryStore};
use crate::locate::LocateResult;
use crate::record::{display_key, Marker, Record};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Which zone a block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Primary,
    Overflow,
}

/// Physical location of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RecordPosition {
    pub zone: Zone,
    /// Absolute block index
    pub block: u64,
    pub slot: usize,
}

impl RecordPosition {
    pub fn primary(block: u64, slot: usize) -> Self {
        RecordPosition {
            zone: Zone::Primary,
            block,
            slot,
        }
    }

    pub fn overflow(block: u64, slot: usize) -> Self {
        RecordPosition {
            zone: Zone::Overflow,
            block,
            slot,
        }
    }
}

/// Header counters plus geometry, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub primary_blocks: u32,
    pub overflow_blocks: u32,
    pub total_records: u32,
    pub capacity: usize,
    pub block_size: usize,
    pub file_bytes: u64,
}

/// An open indexed sequential file
pub struct IndexedFile<S: BlockStore = DiskStore> {
    /// Block storage; locked only so that read operations can take `&self`
    store: Mutex<S>,

    /// In-memory header mirror
    header: FileHeader,

    config: FileConfig,
}

impl IndexedFile<DiskStore> {
    /// Create (or truncate) a file on disk with an empty header
    pub fn create<P: AsRef<Path>>(path: P, config: FileConfig) -> Result<Self> {
        config.validate()?;
        info!("Creating indexed file at {:?}", path.as_ref());
        let store = DiskStore::create(path, config.geometry.block_size())?;
        Self::with_store(store, config)
    }

    /// Open an existing file on disk
    pub fn open<P: AsRef<Path>>(path: P, config: FileConfig) -> Result<Self> {
        config.validate()?;
        info!("Opening indexed file at {:?}", path.as_ref());
        let store = DiskStore::open(path, config.geometry.block_size())?;
        Self::from_store(store, config)
    }
}

impl IndexedFile<MemoryStore> {
    /// Create an empty in-memory file
    pub fn in_memory(config: FileConfig) -> Result<Self> {
        config.validate()?;
        Self::with_store(MemoryStore::new(config.geometry.block_size()), config)
    }
}

impl<S: BlockStore> IndexedFile<S> {
    /// Start a new file on `store`, writing an all-zero header
    ///
    /// The store must not hold any blocks yet.
    pub fn with_store(mut store: S, config: FileConfig) -> Result<Self> {
        Self::check_store(&store, &config)?;
        if store.block_count() != 0 {
            return Err(IsamError::InvalidArgument(format!(
                "store already holds {} blocks",
                store.block_count()
            )));
        }

        let header = FileHeader::new();
        store.write_header(&header)?;

        Ok(IndexedFile {
            store: Mutex::new(store),
            header,
            config,
        })
    }

    /// Attach to a store that already holds a file
    pub fn from_store(mut store: S, config: FileConfig) -> Result<Self> {
        Self::check_store(&store, &config)?;

        let header = store.read_header()?;
        if header.total_blocks() > store.block_count() {
            return Err(IsamError::CorruptHeader(format!(
                "header addresses {} blocks but the store holds {}",
                header.total_blocks(),
                store.block_count()
            )));
        }
        if header.total_blocks() < store.block_count() {
            warn!(
                "Store holds {} trailing blocks past the {} the header addresses",
                store.block_count() - header.total_blocks(),
                header.total_blocks()
            );
        }

        debug!(
            "Loaded header: {} primary, {} overflow, {} records",
            header.primary_blocks, header.overflow_blocks, header.total_records
        );

        Ok(IndexedFile {
            store: Mutex::new(store),
            header,
            config,
        })
    }

    fn check_store(store: &S, config: &FileConfig) -> Result<()> {
        config.validate()?;
        if store.block_size() != config.geometry.block_size() {
            return Err(IsamError::InvalidGeometry(format!(
                "store block size {} does not match geometry block size {}",
                store.block_size(),
                config.geometry.block_size()
            )));
        }
        Ok(())
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn geometry(&self) -> &Geometry {
        &self.config.geometry
    }

    pub fn key_range_mode(&self) -> KeyRangeMode {
        self.config.key_range
    }

    /// Path of the backing file, if disk-backed
    pub fn path(&self) -> Option<std::path::PathBuf> {
        self.store.lock().path().map(Path::to_path_buf)
    }

    pub fn stats(&self) -> FileStats {
        let geometry = self.geometry();
        FileStats {
            primary_blocks: self.header.primary_blocks,
            overflow_blocks: self.header.overflow_blocks,
            total_records: self.header.total_records,
            capacity: geometry.capacity,
            block_size: geometry.block_size(),
            file_bytes: geometry.block_offset(self.header.total_blocks()),
        }
    }

    /// Read and decode the block at an absolute index
    pub fn read_block(&self, index: u64) -> Result<Block> {
        if index >= self.header.total_blocks() {
            return Err(IsamError::BlockOutOfRange {
                index,
                count: self.header.total_blocks(),
            });
        }
        let bytes = self.store.lock().read_block(index)?;
        Block::from_bytes(index, &bytes, self.geometry())
    }

    pub fn primary_block(&self, index: u32) -> Result<Block> {
        if index >= self.header.primary_blocks {
            return Err(IsamError::BlockOutOfRange {
                index: index as u64,
                count: self.header.primary_blocks as u64,
            });
        }
        self.read_block(index as u64)
    }

    /// Read an overflow block by its overflow-zone index
    pub fn overflow_block(&self, local: u32) -> Result<Block> {
        if local >= self.header.overflow_blocks {
            return Err(IsamError::BlockOutOfRange {
                index: self.header.overflow_index(local),
                count: self.header.total_blocks(),
            });
        }
        self.read_block(self.header.overflow_index(local))
    }

    /// Encode and write a block; the index may be at most one past the
    /// current end of the store
    pub(crate) fn write_block(&mut self, index: u64, block: &Block) -> Result<()> {
        let bytes = block.to_bytes(&self.config.geometry)?;
        self.store.get_mut().write_block(index, &bytes)
    }

    pub(crate) fn header_mut(&mut self) -> &mut FileHeader {
        &mut self.header
    }

    pub(crate) fn write_header(&mut self) -> Result<()> {
        let header = self.header;
        self.store.get_mut().write_header(&header)
    }

    /// Write the header mirror and sync the store
    pub fn flush(&mut self) -> Result<()> {
        debug!("Flushing indexed file header");
        self.write_header()?;
        self.store.get_mut().sync()
    }

    /// Close the file, flushing the header
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        info!(
            "Closed indexed file: {} primary, {} overflow, {} records",
            self.header.primary_blocks, self.header.overflow_blocks, self.header.total_records
        );
        Ok(())
    }

    /// Flush and hand back the underlying store
    pub fn into_store(mut self) -> Result<S> {
        self.flush()?;
        Ok(self.store.into_inner())
    }

    /// Insert an active record
    ///
    /// Reuses the slot of a logically deleted record with the same key.
    /// Otherwise the record goes into the primary block the declared-range
    /// search ends on, in key order, or into that block's overflow chain
    /// when the block is full.
    pub fn insert(&mut self, record: Record) -> Result<RecordPosition> {
        let geometry = *self.geometry();
        if record.key.len() != geometry.key_len || record.payload.len() != geometry.payload_len {
            return Err(IsamError::InvalidArgument(format!(
                "record shape {}+{} does not match geometry {}+{}",
                record.key.len(),
                record.payload.len(),
                geometry.key_len,
                geometry.payload_len
            )));
        }
        let record = Record {
            marker: Marker::Active,
            ..record
        };
        debug!("Inserting {}", record.key_str());

        if let Some((position, existing)) = self.lookup(&record.key)? {
            if existing.is_active() {
                return Err(IsamError::DuplicateKey(display_key(&record.key)));
            }
            let mut block = self.read_block(position.block)?;
            block.records[position.slot] = record;
            self.write_block(position.block, &block)?;
            return self.record_added(position);
        }

        if self.header.primary_blocks == 0 {
            self.write_block(0, &Block::with_records(vec![record]))?;
            self.header.primary_blocks = 1;
            return self.record_added(RecordPosition::primary(0, 0));
        }

        let target = match self.locate_with(&record.key, KeyRangeMode::Declared)? {
            LocateResult::NotFound { block } => block,
            LocateResult::Found { .. } => {
                return Err(IsamError::DuplicateKey(display_key(&record.key)))
            }
        };

        let mut block = self.primary_block(target)?;
        if !block.is_full(&geometry) {
            let slot = match block
                .records
                .binary_search_by(|r| r.key.as_slice().cmp(record.key.as_slice()))
            {
                Ok(_) => return Err(IsamError::DuplicateKey(display_key(&record.key))),
                Err(slot) => slot,
            };
            block.records.insert(slot, record);
            self.write_block(target as u64, &block)?;
            return self.record_added(RecordPosition::primary(target as u64, slot));
        }

        self.append_to_chain(target, block, record)
    }

    /// Append to the first non-full block of `primary`'s chain, allocating a
    /// new overflow block at the end of the zone when every block is full
    fn append_to_chain(
        &mut self,
        primary_index: u32,
        mut primary: Block,
        record: Record,
    ) -> Result<RecordPosition> {
        let geometry = *self.geometry();
        let mut link = primary.overflow;
        let mut tail: Option<(u32, Block)> = None;
        let mut hops = 0u32;

        while let OverflowLink::Block(local) = link {
            hops += 1;
            if hops > self.header.overflow_blocks {
                return Err(IsamError::CorruptBlock {
                    index: primary_index as u64,
                    reason: "overflow chain contains a cycle".to_string(),
                });
            }

            let index = self.header.overflow_index(local);
            let mut block = self.overflow_block(local)?;
            if !block.is_full(&geometry) {
                let slot = block.len();
                block.records.push(record);
                self.write_block(index, &block)?;
                return self.record_added(RecordPosition::overflow(index, slot));
            }

            link = block.overflow;
            tail = Some((local, block));
        }

        let local = self.header.overflow_blocks;
        let index = self.header.overflow_index(local);
        debug!(
            "Allocating overflow block {} (absolute {}) for primary block {}",
            local, index, primary_index
        );
        self.write_block(index, &Block::with_records(vec![record]))?;

        match tail {
            Some((tail_local, mut tail_block)) => {
                tail_block.overflow = OverflowLink::Block(local);
                self.write_block(self.header.overflow_index(tail_local), &tail_block)?;
            }
            None => {
                primary.overflow = OverflowLink::Block(local);
                self.write_block(primary_index as u64, &primary)?;
            }
        }

        self.header.overflow_blocks += 1;
        self.record_added(RecordPosition::overflow(index, 0))
    }

    fn record_added(&mut self, position: RecordPosition) -> Result<RecordPosition> {
        self.header.total_records += 1;
        self.write_header()?;
        Ok(position)
    }

    /// Mark a record as logically deleted
    ///
    /// The record stays in place until the next reorganization.
    pub fn delete(&mut self, key: &[u8]) -> Result<RecordPosition> {
        debug!("Deleting {}", String::from_utf8_lossy(key));

        let position = match self.lookup(key)? {
            Some((position, record)) if record.is_active() => position,
            _ => return Err(IsamError::KeyNotFound(String::from_utf8_lossy(key).into_owned())),
        };

        let mut block = self.read_block(position.block)?;
        block.records[position.slot].marker = Marker::Deleted;
        self.write_block(position.block, &block)?;

        self.header.total_records = self.header.total_records.saturating_sub(1);
        self.write_header()?;

        Ok(position)
    }

    /// Iterate every block in raw absolute order, primary zone then overflow
    pub fn raw_blocks(&self) -> impl Iterator<Item = Result<(u64, Block)>> + '_ {
        (0..self.header.total_blocks())
            .map(move |index| self.read_block(index).map(|block| (index, block)))
    }

    /// Byte length implied by the header
    pub fn expected_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.header.total_blocks() * self.geometry().block_size() as u64
    }
}
