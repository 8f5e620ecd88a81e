//! Reorganization and bulk loading
//!
//! Both build a primary zone by packing records into blocks of
//! `floor(fill_rate * capacity)` records. Reorganization feeds the packer
//! with every active record of the source in raw block order: primary zone
//! first, then the overflow zone by index. That scan is not chain-aware and
//! relies on the overflow zone sitting directly after the primary zone, which
//! holds for every file this crate writes. The output is key-sorted only when
//! the source has no overflow records.

use crate::block::Block;
use crate::error::{IsamError, Result};
use crate::file::IndexedFile;
use crate::io::{BlockStore, DiskStore};
use crate::record::{display_key, Record};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of a reorganization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReorgStats {
    /// Records per destination block (all but possibly the last)
    pub fill_limit: usize,
    pub blocks_scanned: u64,
    pub records_scanned: u64,
    /// Active records written to the destination
    pub records_copied: u64,
    /// Logically deleted records left behind
    pub records_dropped: u64,
    /// Destination primary zone size
    pub primary_blocks: u32,
}

/// Outcome of a bulk load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub fill_limit: usize,
    pub records_loaded: u64,
    pub primary_blocks: u32,
}

/// Records per block for a fill rate in `(0, 1]`
pub fn fill_limit(fill_rate: f64, capacity: usize) -> Result<usize> {
    if !fill_rate.is_finite() || fill_rate <= 0.0 || fill_rate > 1.0 {
        return Err(IsamError::InvalidArgument(format!(
            "fill rate {} outside (0, 1]",
            fill_rate
        )));
    }

    let limit = (fill_rate * capacity as f64).floor() as usize;
    if limit == 0 {
        return Err(IsamError::InvalidArgument(format!(
            "fill rate {} leaves no room in a {}-record block",
            fill_rate, capacity
        )));
    }

    Ok(limit)
}

/// Accumulates records and appends them as primary blocks
struct BlockPacker {
    fill_limit: usize,
    buffer: Vec<Record>,
}

impl BlockPacker {
    fn new(fill_limit: usize) -> Self {
        BlockPacker {
            fill_limit,
            buffer: Vec::with_capacity(fill_limit),
        }
    }

    fn push<D: BlockStore>(&mut self, record: Record, dest: &mut IndexedFile<D>) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() == self.fill_limit {
            self.flush(dest)?;
        }
        Ok(())
    }

    /// Write the buffer as the next primary block, if non-empty
    fn flush<D: BlockStore>(&mut self, dest: &mut IndexedFile<D>) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let index = dest.header().primary_blocks;
        let active = self.buffer.iter().filter(|r| r.is_active()).count() as u32;
        let block = Block::with_records(std::mem::take(&mut self.buffer));
        dest.write_block(index as u64, &block)?;

        let header = dest.header_mut();
        header.primary_blocks += 1;
        header.total_records += active;
        Ok(())
    }
}

impl<S: BlockStore> IndexedFile<S> {
    /// Compact the active records into a new file at `dest`
    ///
    /// Any existing file at `dest` is truncated. The source is only read. On
    /// failure the destination may be left partially written and should be
    /// discarded by the caller.
    pub fn reorganize<P: AsRef<Path>>(&self, dest: P, fill_rate: f64) -> Result<ReorgStats> {
        let dest = dest.as_ref();
        fill_limit(fill_rate, self.geometry().capacity)?;

        if let Some(source) = self.path() {
            let same = match (std::fs::canonicalize(&source), std::fs::canonicalize(dest)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
            if same {
                return Err(IsamError::InvalidArgument(format!(
                    "destination {:?} is the source file",
                    dest
                )));
            }
        }

        info!("Reorganizing into {:?} at fill rate {}", dest, fill_rate);
        let store = DiskStore::create(dest, self.geometry().block_size())?;
        let (dest_file, stats) = self.reorganize_into(store, fill_rate)?;
        dest_file.close()?;
        Ok(stats)
    }

    /// Compact the active records into a fresh file on `store`
    pub fn reorganize_into<D: BlockStore>(
        &self,
        store: D,
        fill_rate: f64,
    ) -> Result<(IndexedFile<D>, ReorgStats)> {
        let limit = fill_limit(fill_rate, self.geometry().capacity)?;
        let mut dest = IndexedFile::with_store(store, *self.config())?;
        let mut packer = BlockPacker::new(limit);
        let mut stats = ReorgStats {
            fill_limit: limit,
            ..ReorgStats::default()
        };

        for entry in self.raw_blocks() {
            let (index, block) = entry?;
            stats.blocks_scanned += 1;
            debug!("Reorganize: scanning block {} ({} records)", index, block.len());

            for record in block.records {
                stats.records_scanned += 1;
                if record.is_active() {
                    packer.push(record, &mut dest)?;
                    stats.records_copied += 1;
                } else {
                    stats.records_dropped += 1;
                }
            }
        }

        packer.flush(&mut dest)?;
        dest.header_mut().overflow_blocks = 0;
        dest.flush()?;

        stats.primary_blocks = dest.header().primary_blocks;
        info!(
            "Reorganization complete: {} records in {} blocks ({} dropped)",
            stats.records_copied, stats.primary_blocks, stats.records_dropped
        );

        Ok((dest, stats))
    }

    /// Build the primary zone of an empty file from strictly ascending records
    pub fn load_sorted<I>(&mut self, records: I, fill_rate: f64) -> Result<LoadStats>
    where
        I: IntoIterator<Item = Record>,
    {
        if self.header().total_blocks() != 0 {
            return Err(IsamError::InvalidArgument(format!(
                "bulk load needs an empty file, this one has {} blocks",
                self.header().total_blocks()
            )));
        }

        let geometry = *self.geometry();
        let limit = fill_limit(fill_rate, geometry.capacity)?;
        let mut packer = BlockPacker::new(limit);
        let mut previous: Option<Vec<u8>> = None;
        let mut loaded = 0u64;

        for record in records {
            if record.key.len() != geometry.key_len || record.payload.len() != geometry.payload_len {
                return Err(IsamError::InvalidArgument(format!(
                    "record shape {}+{} does not match geometry {}+{}",
                    record.key.len(),
                    record.payload.len(),
                    geometry.key_len,
                    geometry.payload_len
                )));
            }
            if let Some(prev) = &previous {
                if record.key <= *prev {
                    return Err(IsamError::UnsortedInput {
                        previous: display_key(prev),
                        next: display_key(&record.key),
                    });
                }
            }
            previous = Some(record.key.clone());

            packer.push(record, self)?;
            loaded += 1;
        }

        packer.flush(self)?;
        self.flush()?;

        let stats = LoadStats {
            fill_limit: limit,
            records_loaded: loaded,
            primary_blocks: self.header().primary_blocks,
        };
        info!(
            "Loaded {} records into {} primary blocks",
            stats.records_loaded, stats.primary_blocks
        );
        Ok(stats)
    }
}
