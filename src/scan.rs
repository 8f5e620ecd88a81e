//! Interval listing
//!
//! [`IndexedFile::list`] walks the primary zone in block order and, after
//! each block's matching slots, that block's overflow chain in link order.
//! The output is therefore only globally sorted when every chain is empty.
//! Logically deleted records are listed as well; [`IndexedFile::list_active`]
//! is the variant that drops them.

use crate::block::Block;
use crate::error::{IsamError, Result};
use crate::file::{IndexedFile, RecordPosition};
use crate::io::BlockStore;
use crate::overflow::OverflowChain;
use crate::record::Record;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

/// A listed record and where it was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEntry {
    pub position: RecordPosition,
    pub record: Record,
}

/// Lazy interval scan; see [`IndexedFile::list`]
pub struct RangeScan<'a, S: BlockStore> {
    file: &'a IndexedFile<S>,
    low: Vec<u8>,
    high: Vec<u8>,
    active_only: bool,
    next_primary: u32,
    chain: Option<OverflowChain<'a, S>>,
    pending: VecDeque<ScanEntry>,
    done: bool,
}

impl<'a, S: BlockStore> RangeScan<'a, S> {
    /// Start over from primary block 0
    pub fn rewind(&mut self) {
        self.next_primary = 0;
        self.chain = None;
        self.pending.clear();
        self.done = false;
    }

    fn queue_matches(&mut self, block: Block, make_position: impl Fn(usize) -> RecordPosition) {
        for (slot, record) in block.records.into_iter().enumerate() {
            if record.key < self.low || record.key > self.high {
                continue;
            }
            if self.active_only && !record.is_active() {
                continue;
            }
            self.pending.push_back(ScanEntry {
                position: make_position(slot),
                record,
            });
        }
    }

    /// Read the next block of the walk and queue its matches
    fn advance(&mut self) -> Result<()> {
        let header = *self.file.header();

        match self.chain.as_mut().and_then(|chain| chain.next()) {
            Some(entry) => {
                let (local, block) = entry?;
                let index = header.overflow_index(local);
                self.queue_matches(block, |slot| RecordPosition::overflow(index, slot));
                return Ok(());
            }
            None => self.chain = None,
        }

        if self.next_primary >= header.primary_blocks {
            self.done = true;
            return Ok(());
        }

        let index = self.next_primary;
        let mut block = self.file.primary_block(index)?;
        self.next_primary += 1;
        self.chain = Some(self.file.overflow_chain(std::mem::take(&mut block.overflow)));
        self.queue_matches(block, |slot| RecordPosition::primary(index as u64, slot));
        Ok(())
    }
}

impl<'a, S: BlockStore> Iterator for RangeScan<'a, S> {
    type Item = Result<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.advance() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

impl<S: BlockStore> IndexedFile<S> {
    /// Records with `key_a <= key <= key_b`, deleted ones included
    pub fn list(&self, key_a: &[u8], key_b: &[u8]) -> Result<RangeScan<'_, S>> {
        self.range_scan(key_a, key_b, false)
    }

    /// Like [`list`](Self::list), skipping logically deleted records
    pub fn list_active(&self, key_a: &[u8], key_b: &[u8]) -> Result<RangeScan<'_, S>> {
        self.range_scan(key_a, key_b, true)
    }

    /// Collect [`list`](Self::list) into records
    pub fn list_records(&self, key_a: &[u8], key_b: &[u8]) -> Result<Vec<Record>> {
        self.list(key_a, key_b)?
            .map(|entry| entry.map(|e| e.record))
            .collect()
    }

    fn range_scan(&self, key_a: &[u8], key_b: &[u8], active_only: bool) -> Result<RangeScan<'_, S>> {
        let low = self.geometry().pad_key(key_a)?;
        let high = self.geometry().pad_key(key_b)?;
        if low > high {
            return Err(IsamError::InvalidArgument(format!(
                "empty interval: {} > {}",
                String::from_utf8_lossy(key_a),
                String::from_utf8_lossy(key_b)
            )));
        }

        debug!(
            "Listing [{}, {}]{}",
            String::from_utf8_lossy(key_a),
            String::from_utf8_lossy(key_b),
            if active_only { " (active only)" } else { "" }
        );

        Ok(RangeScan {
            file: self,
            low,
            high,
            active_only,
            next_primary: 0,
            chain: None,
            pending: VecDeque::new(),
            done: false,
        })
    }
}
