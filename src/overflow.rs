//! Overflow chain traversal

use crate::block::{Block, OverflowLink};
use crate::error::{IsamError, Result};
use crate::file::IndexedFile;
use crate::io::BlockStore;

/// Lazy walk over one overflow chain
///
/// Yields `(overflow_index, block)` in link order until the `None`
/// terminator. A chain longer than the overflow zone must loop, so the walk
/// reports a corrupt block and stops instead of spinning.
pub struct OverflowChain<'a, S: BlockStore> {
    file: &'a IndexedFile<S>,
    start: OverflowLink,
    next: OverflowLink,
    hops: u32,
    failed: bool,
}

impl<'a, S: BlockStore> OverflowChain<'a, S> {
    /// Start over from the first block of the chain
    pub fn rewind(&mut self) {
        self.next = self.start;
        self.hops = 0;
        self.failed = false;
    }
}

impl<'a, S: BlockStore> Iterator for OverflowChain<'a, S> {
    type Item = Result<(u32, Block)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let OverflowLink::Block(local) = self.next else {
            return None;
        };

        self.hops += 1;
        if self.hops > self.file.header().overflow_blocks {
            self.failed = true;
            return Some(Err(IsamError::CorruptBlock {
                index: self.file.header().overflow_index(local),
                reason: format!(
                    "overflow chain longer than the {}-block overflow zone",
                    self.file.header().overflow_blocks
                ),
            }));
        }

        match self.file.overflow_block(local) {
            Ok(block) => {
                self.next = block.overflow;
                Some(Ok((local, block)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl<S: BlockStore> IndexedFile<S> {
    /// Walk the overflow chain starting at `link`
    pub fn overflow_chain(&self, link: OverflowLink) -> OverflowChain<'_, S> {
        OverflowChain {
            file: self,
            start: link,
            next: link,
            hops: 0,
            failed: false,
        }
    }
}
