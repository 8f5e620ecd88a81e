//! Point lookup
//!
//! [`IndexedFile::locate`] is a binary search over the primary zone using
//! each visited block's key range, followed by a linear scan of the block that
//! covers the key. It never looks at overflow chains, so a key that only
//! lives in an overflow block is reported as `NotFound`.
//!
//! [`IndexedFile::lookup`] also searches overflow chains. Insertion only
//! widens a block's range inside the gap to its neighbours, so a record held
//! in the chain of block `b` is always reached from the block the search
//! ends on or one of its two neighbours.

use crate::config::KeyRangeMode;
use crate::error::Result;
use crate::file::{IndexedFile, RecordPosition};
use crate::io::BlockStore;
use crate::record::Record;
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome of a primary-zone search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocateResult {
    /// Key held by `slot` of primary block `block`
    Found { block: u32, slot: usize },
    /// Key absent from the primary zone; `block` is the last block visited,
    /// which is where an insertion keeps the zone ordered (0 when empty)
    NotFound { block: u32 },
}

impl LocateResult {
    pub fn is_found(&self) -> bool {
        matches!(self, LocateResult::Found { .. })
    }

    pub fn block(&self) -> u32 {
        match *self {
            LocateResult::Found { block, .. } | LocateResult::NotFound { block } => block,
        }
    }
}

impl<S: BlockStore> IndexedFile<S> {
    /// Search the primary zone using the configured key range mode
    pub fn locate(&self, key: &[u8]) -> Result<LocateResult> {
        self.locate_with(key, self.key_range_mode())
    }

    /// Search the primary zone with an explicit key range mode
    pub fn locate_with(&self, key: &[u8], mode: KeyRangeMode) -> Result<LocateResult> {
        let key = self.geometry().pad_key(key)?;

        let mut left = 0i64;
        let mut right = self.header().primary_blocks as i64 - 1;
        let mut visited = 0u32;

        while left <= right {
            let mid = left + (right - left) / 2;
            visited = mid as u32;
            let block = self.primary_block(visited)?;

            let Some((min, max)) = block.key_range(mode) else {
                warn!("Primary block {} is empty, ending search", visited);
                return Ok(LocateResult::NotFound { block: visited });
            };

            if key.as_slice() < min {
                right = mid - 1;
            } else if key.as_slice() > max {
                left = mid + 1;
            } else {
                let result = match block.find_slot(&key) {
                    Some(slot) => LocateResult::Found {
                        block: visited,
                        slot,
                    },
                    None => LocateResult::NotFound { block: visited },
                };
                debug!("Locate {}: {:?}", String::from_utf8_lossy(&key), result);
                return Ok(result);
            }
        }

        debug!(
            "Locate {}: no block range covers the key, last visited {}",
            String::from_utf8_lossy(&key),
            visited
        );
        Ok(LocateResult::NotFound { block: visited })
    }

    /// Find a record in the primary zone or in the overflow chains next to
    /// where the search ends; deleted records are returned as well
    pub fn lookup(&self, key: &[u8]) -> Result<Option<(RecordPosition, Record)>> {
        let key = self.geometry().pad_key(key)?;

        let block = match self.locate_with(&key, KeyRangeMode::Declared)? {
            LocateResult::Found { block, slot } => {
                let record = self.primary_block(block)?.records.swap_remove(slot);
                return Ok(Some((RecordPosition::primary(block as u64, slot), record)));
            }
            LocateResult::NotFound { block } => block,
        };

        let primary_blocks = self.header().primary_blocks;
        if primary_blocks == 0 {
            return Ok(None);
        }

        let first = block.saturating_sub(1);
        let last = block.saturating_add(1).min(primary_blocks - 1);
        for candidate in first..=last {
            let primary = self.primary_block(candidate)?;
            for entry in self.overflow_chain(primary.overflow) {
                let (local, mut overflow) = entry?;
                if let Some(slot) = overflow.find_slot(&key) {
                    let position = RecordPosition::overflow(self.header().overflow_index(local), slot);
                    return Ok(Some((position, overflow.records.swap_remove(slot))));
                }
            }
        }

        Ok(None)
    }

    /// Active record with this key, primary or overflow
    pub fn get(&self, key: &[u8]) -> Result<Option<Record>> {
        Ok(self
            .lookup(key)?
            .map(|(_, record)| record)
            .filter(Record::is_active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, OverflowLink};
    use crate::config::{FileConfig, Geometry};
    use crate::error::IsamError;
    use crate::file::Zone;
    use crate::io::MemoryStore;
    use crate::record::Marker;

    /// Three primary blocks of eleven records, keys 1..=33
    fn scenario(mode: KeyRangeMode) -> IndexedFile<MemoryStore> {
        let config = FileConfig::new()
            .with_geometry(Geometry::new(10, 32, 11))
            .with_key_range(mode);
        let mut file = IndexedFile::in_memory(config).unwrap();
        let g = *file.geometry();

        for b in 0..3u64 {
            let records = (1..=11)
                .map(|i| Record::numbered(b * 11 + i, &g).unwrap())
                .collect();
            file.write_block(b, &Block::with_records(records)).unwrap();
        }
        let header = file.header_mut();
        header.primary_blocks = 3;
        header.total_records = 33;
        file.write_header().unwrap();
        file
    }

    /// Attach one overflow block holding `keys` to primary block `primary`
    fn add_overflow(file: &mut IndexedFile<MemoryStore>, primary: u32, keys: &[u64]) {
        let g = *file.geometry();
        let local = file.header().overflow_blocks;
        let records = keys.iter().map(|&k| Record::numbered(k, &g).unwrap()).collect();
        file.write_block(file.header().overflow_index(local), &Block::with_records(records))
            .unwrap();

        let mut block = file.primary_block(primary).unwrap();
        block.overflow = OverflowLink::Block(local);
        file.write_block(primary as u64, &block).unwrap();
        file.header_mut().overflow_blocks += 1;
        file.write_header().unwrap();
    }

    #[test]
    fn test_locate_found_in_middle_block() {
        let file = scenario(KeyRangeMode::Declared);
        assert_eq!(
            file.locate(b"0000000015").unwrap(),
            LocateResult::Found { block: 1, slot: 3 }
        );
    }

    #[test]
    fn test_locate_every_primary_key() {
        let file = scenario(KeyRangeMode::Declared);
        for k in 1..=33u64 {
            let key = format!("{:010}", k);
            let expected = LocateResult::Found {
                block: ((k - 1) / 11) as u32,
                slot: ((k - 1) % 11) as usize,
            };
            assert_eq!(file.locate(key.as_bytes()).unwrap(), expected, "key {}", k);
        }
    }

    #[test]
    fn test_locate_missing_key() {
        let file = scenario(KeyRangeMode::Declared);
        let result = file.locate(b"9999999999").unwrap();
        assert_eq!(result, LocateResult::NotFound { block: 2 });
        assert!(!result.is_found());

        assert_eq!(
            file.locate(b"0000000000").unwrap(),
            LocateResult::NotFound { block: 0 }
        );
    }

    #[test]
    fn test_locate_empty_file() {
        let file = IndexedFile::in_memory(FileConfig::default()).unwrap();
        assert_eq!(
            file.locate(b"0000000001").unwrap(),
            LocateResult::NotFound { block: 0 }
        );
    }

    #[test]
    fn test_locate_ignores_overflow() {
        let mut file = scenario(KeyRangeMode::Declared);
        add_overflow(&mut file, 1, &[100]);

        assert!(!file.locate(b"0000000100").unwrap().is_found());
    }

    #[test]
    fn test_locate_key_too_long() {
        let file = scenario(KeyRangeMode::Declared);
        assert!(matches!(
            file.locate(b"00000000001"),
            Err(IsamError::KeyTooLong { .. })
        ));
    }

    #[test]
    fn test_locate_finds_deleted_record() {
        let mut file = scenario(KeyRangeMode::Declared);
        file.delete(b"0000000020").unwrap();
        assert_eq!(
            file.locate(b"0000000020").unwrap(),
            LocateResult::Found { block: 1, slot: 8 }
        );
    }

    #[test]
    fn test_strict_mode_narrows_range() {
        let mut file = scenario(KeyRangeMode::Declared);
        file.delete(b"0000000012").unwrap();

        // Declared range of block 1 still starts at the deleted key
        assert_eq!(
            file.locate_with(b"0000000012", KeyRangeMode::Declared).unwrap(),
            LocateResult::Found { block: 1, slot: 0 }
        );

        // Strict range starts at 13, so the search moves left and misses
        assert_eq!(
            file.locate_with(b"0000000012", KeyRangeMode::Strict).unwrap(),
            LocateResult::NotFound { block: 0 }
        );
        assert_eq!(
            file.locate_with(b"0000000013", KeyRangeMode::Strict).unwrap(),
            LocateResult::Found { block: 1, slot: 1 }
        );
    }

    #[test]
    fn test_configured_mode_is_used() {
        let mut file = scenario(KeyRangeMode::Strict);
        file.delete(b"0000000012").unwrap();
        assert!(!file.locate(b"0000000012").unwrap().is_found());
    }

    #[test]
    fn test_lookup_reaches_overflow() {
        let mut file = scenario(KeyRangeMode::Declared);
        add_overflow(&mut file, 2, &[40, 35]);

        let (position, record) = file.lookup(b"0000000035").unwrap().unwrap();
        assert_eq!(position.zone, Zone::Overflow);
        assert_eq!(position.block, 3);
        assert_eq!(position.slot, 1);
        assert_eq!(record.key_str(), "0000000035");

        assert!(file.lookup(b"0000000036").unwrap().is_none());
    }

    #[test]
    fn test_lookup_checks_neighbour_chains() {
        let mut file = scenario(KeyRangeMode::Declared);
        // Chain hangs off block 0 but the key sorts past block 1's range
        add_overflow(&mut file, 0, &[23]);
        let mut block = file.primary_block(2).unwrap();
        block.records.remove(0);
        file.write_block(2, &block).unwrap();

        assert!(file.lookup(b"0000000023").unwrap().is_none());

        add_overflow(&mut file, 1, &[23]);
        assert!(file.lookup(b"0000000023").unwrap().is_some());
    }

    #[test]
    fn test_get_skips_deleted() {
        let mut file = scenario(KeyRangeMode::Declared);
        assert!(file.get(b"0000000005").unwrap().is_some());

        file.delete(b"0000000005").unwrap();
        assert!(file.get(b"0000000005").unwrap().is_none());

        let (_, record) = file.lookup(b"0000000005").unwrap().unwrap();
        assert_eq!(record.marker, Marker::Deleted);
    }
}
