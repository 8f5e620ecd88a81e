use crate::config::{Geometry, KeyRangeMode, BLOCK_PREFIX_SIZE};
use crate::error::{IsamError, Result};
use crate::record::Record;

/// Link from a block to the next block of its overflow chain
///
/// Persisted as an i32: `-1` for [`OverflowLink::None`], otherwise the
/// 0-based index inside the overflow zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverflowLink {
    #[default]
    None,
    Block(u32),
}

impl OverflowLink {
    pub const NONE_RAW: i32 = -1;

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            Self::NONE_RAW => Some(OverflowLink::None),
            n if n >= 0 => Some(OverflowLink::Block(n as u32)),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            OverflowLink::None => Self::NONE_RAW,
            OverflowLink::Block(n) => n as i32,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, OverflowLink::None)
    }
}

/// A block of up to `capacity` records
///
/// Structure: `[record_count: i32][overflow_link: i32][capacity × record]`.
/// Slots past `record_count` are written as zeros and ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub records: Vec<Record>,
    pub overflow: OverflowLink,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        Block {
            records,
            overflow: OverflowLink::None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self, geometry: &Geometry) -> bool {
        self.records.len() >= geometry.capacity
    }

    /// Declared key range: first and last slot
    ///
    /// Derived from slot positions, so it still covers logically deleted
    /// records at either end.
    pub fn declared_range(&self) -> Option<(&[u8], &[u8])> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.key.as_slice(), last.key.as_slice())),
            _ => None,
        }
    }

    /// Smallest and largest active key
    pub fn strict_range(&self) -> Option<(&[u8], &[u8])> {
        let mut active = self.records.iter().filter(|r| r.is_active());
        let first = active.next()?;
        let (mut min, mut max) = (&first.key, &first.key);
        for rec in active {
            if rec.key < *min {
                min = &rec.key;
            }
            if rec.key > *max {
                max = &rec.key;
            }
        }
        Some((min.as_slice(), max.as_slice()))
    }

    /// Key range under the given mode; strict falls back to declared when
    /// the block has no active record
    pub fn key_range(&self, mode: KeyRangeMode) -> Option<(&[u8], &[u8])> {
        match mode {
            KeyRangeMode::Declared => self.declared_range(),
            KeyRangeMode::Strict => self.strict_range().or_else(|| self.declared_range()),
        }
    }

    /// Slot holding exactly `key`, linear scan
    pub fn find_slot(&self, key: &[u8]) -> Option<usize> {
        self.records.iter().position(|r| r.key == key)
    }

    /// Serialize block to exactly `geometry.block_size()` bytes
    pub fn to_bytes(&self, geometry: &Geometry) -> Result<Vec<u8>> {
        if self.records.len() > geometry.capacity {
            return Err(IsamError::InvalidArgument(format!(
                "block holds {} records (capacity: {})",
                self.records.len(),
                geometry.capacity
            )));
        }

        let mut bytes = vec![0u8; geometry.block_size()];
        bytes[0..4].copy_from_slice(&(self.records.len() as i32).to_le_bytes());
        bytes[4..8].copy_from_slice(&self.overflow.to_raw().to_le_bytes());

        let size = geometry.record_size();
        for (i, rec) in self.records.iter().enumerate() {
            if rec.key.len() != geometry.key_len || rec.payload.len() != geometry.payload_len {
                return Err(IsamError::InvalidArgument(format!(
                    "record {} has shape {}+{} (expected {}+{})",
                    i,
                    rec.key.len(),
                    rec.payload.len(),
                    geometry.key_len,
                    geometry.payload_len
                )));
            }
            let start = BLOCK_PREFIX_SIZE + i * size;
            rec.encode_into(&mut bytes[start..start + size]);
        }

        Ok(bytes)
    }

    /// Deserialize block from bytes; `index` is only used for error reporting
    pub fn from_bytes(index: u64, bytes: &[u8], geometry: &Geometry) -> Result<Self> {
        let corrupt = |reason: String| IsamError::CorruptBlock { index, reason };

        if bytes.len() < geometry.block_size() {
            return Err(IsamError::ShortRead {
                index,
                expected: geometry.block_size(),
                actual: bytes.len(),
            });
        }

        let count = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if count < 0 || count as usize > geometry.capacity {
            return Err(corrupt(format!(
                "record count {} outside 0..={}",
                count, geometry.capacity
            )));
        }

        let raw_link = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let overflow = OverflowLink::from_raw(raw_link)
            .ok_or_else(|| corrupt(format!("invalid overflow link {}", raw_link)))?;

        let size = geometry.record_size();
        let mut records = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let start = BLOCK_PREFIX_SIZE + i * size;
            let rec = Record::decode(&bytes[start..start + size], geometry)
                .map_err(|reason| corrupt(format!("slot {}: {}", i, reason)))?;
            records.push(rec);
        }

        Ok(Block { records, overflow })
    }
}
