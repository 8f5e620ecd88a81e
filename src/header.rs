use crate::error::{IsamError, Result};
use serde::{Deserialize, Serialize};

/// Header size in bytes: three little-endian i32 counters
pub const HEADER_SIZE: usize = 12;

/// Indexed file header (bytes 0..12)
///
/// Mirrored in memory by the open [`IndexedFile`](crate::IndexedFile) and
/// written back on create, close and after every structural change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// Number of blocks in the primary zone (P)
    pub primary_blocks: u32,

    /// Number of blocks in the overflow zone (O)
    pub overflow_blocks: u32,

    /// Number of active records
    ///
    /// Authoritative right after open, load or reorganize; maintained by
    /// insert and delete.
    pub total_records: u32,
}

impl FileHeader {
    /// Create an all-zero header
    pub fn new() -> Self {
        Self::default()
    }

    /// Total blocks addressed by the header (P + O)
    pub fn total_blocks(&self) -> u64 {
        self.primary_blocks as u64 + self.overflow_blocks as u64
    }

    /// Absolute block index of an overflow-zone block
    pub fn overflow_index(&self, local: u32) -> u64 {
        self.primary_blocks as u64 + local as u64
    }

    /// Check the counters fit the signed on-disk encoding
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("primary_blocks", self.primary_blocks),
            ("overflow_blocks", self.overflow_blocks),
            ("total_records", self.total_records),
        ] {
            if value > i32::MAX as u32 {
                return Err(IsamError::CorruptHeader(format!(
                    "{} ({}) exceeds i32::MAX",
                    name, value
                )));
            }
        }

        if self.overflow_blocks > 0 && self.primary_blocks == 0 {
            return Err(IsamError::CorruptHeader(format!(
                "{} overflow blocks without a primary zone",
                self.overflow_blocks
            )));
        }

        Ok(())
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&(self.primary_blocks as i32).to_le_bytes());
        bytes[4..8].copy_from_slice(&(self.overflow_blocks as i32).to_le_bytes());
        bytes[8..12].copy_from_slice(&(self.total_records as i32).to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(IsamError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for header",
            )));
        }

        let field = |offset: usize, name: &str| -> Result<u32> {
            let raw = i32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]);
            u32::try_from(raw)
                .map_err(|_| IsamError::CorruptHeader(format!("negative {}: {}", name, raw)))
        };

        let header = FileHeader {
            primary_blocks: field(0, "primary_blocks")?,
            overflow_blocks: field(4, "overflow_blocks")?,
            total_records: field(8, "total_records")?,
        };

        header.validate()?;

        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_creation() {
        let header = FileHeader::new();
        assert_eq!(header.primary_blocks, 0);
        assert_eq!(header.overflow_blocks, 0);
        assert_eq!(header.total_records, 0);
        assert_eq!(header.to_bytes(), [0u8; HEADER_SIZE]);
    }

    #[test]
    fn test_header_serialization() {
        let header = FileHeader {
            primary_blocks: 3,
            overflow_blocks: 2,
            total_records: 40,
        };

        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], &3i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &40i32.to_le_bytes());

        assert_eq!(FileHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_negative_counter_rejected() {
        let mut bytes = FileHeader::new().to_bytes();
        bytes[4..8].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(
            FileHeader::from_bytes(&bytes),
            Err(IsamError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_overflow_without_primary_rejected() {
        let header = FileHeader {
            primary_blocks: 0,
            overflow_blocks: 1,
            total_records: 0,
        };
        assert!(header.validate().is_err());
    }

    #[test]
    fn test_short_buffer() {
        assert!(matches!(
            FileHeader::from_bytes(&[0u8; 7]),
            Err(IsamError::Io(_))
        ));
    }

    #[test]
    fn test_overflow_addressing() {
        let header = FileHeader {
            primary_blocks: 5,
            overflow_blocks: 2,
            total_records: 0,
        };
        assert_eq!(header.overflow_index(0), 5);
        assert_eq!(header.overflow_index(1), 6);
        assert_eq!(header.total_blocks(), 7);
    }
}
