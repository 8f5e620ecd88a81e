//! File geometry and engine configuration
//!
//! The on-disk format carries only the three header counters, so the record
//! and block shape must be supplied by the caller on every create and open.
//! Configurations are plain serde structs and can be loaded from TOML:
//!
//! ```toml
//! key_range = "declared"
//!
//! [geometry]
//! key_len = 10
//! payload_len = 64
//! capacity = 11
//! ```

use crate::error::{IsamError, Result};
use crate::header::HEADER_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Size of the per-block prefix: record_count (i32) + overflow_link (i32)
pub const BLOCK_PREFIX_SIZE: usize = 8;

/// Upper bound on a single block, keeps a corrupt config from allocating gigabytes
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Record and block shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Geometry {
    /// Fixed key width K in bytes
    #[validate(range(min = 1, max = 255))]
    pub key_len: usize,

    /// Fixed payload width in bytes
    #[validate(range(max = 65536))]
    pub payload_len: usize,

    /// Records per block (C)
    #[validate(range(min = 1, max = 65536))]
    pub capacity: usize,
}

impl Geometry {
    pub const fn new(key_len: usize, payload_len: usize, capacity: usize) -> Self {
        Geometry {
            key_len,
            payload_len,
            capacity,
        }
    }

    /// Bytes per record: key + marker + payload
    pub const fn record_size(&self) -> usize {
        self.key_len + 1 + self.payload_len
    }

    /// Bytes per block, prefix included
    pub const fn block_size(&self) -> usize {
        BLOCK_PREFIX_SIZE + self.capacity * self.record_size()
    }

    /// Byte offset of an absolute block index
    pub fn block_offset(&self, index: u64) -> u64 {
        HEADER_SIZE as u64 + index * self.block_size() as u64
    }

    /// Right-pad a caller key with NUL bytes to exactly `key_len`
    pub fn pad_key(&self, key: &[u8]) -> Result<Vec<u8>> {
        if key.len() > self.key_len {
            return Err(IsamError::KeyTooLong {
                len: key.len(),
                max: self.key_len,
            });
        }
        let mut padded = key.to_vec();
        padded.resize(self.key_len, 0);
        Ok(padded)
    }

    /// Right-pad a caller payload with NUL bytes to exactly `payload_len`
    pub fn pad_payload(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > self.payload_len {
            return Err(IsamError::PayloadTooLong {
                len: payload.len(),
                max: self.payload_len,
            });
        }
        let mut padded = payload.to_vec();
        padded.resize(self.payload_len, 0);
        Ok(padded)
    }

    /// Validate field ranges and the derived block size
    pub fn check(&self) -> Result<()> {
        Validate::validate(self)?;

        if self.block_size() > MAX_BLOCK_SIZE {
            return Err(IsamError::InvalidGeometry(format!(
                "block size {} exceeds maximum {}",
                self.block_size(),
                MAX_BLOCK_SIZE
            )));
        }

        Ok(())
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            key_len: 10,
            payload_len: 64,
            capacity: 11,
        }
    }
}

/// How the locator derives a block's key range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRangeMode {
    /// First and last slot keys, deleted records included
    #[default]
    Declared,
    /// Smallest and largest active key, recomputed per visit
    Strict,
}

/// Engine configuration for one indexed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub key_range: KeyRangeMode,
    pub geometry: Geometry,
}

impl FileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_key_range(mut self, mode: KeyRangeMode) -> Self {
        self.key_range = mode;
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.geometry.check()
    }
}
