//! # ISAM - Block-Organized Indexed Sequential Files
//!
//! `isam-rs` stores fixed-width records in a single file of fixed-size
//! blocks. A sorted primary zone is searched by binary search over block key
//! ranges; records that do not fit their primary block go to overflow blocks
//! chained off it. Reorganization rewrites the file into a fresh, compact
//! primary zone at a chosen fill factor.
//!
//! ## Features
//!
//! - **Primary zone** of key-sorted blocks, located in `O(log P + C)` reads
//! - **Overflow chains** per primary block for records inserted later
//! - **Interval listing** in block order with each block's chain after it
//! - **Logical deletion** with physical removal on reorganization
//! - **Integrity check** of ordering, chain ownership and record counts
//! - Pluggable [`BlockStore`]: on disk ([`DiskStore`]) or in memory ([`MemoryStore`])
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use isam::{FileConfig, IndexedFile, LocateResult, Record, Result};
//!
//! # fn main() -> Result<()> {
//! let config = FileConfig::default();
//! let mut file = IndexedFile::create("data.isam", config)?;
//!
//! // Bulk load keys 1..=33 into full blocks
//! let g = *file.geometry();
//! let records = (1..=33).map(|i| Record::numbered(i, &g)).collect::<Result<Vec<_>>>()?;
//! file.load_sorted(records, 1.0)?;
//!
//! assert!(matches!(file.locate(b"0000000015")?, LocateResult::Found { block: 1, .. }));
//!
//! for record in file.list_records(b"0000000010", b"0000000020")? {
//!     println!("{} {}", record.key_str(), record.payload_str());
//! }
//!
//! // Rewrite at half capacity to leave room for inserts
//! file.reorganize("data-reorg.isam", 0.5)?;
//! file.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (12B): primary, overflow, records     │
//! ├──────────────────────────────────────────────┤
//! │ Primary block 0      [count|link|C records]  │
//! │ Primary block 1                              │
//! │ ...                                          │
//! │ Primary block P-1                            │
//! ├──────────────────────────────────────────────┤
//! │ Overflow block 0     (absolute index P)      │
//! │ ...                                          │
//! │ Overflow block O-1   (absolute index P+O-1)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian `i32`; an overflow link of `-1` ends a chain.

pub mod block;
pub mod check;
pub mod config;
pub mod error;
pub mod file;
pub mod header;
pub mod io;
pub mod locate;
pub mod overflow;
pub mod record;
pub mod reorg;
pub mod scan;

pub use block::{Block, OverflowLink};
pub use check::CheckReport;
pub use config::{FileConfig, Geometry, KeyRangeMode};
pub use error::{IsamError, Result};
pub use file::{FileStats, IndexedFile, RecordPosition, Zone};
pub use header::{FileHeader, HEADER_SIZE};
pub use io::{BlockStore, DiskStore, MemoryStore};
pub use locate::LocateResult;
pub use overflow::OverflowChain;
pub use record::{Marker, Record};
pub use reorg::{LoadStats, ReorgStats};
pub use scan::{RangeScan, ScanEntry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
