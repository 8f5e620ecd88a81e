//! Structural integrity check
//!
//! Walks the whole file once and reports every broken invariant it can find
//! instead of stopping at the first one. Decoding failures of single blocks
//! are reported as issues; store-level I/O errors abort the check.

use crate::block::OverflowLink;
use crate::error::{IsamError, Result};
use crate::file::IndexedFile;
use crate::io::BlockStore;
use crate::record::display_key;
use serde::Serialize;
use tracing::{info, warn};

/// Findings of [`IndexedFile::check`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub primary_blocks: u32,
    pub overflow_blocks: u32,
    pub active_records: u64,
    pub deleted_records: u64,
    pub issues: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<S: BlockStore> IndexedFile<S> {
    /// Verify ordering, chain structure and the header's record count
    pub fn check(&self) -> Result<CheckReport> {
        let header = *self.header();
        let mut report = CheckReport {
            primary_blocks: header.primary_blocks,
            overflow_blocks: header.overflow_blocks,
            ..CheckReport::default()
        };

        let mut heads = Vec::with_capacity(header.primary_blocks as usize);
        let mut undecodable = Vec::new();
        let mut previous_max: Option<(u64, Vec<u8>)> = None;

        for entry in self.raw_blocks() {
            let (index, block) = match entry {
                Ok(entry) => entry,
                Err(IsamError::CorruptBlock { index, reason }) => {
                    report.issues.push(format!("block {}: {}", index, reason));
                    undecodable.push(index);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for record in &block.records {
                if record.is_active() {
                    report.active_records += 1;
                } else {
                    report.deleted_records += 1;
                }
            }

            if index >= header.primary_blocks as u64 {
                continue;
            }
            heads.push((index, block.overflow));

            if block.is_empty() {
                report.issues.push(format!("primary block {} is empty", index));
                continue;
            }

            for pair in block.records.windows(2) {
                if pair[0].key >= pair[1].key {
                    report.issues.push(format!(
                        "primary block {}: {} is not below {}",
                        index,
                        display_key(&pair[0].key),
                        display_key(&pair[1].key)
                    ));
                }
            }

            if let (Some((prev_index, prev_max)), Some((min, _))) =
                (&previous_max, block.declared_range())
            {
                if min <= prev_max.as_slice() {
                    report.issues.push(format!(
                        "primary block {} starts at {} which overlaps block {} ending at {}",
                        index,
                        display_key(min),
                        prev_index,
                        display_key(prev_max)
                    ));
                }
            }
            if let Some((_, max)) = block.declared_range() {
                previous_max = Some((index, max.to_vec()));
            }
        }

        self.check_chains(&heads, &undecodable, &mut report)?;

        if report.active_records != header.total_records as u64 {
            report.issues.push(format!(
                "header counts {} records but {} are active",
                header.total_records, report.active_records
            ));
        }

        if report.is_clean() {
            info!(
                "Check passed: {} primary, {} overflow, {} active records",
                report.primary_blocks, report.overflow_blocks, report.active_records
            );
        } else {
            warn!("Check found {} issues", report.issues.len());
        }

        Ok(report)
    }

    /// Every overflow block must be reached by exactly one chain
    fn check_chains(
        &self,
        heads: &[(u64, OverflowLink)],
        undecodable: &[u64],
        report: &mut CheckReport,
    ) -> Result<()> {
        let header = *self.header();
        let mut owner: Vec<Option<u64>> = vec![None; header.overflow_blocks as usize];

        for &(primary, head) in heads {
            for entry in self.overflow_chain(head) {
                let local = match entry {
                    Ok((local, _)) => local,
                    Err(IsamError::BlockOutOfRange { index, .. }) => {
                        report.issues.push(format!(
                            "chain of primary block {} links to missing block {}",
                            primary, index
                        ));
                        break;
                    }
                    Err(IsamError::CorruptBlock { index, reason }) => {
                        if !undecodable.contains(&index) {
                            report
                                .issues
                                .push(format!("chain of primary block {}: {}", primary, reason));
                        }
                        break;
                    }
                    Err(e) => return Err(e),
                };

                if let Some(other) = owner[local as usize] {
                    let what = if other == primary {
                        "loops back to"
                    } else {
                        "shares"
                    };
                    report.issues.push(format!(
                        "chain of primary block {} {} overflow block {} (owned by block {})",
                        primary, what, local, other
                    ));
                    break;
                }
                owner[local as usize] = Some(primary);
            }
        }

        for (local, slot) in owner.iter().enumerate() {
            if slot.is_none() {
                report
                    .issues
                    .push(format!("overflow block {} is not on any chain", local));
            }
        }

        Ok(())
    }
}
