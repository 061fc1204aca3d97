//! Expected-IOPS bandwidth table
//!
//! Maps an operating point `(io_depth, numjobs, split_pct)` to the IOPS
//! the hybrid device sustained at that point during offline profiling.
//! The table is read-only after load and lookups are total: missing
//! split percentages fall back to the nearest profiled row, missing
//! `(io_depth, numjobs)` groups yield 0 (which the optimizer treats as
//! "keep everything on the cache").

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One profiled operating point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Queue depth during profiling
    pub io_depth: u64,
    /// Concurrent job count during profiling
    pub numjobs: u64,
    /// Percentage of traffic sent to the cache, 0..=100
    pub split_pct: u64,
    /// Measured IOPS at this operating point
    pub iops: u64,
}

/// Source of expected-IOPS figures for the ratio optimizer.
///
/// Implementations never fail: unknown operating points yield 0.
pub trait BandwidthLookup: Send + Sync {
    /// Expected IOPS at the given operating point
    fn lookup_bw(&self, io_depth: u64, numjobs: u64, split_pct: u64) -> u64;
}

/// In-memory bandwidth table with nearest-neighbour lookup on `split_pct`
#[derive(Debug, Clone, Default)]
pub struct BandwidthTable {
    /// Rows sorted by split_pct, keyed exactly by (io_depth, numjobs)
    rows: HashMap<(u64, u64), Vec<(u64, u64)>>,
}

impl BandwidthTable {
    /// Build a table from profiled entries.
    ///
    /// Rejects entries with `split_pct > 100`. Duplicate operating points
    /// keep the first entry seen.
    pub fn from_entries(entries: impl IntoIterator<Item = TableEntry>) -> Result<Self> {
        let mut rows: HashMap<(u64, u64), Vec<(u64, u64)>> = HashMap::new();

        for entry in entries {
            if entry.split_pct > 100 {
                return Err(Error::InvalidTableEntry {
                    io_depth: entry.io_depth,
                    numjobs: entry.numjobs,
                    split_pct: entry.split_pct,
                });
            }
            rows.entry((entry.io_depth, entry.numjobs))
                .or_default()
                .push((entry.split_pct, entry.iops));
        }

        for points in rows.values_mut() {
            points.sort_by_key(|&(pct, _)| pct);
            points.dedup_by_key(|&mut (pct, _)| pct);
        }

        Ok(Self { rows })
    }

    /// Parse a table from a JSON array of [`TableEntry`] objects
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<TableEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    /// Load a table from a JSON file
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// True if the table holds no rows at all
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of profiled operating points
    pub fn len(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    /// Expected IOPS at the given operating point.
    ///
    /// Exact match on `(io_depth, numjobs)`; nearest profiled `split_pct`
    /// within that group, ties resolving to the lower row. Missing groups
    /// and empty tables return 0.
    pub fn lookup(&self, io_depth: u64, numjobs: u64, split_pct: u64) -> u64 {
        let Some(points) = self.rows.get(&(io_depth, numjobs)) else {
            return 0;
        };

        match points.binary_search_by_key(&split_pct, |&(pct, _)| pct) {
            Ok(i) => points[i].1,
            Err(i) if i == 0 => points[0].1,
            Err(i) if i == points.len() => points[i - 1].1,
            Err(i) => {
                let (lo_pct, lo_iops) = points[i - 1];
                let (hi_pct, hi_iops) = points[i];
                if split_pct - lo_pct <= hi_pct - split_pct {
                    lo_iops
                } else {
                    hi_iops
                }
            }
        }
    }
}

impl BandwidthLookup for BandwidthTable {
    fn lookup_bw(&self, io_depth: u64, numjobs: u64, split_pct: u64) -> u64 {
        self.lookup(io_depth, numjobs, split_pct)
    }
}

// =============================================================================
// Tests
// =============================================================================
