//! Block-timestamp index for cross-chain time correlation.
//!
//! Chains have different block times, so "the same moment" on another chain
//! is approximated by the block whose timestamp is closest to the source
//! block's timestamp. The subsequent scan window absorbs residual error.

use crate::error::Result;
use crate::store::TraceStore;
use crate::types::Chain;

/// Sorted `(block_number, timestamp)` pairs for one chain.
///
/// Timestamps are assumed non-decreasing in block order, which holds for
/// every supported chain's consensus rules.
#[derive(Clone, Debug, Default)]
pub struct BlockIndex {
    entries: Vec<(u64, u64)>,
}

impl BlockIndex {
    /// Builds an index from explicit pairs; sorts by block number.
    pub fn new(mut entries: Vec<(u64, u64)>) -> Self {
        entries.sort_unstable_by_key(|&(block, _)| block);
        Self { entries }
    }

    /// Loads one chain's full block index from the trace store.
    pub fn from_store(store: &TraceStore, chain: Chain) -> Result<Self> {
        Ok(Self::new(store.block_index(chain)?))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Timestamp of one indexed block.
    pub fn timestamp(&self, block: u64) -> Option<u64> {
        self.entries
            .binary_search_by_key(&block, |&(b, _)| b)
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// The block whose timestamp is closest to `timestamp`, not necessarily
    /// at or before it. An exact distance tie resolves to the earlier block.
    pub fn closest_block(&self, timestamp: u64) -> Option<u64> {
        if self.entries.is_empty() {
            return None;
        }
        // First entry with ts >= timestamp; its predecessor is the closest
        // candidate from below.
        let after = self.entries.partition_point(|&(_, ts)| ts < timestamp);
        if after == 0 {
            return Some(self.entries[0].0);
        }
        if after == self.entries.len() {
            return Some(self.entries[after - 1].0);
        }

        let (earlier_block, earlier_ts) = self.entries[after - 1];
        let (later_block, later_ts) = self.entries[after];
        let earlier_gap = timestamp - earlier_ts;
        let later_gap = later_ts - timestamp;
        if later_gap < earlier_gap {
            Some(later_block)
        } else {
            Some(earlier_block)
        }
    }
}
