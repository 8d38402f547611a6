//! Splitting an entry set into list-sized chunks

use super::naming::chunk_name;
use crate::config::DEFAULT_LIST_ITEM_SIZE;

/// One list to create: its generated name and the entries it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan<'a> {
    /// `<base> - Chunk <n>`, 1-based
    pub name: String,
    /// Entries in set order
    pub entries: &'a [String],
}

/// Split `entries` into consecutive chunks of at most `size` entries
///
/// Produces `ceil(len / size)` chunks; only the last one may be shorter. A
/// zero size falls back to the default list size.
pub fn plan_chunks<'a>(base: &str, entries: &'a [String], size: usize) -> Vec<ChunkPlan<'a>> {
    let size = if size == 0 { DEFAULT_LIST_ITEM_SIZE } else { size };

    entries
        .chunks(size)
        .enumerate()
        .map(|(index, entries)| ChunkPlan {
            name: chunk_name(base, index),
            entries,
        })
        .collect()
}
