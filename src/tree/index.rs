//! Name-sorted lookup index
//!
//! The tree itself is ordered by insertion, not by name, so existence and
//! lookup queries go through this side index: entries sorted by file name
//! for binary search, each carrying the leaf's in-order rank. Rank-to-leaf
//! resolution descends the tree on `leaf_count`, so a lookup is
//! O(log N) + O(log N) and never linear in file count.

use crate::tree::node::{LeafNode, Node};
use crate::tree::ManifestTree;
use crate::types::NodeIx;

/// Index entry: file name plus the leaf's in-order rank.
///
/// The rank is a positional reference, not ownership; it goes stale if
/// the file set mutates structurally and must be re-resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub rank: u64,
}

/// Array of index entries kept sorted by name
#[derive(Debug, Clone, Default)]
pub struct SortedIndex {
    entries: Vec<IndexEntry>,
}

impl SortedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Insert at the binary-search insertion point; duplicate names land
    /// adjacent to each other.
    pub fn insert(&mut self, name: &str, rank: u64) {
        let at = self
            .entries
            .partition_point(|e| e.name.as_str() < name);
        self.entries.insert(
            at,
            IndexEntry {
                name: name.to_string(),
                rank,
            },
        );
    }

    /// Binary search for a name; returns any matching entry
    pub fn find(&self, name: &str) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|pos| &self.entries[pos])
    }

    /// Contiguous range of entry positions whose name matches exactly
    pub fn matching_range(&self, name: &str) -> std::ops::Range<usize> {
        let start = self.entries.partition_point(|e| e.name.as_str() < name);
        let end = self.entries.partition_point(|e| e.name.as_str() <= name);
        start..end
    }

    pub fn entry_at(&self, pos: usize) -> &IndexEntry {
        &self.entries[pos]
    }

    pub fn remove_at(&mut self, pos: usize) -> IndexEntry {
        self.entries.remove(pos)
    }

    /// After a hard delete of the leaf at `rank`, every higher rank
    /// shifts down by one.
    pub fn shift_ranks_above(&mut self, rank: u64) {
        for entry in &mut self.entries {
            if entry.rank > rank {
                entry.rank -= 1;
            }
        }
    }

    /// Rebuild from (name, rank) pairs in arbitrary order; O(N log N)
    pub fn rebuild(pairs: Vec<(String, u64)>) -> Self {
        let mut entries: Vec<IndexEntry> = pairs
            .into_iter()
            .map(|(name, rank)| IndexEntry { name, rank })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name).then(a.rank.cmp(&b.rank)));
        Self { entries }
    }
}

impl ManifestTree {
    /// Look up a live leaf by name. Tombstoned leaves are treated as
    /// absent; a miss is a plain `None`, never an error.
    pub fn find_file_node(&self, name: &str) -> Option<&LeafNode> {
        self.find_file_node_with_deletion_status(name)
            .filter(|leaf| !leaf.is_deleted)
    }

    /// Look up a leaf by name, tombstones included
    pub fn find_file_node_with_deletion_status(&self, name: &str) -> Option<&LeafNode> {
        let entry = self.index.find(name)?;
        let ix = self.leaf_at_rank(entry.rank)?;
        self.arena.node(ix).as_leaf()
    }

    /// Raw index entry for a name, for callers that need the stable rank
    pub fn find_node_ref(&self, name: &str) -> Option<&IndexEntry> {
        self.index.find(name)
    }

    /// Whether a live file with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.find_file_node(name).is_some()
    }

    /// Names of all live files, in index (name-sorted) order
    pub fn file_names(&self) -> Vec<&str> {
        self.index
            .entries()
            .iter()
            .filter(|entry| {
                self.leaf_at_rank(entry.rank)
                    .and_then(|ix| self.arena.node(ix).as_leaf())
                    .is_some_and(|leaf| !leaf.is_deleted)
            })
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Full-scan lookup, for tests and diagnostics only. O(N), never to
    /// be used on a hot path.
    pub fn find_file_node_linear(&self, name: &str) -> Option<&LeafNode> {
        self.all_leaves()
            .into_iter()
            .find(|leaf| leaf.name == name && !leaf.is_deleted)
    }

    /// Locate a leaf by name with an optional directory disambiguator,
    /// tombstones included. Returns the index entry position and the
    /// leaf's arena index.
    pub(crate) fn find_leaf_for(
        &self,
        name: &str,
        directory: Option<&str>,
    ) -> Option<(usize, NodeIx)> {
        for pos in self.index.matching_range(name) {
            let entry = self.index.entry_at(pos);
            let Some(ix) = self.leaf_at_rank(entry.rank) else {
                continue;
            };
            if let Node::Leaf(leaf) = self.arena.node(ix) {
                if directory.is_none() || leaf.directory.as_deref() == directory {
                    return Some((pos, ix));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::hasher::hash_bytes;
    use crate::tree::node::FileEntry;

    fn entry(name: &str) -> FileEntry {
        FileEntry::new(name, hash_bytes(name.as_bytes()), 4)
    }

    #[test]
    fn test_sorted_insert_keeps_order() {
        let mut index = SortedIndex::new();
        index.insert("m", 0);
        index.insert("a", 1);
        index.insert("z", 2);
        index.insert("c", 3);
        let names: Vec<&str> = index.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "m", "z"]);
    }

    #[test]
    fn test_find_hits_and_misses() {
        let mut index = SortedIndex::new();
        index.insert("a", 0);
        index.insert("b", 1);
        assert_eq!(index.find("b").map(|e| e.rank), Some(1));
        assert!(index.find("missing").is_none());
    }

    #[test]
    fn test_matching_range_with_duplicates() {
        let mut index = SortedIndex::new();
        index.insert("a", 0);
        index.insert("dup", 1);
        index.insert("dup", 2);
        index.insert("z", 3);
        assert_eq!(index.matching_range("dup").len(), 2);
        assert_eq!(index.matching_range("nope").len(), 0);
    }

    #[test]
    fn test_shift_ranks_above() {
        let mut index = SortedIndex::new();
        index.insert("a", 0);
        index.insert("b", 1);
        index.insert("c", 2);
        index.shift_ranks_above(0);
        assert_eq!(index.find("a").unwrap().rank, 0);
        assert_eq!(index.find("b").unwrap().rank, 0);
        assert_eq!(index.find("c").unwrap().rank, 1);
    }

    #[test]
    fn test_tree_lookup_matches_linear_scan() {
        let mut tree = ManifestTree::new("t");
        for name in ["gamma", "alpha", "delta", "beta", "epsilon"] {
            tree.add_file(entry(name));
        }
        for name in ["alpha", "beta", "gamma", "delta", "epsilon"] {
            let indexed = tree.find_file_node(name).unwrap();
            let scanned = tree.find_file_node_linear(name).unwrap();
            assert_eq!(indexed.content_hash, scanned.content_hash);
            assert_eq!(indexed.name, name);
        }
        assert!(tree.find_file_node("zeta").is_none());
        assert!(tree.find_file_node_linear("zeta").is_none());
    }

    #[test]
    fn test_file_names_sorted_and_skips_tombstones() {
        let mut tree = ManifestTree::new("t");
        for name in ["gamma", "alpha", "beta"] {
            tree.add_file(entry(name));
        }
        assert_eq!(tree.file_names(), vec!["alpha", "beta", "gamma"]);
        tree.mark_file_as_deleted("beta");
        assert_eq!(tree.file_names(), vec!["alpha", "gamma"]);
    }

    #[test]
    fn test_find_node_ref_exposes_rank() {
        let mut tree = ManifestTree::new("t");
        tree.add_file(entry("first"));
        tree.add_file(entry("second"));
        assert_eq!(tree.find_node_ref("first").unwrap().rank, 0);
        assert_eq!(tree.find_node_ref("second").unwrap().rank, 1);
    }
}
