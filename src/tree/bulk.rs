//! Bulk tree construction from a known leaf set
//!
//! Used when rebuilding a manifest from scratch instead of appending
//! incrementally. Leaves are sorted by name, then adjacent pairs are
//! combined level by level; an odd trailing element is carried forward
//! unmodified, never duplicated. The resulting root hash is a function
//! of the multiset of (name, content hash) pairs only, independent of
//! the order the caller supplied them in. The incremental engine's
//! intermediate shapes are deliberately not required to match this.

use crate::tree::node::{FileEntry, LeafNode, Node};
use crate::tree::ManifestTree;
use tracing::debug;

/// Build a complete tree from a set of file entries.
///
/// Entries are sorted by (name, directory) internally, so any permutation
/// of the same file set produces an identical root hash.
pub fn build_merkle_tree(id: impl Into<String>, mut entries: Vec<FileEntry>) -> ManifestTree {
    entries.sort_by(|a, b| a.name.cmp(&b.name).then(a.directory.cmp(&b.directory)));

    let mut tree = ManifestTree::new(id);
    if entries.is_empty() {
        return tree;
    }

    let count = entries.len();
    let mut level: Vec<_> = entries
        .into_iter()
        .enumerate()
        .map(|(rank, entry)| {
            tree.index.insert(&entry.name, rank as u64);
            tree.arena.alloc(Node::Leaf(LeafNode::from_entry(entry)))
        })
        .collect();

    // Pair adjacent subtrees left to right; an odd tail rides along to
    // the next level untouched.
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len() / 2 + 1);
        let mut pairs = level.chunks_exact(2);
        for pair in &mut pairs {
            next.push(tree.make_internal(pair[0], pair[1]));
        }
        if let [odd] = pairs.remainder() {
            next.push(*odd);
        }
        level = next;
    }

    tree.root = Some(level[0]);
    tree.sync_totals();

    debug!(
        files = count,
        root = %hex::encode(tree.root_hash().unwrap_or_default()),
        "bulk-built manifest tree"
    );
    tree
}
