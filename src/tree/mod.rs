//! Content hash tree over a named file set
//!
//! The tree aggregates per-file content hashes into a single root hash
//! that changes exactly when the file set changes. Construction is
//! incremental (`add_file`, binary-counter shape) or bulk
//! (`build_merkle_tree`, order-independent root); lookups go through a
//! name-sorted side index; mutation keeps ancestor hashes and aggregate
//! counts consistent through one shared repair path.

pub mod balance;
pub mod bulk;
pub mod codec;
pub mod diff;
pub mod hasher;
pub mod index;
pub mod insert;
pub mod mutate;
pub mod node;

pub use bulk::build_merkle_tree;
pub use codec::{
    decode_tree, encode_tree, load_tree, load_tree_version, peek_version, save_tree, save_tree_v2,
    FORMAT_V1, FORMAT_V2,
};
pub use diff::{diff_trees, ManifestDiff};
pub use index::IndexEntry;
pub use mutate::DeleteMode;
pub use node::{Arena, FileEntry, InternalNode, LeafNode, Node};

use crate::tree::hasher::combine_hashes;
use crate::tree::index::SortedIndex;
use crate::types::{Hash, NodeIx};
use chrono::{DateTime, Utc};

/// A verifiable index over a set of named files.
///
/// Plain in-memory data with no internal synchronization: one logical
/// writer at a time, reads only while no mutation is in flight.
#[derive(Debug, Clone)]
pub struct ManifestTree {
    pub(crate) id: String,
    pub(crate) version: u32,
    pub(crate) root: Option<NodeIx>,
    pub(crate) arena: Arena,
    pub(crate) index: SortedIndex,
    pub(crate) total_files: u64,
    pub(crate) total_nodes: u64,
    pub(crate) total_size: u64,
    pub(crate) last_updated: DateTime<Utc>,
}

impl ManifestTree {
    /// Create an empty tree with a stable identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: codec::FORMAT_V2,
            root: None,
            arena: Arena::new(),
            index: SortedIndex::new(),
            total_files: 0,
            total_nodes: 0,
            total_size: 0,
            last_updated: Utc::now(),
        }
    }

    pub(crate) fn from_parts(
        id: String,
        version: u32,
        root: Option<NodeIx>,
        arena: Arena,
        index: SortedIndex,
        total_files: u64,
        total_nodes: u64,
        total_size: u64,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            version,
            root,
            arena,
            index,
            total_files,
            total_nodes,
            total_size,
            last_updated,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// On-disk format version this tree was loaded with (or will save as)
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn root(&self) -> Option<NodeIx> {
        self.root
    }

    /// Root hash, the content fingerprint of the whole file set
    pub fn root_hash(&self) -> Option<Hash> {
        self.root.map(|ix| self.arena.node(ix).hash())
    }

    /// Structural file count; tombstoned leaves are included
    pub fn total_files(&self) -> u64 {
        self.total_files
    }

    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn node(&self, ix: NodeIx) -> &Node {
        self.arena.node(ix)
    }

    /// Build an internal node over two existing subtrees
    pub(crate) fn make_internal(&mut self, left: NodeIx, right: NodeIx) -> NodeIx {
        let (l, r) = (self.arena.node(left), self.arena.node(right));
        let min_name = if l.min_name() <= r.min_name() {
            l.min_name().to_string()
        } else {
            r.min_name().to_string()
        };
        let internal = InternalNode {
            left,
            right,
            hash: combine_hashes(&l.hash(), &r.hash()),
            node_count: 1 + l.node_count() + r.node_count(),
            leaf_count: l.leaf_count() + r.leaf_count(),
            size: l.size() + r.size(),
            min_name,
        };
        let ix = self.arena.alloc(Node::Internal(internal));
        self.arena.set_parent(left, Some(ix));
        self.arena.set_parent(right, Some(ix));
        ix
    }

    /// Recompute an internal node's hash, counts, size and min-name from
    /// its children. No-op for leaves.
    pub(crate) fn refresh_internal(&mut self, ix: NodeIx) {
        let (left, right) = match self.arena.node(ix) {
            Node::Internal(n) => (n.left, n.right),
            Node::Leaf(_) => return,
        };
        let (l, r) = (self.arena.node(left), self.arena.node(right));
        let hash = combine_hashes(&l.hash(), &r.hash());
        let node_count = 1 + l.node_count() + r.node_count();
        let leaf_count = l.leaf_count() + r.leaf_count();
        let size = l.size() + r.size();
        let min_name = if l.min_name() <= r.min_name() {
            l.min_name().to_string()
        } else {
            r.min_name().to_string()
        };
        if let Node::Internal(n) = self.arena.node_mut(ix) {
            n.hash = hash;
            n.node_count = node_count;
            n.leaf_count = leaf_count;
            n.size = size;
            n.min_name = min_name;
        }
    }

    /// Repair path: recompute every ancestor from `from` up to the root.
    ///
    /// The single bottom-up routine shared by insertion, update, delete
    /// and rebalancing, so the hash-of-children invariant cannot be
    /// violated by a missed call site.
    pub(crate) fn repair_upward(&mut self, from: Option<NodeIx>) {
        let mut cursor = from;
        while let Some(ix) = cursor {
            self.refresh_internal(ix);
            cursor = self.arena.parent(ix);
        }
    }

    /// Refresh the tree-level totals from the root aggregates
    pub(crate) fn sync_totals(&mut self) {
        match self.root {
            Some(root) => {
                let node = self.arena.node(root);
                self.total_nodes = node.node_count();
                self.total_files = node.leaf_count();
                self.total_size = node.size();
            }
            None => {
                self.total_nodes = 0;
                self.total_files = 0;
                self.total_size = 0;
            }
        }
        self.last_updated = Utc::now();
    }

    /// Resolve an in-order leaf rank to its current arena position by
    /// descending on `leaf_count`. O(log N).
    pub(crate) fn leaf_at_rank(&self, rank: u64) -> Option<NodeIx> {
        let mut ix = self.root?;
        let mut rank = rank;
        loop {
            match self.arena.node(ix) {
                Node::Leaf(_) => return (rank == 0).then_some(ix),
                Node::Internal(n) => {
                    let left_leaves = self.arena.node(n.left).leaf_count();
                    if rank < left_leaves {
                        ix = n.left;
                    } else {
                        rank -= left_leaves;
                        ix = n.right;
                    }
                }
            }
        }
    }

    /// Inverse of [`leaf_at_rank`](Self::leaf_at_rank): the leaf's 0-based
    /// position in left-to-right leaf order.
    pub(crate) fn leaf_rank(&self, leaf: NodeIx) -> u64 {
        let mut rank = 0;
        let mut cursor = leaf;
        while let Some(parent) = self.arena.parent(cursor) {
            if let Node::Internal(n) = self.arena.node(parent) {
                if n.right == cursor {
                    rank += self.arena.node(n.left).leaf_count();
                }
            }
            cursor = parent;
        }
        rank
    }

    /// All non-tombstoned leaves in left-to-right order
    pub fn get_active_files(&self) -> Vec<&LeafNode> {
        let mut leaves = Vec::new();
        if let Some(root) = self.root {
            self.collect_leaves(root, &mut |leaf| !leaf.is_deleted, &mut leaves);
        }
        leaves
    }

    /// All leaves in left-to-right order, tombstones included
    pub fn all_leaves(&self) -> Vec<&LeafNode> {
        let mut leaves = Vec::new();
        if let Some(root) = self.root {
            self.collect_leaves(root, &mut |_| true, &mut leaves);
        }
        leaves
    }

    fn collect_leaves<'a>(
        &'a self,
        ix: NodeIx,
        keep: &mut dyn FnMut(&LeafNode) -> bool,
        out: &mut Vec<&'a LeafNode>,
    ) {
        // Depth is logarithmic for any tree this crate builds, so plain
        // recursion is safe.
        match self.arena.node(ix) {
            Node::Leaf(leaf) => {
                if keep(leaf) {
                    out.push(leaf);
                }
            }
            Node::Internal(n) => {
                self.collect_leaves(n.left, keep, out);
                self.collect_leaves(n.right, keep, out);
            }
        }
    }
}
