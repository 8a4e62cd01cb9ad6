//! Manifest node model and arena storage
//!
//! Nodes live in an index arena rather than behind pointers: child and
//! parent links are plain `NodeIx` values, which matches the flattened
//! on-disk layout and keeps mutation free of ownership gymnastics.

use crate::tree::hasher;
use crate::types::{Hash, NodeIx};
use chrono::{DateTime, Utc};

/// Descriptor for a file being inserted or updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub directory: Option<String>,
    pub content_hash: Hash,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, content_hash: Hash, size: u64) -> Self {
        Self {
            name: name.into(),
            directory: None,
            content_hash,
            size,
            last_modified: Utc::now(),
        }
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// File-bearing leaf node
#[derive(Debug, Clone)]
pub struct LeafNode {
    pub name: String,
    pub directory: Option<String>,
    pub content_hash: Hash,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub is_deleted: bool,
}

impl LeafNode {
    pub fn from_entry(entry: FileEntry) -> Self {
        Self {
            name: entry.name,
            directory: entry.directory,
            content_hash: entry.content_hash,
            size: entry.size,
            last_modified: entry.last_modified,
            is_deleted: false,
        }
    }

    /// Hash this leaf contributes to its ancestors.
    ///
    /// A live leaf contributes its content hash unchanged. A tombstoned
    /// leaf contributes a domain-separated digest of the content hash, so
    /// the deletion stays visible to anyone diffing root hashes.
    pub fn hash(&self) -> Hash {
        if self.is_deleted {
            hasher::tombstone_hash(&self.content_hash)
        } else {
            self.content_hash
        }
    }
}

/// Structural aggregation node; both children are always present
#[derive(Debug, Clone)]
pub struct InternalNode {
    pub left: NodeIx,
    pub right: NodeIx,
    pub hash: Hash,
    pub node_count: u64,
    pub leaf_count: u64,
    pub size: u64,
    pub min_name: String,
}

/// Manifest tree node
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn hash(&self) -> Hash {
        match self {
            Node::Leaf(leaf) => leaf.hash(),
            Node::Internal(internal) => internal.hash,
        }
    }

    pub fn node_count(&self) -> u64 {
        match self {
            Node::Leaf(_) => 1,
            Node::Internal(internal) => internal.node_count,
        }
    }

    pub fn leaf_count(&self) -> u64 {
        match self {
            Node::Leaf(_) => 1,
            Node::Internal(internal) => internal.leaf_count,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Node::Leaf(leaf) => leaf.size,
            Node::Internal(internal) => internal.size,
        }
    }

    pub fn min_name(&self) -> &str {
        match self {
            Node::Leaf(leaf) => &leaf.name,
            Node::Internal(internal) => &internal.min_name,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Internal(_) => None,
        }
    }

    pub fn as_internal(&self) -> Option<&InternalNode> {
        match self {
            Node::Leaf(_) => None,
            Node::Internal(internal) => Some(internal),
        }
    }
}

/// Slab of nodes addressed by `NodeIx`, with parallel parent links.
///
/// Freed slots are recycled through a free list; a slot index is stable
/// for as long as its node is alive.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    slots: Vec<Option<Node>>,
    parents: Vec<Option<NodeIx>>,
    free: Vec<NodeIx>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeIx {
        match self.free.pop() {
            Some(ix) => {
                self.slots[ix] = Some(node);
                self.parents[ix] = None;
                ix
            }
            None => {
                self.slots.push(Some(node));
                self.parents.push(None);
                self.slots.len() - 1
            }
        }
    }

    pub fn release(&mut self, ix: NodeIx) {
        self.slots[ix] = None;
        self.parents[ix] = None;
        self.free.push(ix);
    }

    /// Borrow the node at `ix`. Panics on a freed slot, which can only
    /// mean a stale index was retained across a structural mutation;
    /// documented caller misuse rather than a recoverable error.
    pub fn node(&self, ix: NodeIx) -> &Node {
        self.slots[ix].as_ref().expect("stale node index")
    }

    pub fn node_mut(&mut self, ix: NodeIx) -> &mut Node {
        self.slots[ix].as_mut().expect("stale node index")
    }

    pub fn parent(&self, ix: NodeIx) -> Option<NodeIx> {
        self.parents[ix]
    }

    pub fn set_parent(&mut self, ix: NodeIx, parent: Option<NodeIx>) {
        self.parents[ix] = parent;
    }

    /// Number of live nodes
    pub fn live_len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
