//! Mutation operators: in-place update and deletion
//!
//! Both deletion styles are one tagged operation so callers reason about
//! a single state machine. Tombstoning is the canonical delete: it keeps
//! the leaf's position, which a sync protocol needs to reconcile
//! concurrent edits, and its changed hash keeps the deletion visible in
//! the root hash. Hard delete structurally removes the leaf and exists as
//! the compaction pass.

use crate::tree::node::{FileEntry, Node};
use crate::tree::ManifestTree;
use crate::types::NodeIx;
use tracing::debug;

/// How a delete takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Structural removal: sibling promotion, counts decremented,
    /// higher index ranks shifted down
    Hard,
    /// Leaf kept in place with `is_deleted` set and size forced to zero;
    /// its hash contribution flips so the root hash records the deletion
    Tombstone,
}

impl ManifestTree {
    /// Replace a file's content hash, size and timestamp in place.
    ///
    /// Returns `false` without any change when the name resolves to no
    /// live file. Tree shape, counts and the sorted index are untouched;
    /// ancestor hashes are fully recomputed from children, since the
    /// hash is not homomorphic and has no incremental shortcut.
    pub fn update_file(&mut self, entry: &FileEntry) -> bool {
        let Some((_, ix)) = self.find_leaf_for(&entry.name, entry.directory.as_deref()) else {
            return false;
        };

        let old_size = match self.arena.node_mut(ix) {
            Node::Leaf(leaf) => {
                if leaf.is_deleted {
                    return false;
                }
                let old = leaf.size;
                leaf.content_hash = entry.content_hash;
                leaf.size = entry.size;
                leaf.last_modified = entry.last_modified;
                old
            }
            Node::Internal(_) => return false,
        };

        let parent = self.arena.parent(ix);
        self.repair_upward(parent);
        self.total_size = self.total_size - old_size + entry.size;
        self.last_updated = chrono::Utc::now();

        debug!(
            file = %entry.name,
            size = entry.size,
            hash = %hex::encode(entry.content_hash),
            "updated file in manifest"
        );
        true
    }

    /// Delete a file by name, optionally disambiguated by directory.
    ///
    /// Returns `false` without any change when the file is not found.
    /// `Tombstone` also returns `false` for an already-tombstoned leaf;
    /// `Hard` removes tombstones too (compaction).
    pub fn delete_file(&mut self, name: &str, directory: Option<&str>, mode: DeleteMode) -> bool {
        let Some((pos, ix)) = self.find_leaf_for(name, directory) else {
            return false;
        };
        match mode {
            DeleteMode::Tombstone => self.tombstone_leaf(name, ix),
            DeleteMode::Hard => self.remove_leaf(name, pos, ix),
        }
    }

    /// Convenience wrapper for the canonical soft delete
    pub fn mark_file_as_deleted(&mut self, name: &str) -> bool {
        self.delete_file(name, None, DeleteMode::Tombstone)
    }

    fn tombstone_leaf(&mut self, name: &str, ix: NodeIx) -> bool {
        let freed = match self.arena.node_mut(ix) {
            Node::Leaf(leaf) => {
                if leaf.is_deleted {
                    return false;
                }
                leaf.is_deleted = true;
                std::mem::take(&mut leaf.size)
            }
            Node::Internal(_) => return false,
        };

        let parent = self.arena.parent(ix);
        self.repair_upward(parent);
        self.total_size -= freed;
        self.last_updated = chrono::Utc::now();

        debug!(file = %name, freed, "tombstoned file");
        true
    }

    fn remove_leaf(&mut self, name: &str, pos: usize, ix: NodeIx) -> bool {
        let rank = self.leaf_rank(ix);

        match self.arena.parent(ix) {
            None => {
                // Sole remaining file: the tree becomes empty
                self.arena.release(ix);
                self.root = None;
            }
            Some(parent) => {
                // Sibling promotion: the parent collapses into the
                // deleted leaf's sibling.
                let sibling = match self.arena.node(parent) {
                    Node::Internal(n) => {
                        if n.left == ix {
                            n.right
                        } else {
                            n.left
                        }
                    }
                    Node::Leaf(_) => unreachable!("leaf parent must be internal"),
                };
                let grandparent = self.arena.parent(parent);
                self.arena.release(ix);
                self.arena.release(parent);

                match grandparent {
                    Some(g) => {
                        if let Node::Internal(n) = self.arena.node_mut(g) {
                            if n.left == parent {
                                n.left = sibling;
                            } else {
                                n.right = sibling;
                            }
                        }
                        self.arena.set_parent(sibling, Some(g));
                    }
                    None => {
                        self.arena.set_parent(sibling, None);
                        self.root = Some(sibling);
                    }
                }

                // Repair and rebalance every ancestor bottom-up
                let mut cursor = grandparent;
                while let Some(node) = cursor {
                    self.refresh_internal(node);
                    let settled = self.rebalance(node);
                    cursor = self.arena.parent(settled);
                }
            }
        }

        self.index.remove_at(pos);
        self.index.shift_ranks_above(rank);
        self.sync_totals();

        debug!(file = %name, rank, "hard-deleted file");
        true
    }
}
