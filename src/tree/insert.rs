//! Incremental insertion engine
//!
//! Appending the (n+1)-th leaf mirrors incrementing a binary counter: the
//! tree is a right-leaning chain of complete power-of-two subtrees, one
//! per set bit of the leaf count, ordered largest to smallest. The new
//! leaf starts as a size-1 carry and merges with equal-sized neighbors
//! until none remains, giving O(log N) amortized insertion and a shape
//! that is a deterministic function of N.

use crate::tree::node::{FileEntry, LeafNode, Node};
use crate::tree::ManifestTree;
use crate::types::NodeIx;
use tracing::debug;

impl ManifestTree {
    /// Append a file to the manifest.
    ///
    /// No uniqueness is enforced here: callers may append duplicate names
    /// (legal when the directory differs); the lookup index decides which
    /// leaf a name resolves to. The new entry's rank is the file count
    /// before the insert.
    pub fn add_file(&mut self, entry: FileEntry) {
        let rank = self.total_files;
        let name = entry.name.clone();
        let leaf = self.arena.alloc(Node::Leaf(LeafNode::from_entry(entry)));

        match self.root {
            None => {
                self.root = Some(leaf);
            }
            Some(root) => {
                let (mut blocks, spine) = self.spine_blocks(root);
                for ix in spine {
                    self.arena.release(ix);
                }

                // Carry propagation: merge while the innermost block has
                // the same leaf count as the carry.
                let mut carry = leaf;
                while let Some(&block) = blocks.last() {
                    if self.arena.node(block).leaf_count()
                        != self.arena.node(carry).leaf_count()
                    {
                        break;
                    }
                    blocks.pop();
                    carry = self.make_internal(block, carry);
                }

                // Re-thread the remaining blocks into the right-leaning
                // chain, smallest joined first.
                let mut chain = carry;
                for &block in blocks.iter().rev() {
                    chain = self.make_internal(block, chain);
                }
                self.arena.set_parent(chain, None);
                self.root = Some(chain);
            }
        }

        self.sync_totals();
        self.index.insert(&name, rank);

        debug!(
            file = %name,
            rank,
            total_files = self.total_files,
            total_nodes = self.total_nodes,
            "added file to manifest"
        );
    }

    /// Decompose the right spine into its complete blocks.
    ///
    /// Returns the blocks outermost-first plus the spine's internal nodes,
    /// which the caller discards before re-threading. A subtree whose leaf
    /// count is a power of two terminates the walk: under the shape
    /// invariant a spine joint always aggregates at least two distinct
    /// powers, so its count can never itself be one.
    fn spine_blocks(&self, root: NodeIx) -> (Vec<NodeIx>, Vec<NodeIx>) {
        let mut blocks = Vec::new();
        let mut spine = Vec::new();
        let mut cursor = root;
        loop {
            match self.arena.node(cursor) {
                Node::Leaf(_) => {
                    blocks.push(cursor);
                    break;
                }
                Node::Internal(n) => {
                    if n.leaf_count.is_power_of_two() {
                        blocks.push(cursor);
                        break;
                    }
                    blocks.push(n.left);
                    spine.push(cursor);
                    cursor = n.right;
                }
            }
        }
        (blocks, spine)
    }
}
