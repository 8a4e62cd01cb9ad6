//! Weight-balance repair via single rotations
//!
//! The insertion engine guarantees an exact shape; deletion only promises
//! the weaker bound |leftCount − rightCount| ≤ 2 at every internal node,
//! restored where violated by a single rotation. The two passes are kept
//! independent on purpose: exact-shape and bounded-imbalance are separate
//! guarantees with separate tests.

use crate::tree::node::Node;
use crate::tree::ManifestTree;
use crate::types::NodeIx;
use tracing::trace;

/// Imbalance beyond which a rotation is applied
const MAX_IMBALANCE: i64 = 2;

impl ManifestTree {
    /// Single right rotation: the left child becomes the subtree root and
    /// the old root is rebuilt as `(leftChild.right, oldRight)`. Counts
    /// and hashes along the rotated edge are recomputed bottom-up.
    /// Returns the new subtree root.
    pub fn rotate_right(&mut self, ix: NodeIx) -> NodeIx {
        let parent = self.arena.parent(ix);
        let (left, _right) = match self.arena.node(ix) {
            Node::Internal(n) => (n.left, n.right),
            Node::Leaf(_) => return ix,
        };
        let left_right = match self.arena.node(left) {
            Node::Internal(n) => n.right,
            Node::Leaf(_) => return ix,
        };

        // Old root keeps its slot and becomes the new right child over
        // (left.right, right).
        if let Node::Internal(n) = self.arena.node_mut(ix) {
            n.left = left_right;
        }
        self.arena.set_parent(left_right, Some(ix));
        self.refresh_internal(ix);

        if let Node::Internal(n) = self.arena.node_mut(left) {
            n.right = ix;
        }
        self.arena.set_parent(ix, Some(left));
        self.refresh_internal(left);

        self.replace_child(parent, ix, left);
        left
    }

    /// Mirror of [`rotate_right`](Self::rotate_right)
    pub fn rotate_left(&mut self, ix: NodeIx) -> NodeIx {
        let parent = self.arena.parent(ix);
        let (_left, right) = match self.arena.node(ix) {
            Node::Internal(n) => (n.left, n.right),
            Node::Leaf(_) => return ix,
        };
        let right_left = match self.arena.node(right) {
            Node::Internal(n) => n.left,
            Node::Leaf(_) => return ix,
        };

        if let Node::Internal(n) = self.arena.node_mut(ix) {
            n.right = right_left;
        }
        self.arena.set_parent(right_left, Some(ix));
        self.refresh_internal(ix);

        if let Node::Internal(n) = self.arena.node_mut(right) {
            n.left = ix;
        }
        self.arena.set_parent(ix, Some(right));
        self.refresh_internal(right);

        self.replace_child(parent, ix, right);
        right
    }

    /// Restore the weight-balance bound at one node.
    ///
    /// Idempotent: a node already within bounds is returned unchanged
    /// under the identical arena index, so callers can cheaply detect
    /// "no change".
    pub fn rebalance(&mut self, ix: NodeIx) -> NodeIx {
        let (left, right) = match self.arena.node(ix) {
            Node::Internal(n) => (n.left, n.right),
            Node::Leaf(_) => return ix,
        };
        let imbalance =
            self.arena.node(left).node_count() as i64 - self.arena.node(right).node_count() as i64;
        if imbalance > MAX_IMBALANCE {
            trace!(imbalance, "left-heavy subtree, rotating right");
            self.rotate_right(ix)
        } else if imbalance < -MAX_IMBALANCE {
            trace!(imbalance, "right-heavy subtree, rotating left");
            self.rotate_left(ix)
        } else {
            ix
        }
    }

    /// Rewire `parent`'s child slot from `old` to `new`; hoists to root
    /// when there is no parent.
    fn replace_child(&mut self, parent: Option<NodeIx>, old: NodeIx, new: NodeIx) {
        match parent {
            Some(p) => {
                if let Node::Internal(n) = self.arena.node_mut(p) {
                    if n.left == old {
                        n.left = new;
                    } else if n.right == old {
                        n.right = new;
                    }
                }
                self.arena.set_parent(new, Some(p));
            }
            None => {
                self.arena.set_parent(new, None);
                self.root = Some(new);
            }
        }
    }
}
