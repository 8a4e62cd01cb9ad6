//! Manifest diffing
//!
//! Root hashes answer "did anything change" in O(1); this module answers
//! "what changed" by classifying active files across two trees. Used by
//! the CLI `diff` command and by replica reconciliation.

use crate::tree::ManifestTree;
use std::collections::BTreeMap;

/// File-level differences between two manifests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    /// Present in the right tree only
    pub added: Vec<String>,
    /// Present in the left tree only
    pub removed: Vec<String>,
    /// Present in both with differing content hashes
    pub modified: Vec<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Compare two trees' active files by qualified name.
///
/// Tombstoned leaves count as absent, so a tombstone on one side shows up
/// as a removal, matching what the root hashes already imply.
pub fn diff_trees(left: &ManifestTree, right: &ManifestTree) -> ManifestDiff {
    let left_files = active_map(left);
    let right_files = active_map(right);

    let mut diff = ManifestDiff::default();
    for (name, hash) in &left_files {
        match right_files.get(name) {
            None => diff.removed.push(name.clone()),
            Some(other) if other != hash => diff.modified.push(name.clone()),
            Some(_) => {}
        }
    }
    for name in right_files.keys() {
        if !left_files.contains_key(name) {
            diff.added.push(name.clone());
        }
    }
    diff
}

fn active_map(tree: &ManifestTree) -> BTreeMap<String, crate::types::Hash> {
    tree.get_active_files()
        .into_iter()
        .map(|leaf| {
            let key = match &leaf.directory {
                Some(dir) => format!("{}/{}", dir, leaf.name),
                None => leaf.name.clone(),
            };
            (key, leaf.content_hash)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::hasher::hash_bytes;
    use crate::tree::node::FileEntry;

    fn entry(name: &str, contents: &[u8]) -> FileEntry {
        FileEntry::new(name, hash_bytes(contents), contents.len() as u64)
    }

    #[test]
    fn test_identical_trees_diff_empty() {
        let mut a = ManifestTree::new("a");
        let mut b = ManifestTree::new("b");
        for name in ["x", "y"] {
            a.add_file(entry(name, name.as_bytes()));
            b.add_file(entry(name, name.as_bytes()));
        }
        assert!(diff_trees(&a, &b).is_empty());
    }

    #[test]
    fn test_classifies_added_removed_modified() {
        let mut a = ManifestTree::new("a");
        a.add_file(entry("kept", b"same"));
        a.add_file(entry("gone", b"old"));
        a.add_file(entry("edited", b"before"));

        let mut b = ManifestTree::new("b");
        b.add_file(entry("kept", b"same"));
        b.add_file(entry("edited", b"after"));
        b.add_file(entry("fresh", b"new"));

        let diff = diff_trees(&a, &b);
        assert_eq!(diff.removed, vec!["gone"]);
        assert_eq!(diff.modified, vec!["edited"]);
        assert_eq!(diff.added, vec!["fresh"]);
    }

    #[test]
    fn test_tombstone_reads_as_removal() {
        let mut a = ManifestTree::new("a");
        a.add_file(entry("doomed", b"bytes"));
        let mut b = a.clone();
        b.mark_file_as_deleted("doomed");
        let diff = diff_trees(&a, &b);
        assert_eq!(diff.removed, vec!["doomed"]);
        assert!(diff.added.is_empty());
    }
}
