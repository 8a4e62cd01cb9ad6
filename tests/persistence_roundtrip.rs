//! Persistence format tests through the byte-storage boundary

use canopy::error::CanopyError;
use canopy::store::{ByteStore, FsStore, MemoryStore};
use canopy::tree::{
    build_merkle_tree, encode_tree, hasher, load_tree, load_tree_version, save_tree, save_tree_v2,
    FileEntry, ManifestTree, FORMAT_V1, FORMAT_V2,
};

fn entry(name: &str, size: u64) -> FileEntry {
    FileEntry::new(name, hasher::hash_bytes(name.as_bytes()), size)
}

fn sample_tree(n: usize) -> ManifestTree {
    let mut tree = ManifestTree::new("persisted");
    for i in 0..n {
        tree.add_file(entry(&format!("file-{:03}", i), 32));
    }
    tree
}

#[tokio::test]
async fn save_load_round_trips_all_aggregates() {
    let store = MemoryStore::new();
    let tree = sample_tree(11);

    save_tree_v2(&tree, &store, "tree.bin").await.unwrap();
    let loaded = load_tree(&store, "tree.bin").await.unwrap().unwrap();

    assert_eq!(loaded.id(), tree.id());
    assert_eq!(loaded.total_files(), tree.total_files());
    assert_eq!(loaded.total_nodes(), tree.total_nodes());
    assert_eq!(loaded.total_size(), tree.total_size());
    assert_eq!(loaded.root_hash(), tree.root_hash());

    // Every node's hash and counts survive, observed leaf by leaf
    let before = tree.all_leaves();
    let after = loaded.all_leaves();
    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.size, b.size);
        assert_eq!(
            a.last_modified.timestamp_millis(),
            b.last_modified.timestamp_millis()
        );
    }
}

#[tokio::test]
async fn v1_load_rebuilds_identical_lookup_results() {
    let store = MemoryStore::new();
    let tree = sample_tree(9);

    save_tree(&tree, &store, "tree-v1.bin").await.unwrap();
    let loaded = load_tree(&store, "tree-v1.bin").await.unwrap().unwrap();
    assert_eq!(loaded.version(), FORMAT_V1);

    for i in 0..9 {
        let name = format!("file-{:03}", i);
        let a = tree.find_file_node(&name).unwrap();
        let b = loaded.find_file_node(&name).unwrap();
        assert_eq!(a.content_hash, b.content_hash);
    }
    assert!(loaded.find_file_node("file-999").is_none());
}

#[tokio::test]
async fn load_missing_path_is_not_found_not_error() {
    let store = MemoryStore::new();
    assert!(load_tree(&store, "never-saved.bin").await.unwrap().is_none());
    assert_eq!(
        load_tree_version(&store, "never-saved.bin").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn version_probe_handles_short_files_without_error() {
    let store = MemoryStore::new();

    store.write("zero.bin", b"").await.unwrap();
    assert_eq!(load_tree_version(&store, "zero.bin").await.unwrap(), None);

    store.write("two.bin", &[1, 0]).await.unwrap();
    assert_eq!(load_tree_version(&store, "two.bin").await.unwrap(), None);
}

#[tokio::test]
async fn version_probe_agrees_with_full_load() {
    let store = MemoryStore::new();
    let tree = sample_tree(4);

    save_tree(&tree, &store, "v1.bin").await.unwrap();
    save_tree_v2(&tree, &store, "v2.bin").await.unwrap();

    for (path, expected) in [("v1.bin", FORMAT_V1), ("v2.bin", FORMAT_V2)] {
        let probed = load_tree_version(&store, path).await.unwrap();
        let full = load_tree(&store, path).await.unwrap().unwrap();
        assert_eq!(probed, Some(expected));
        assert_eq!(full.version(), expected);
    }
}

#[tokio::test]
async fn corrupt_payload_surfaces_hard_error() {
    let store = MemoryStore::new();
    let mut bytes = encode_tree(&sample_tree(6), FORMAT_V2).unwrap();
    bytes.truncate(bytes.len() - 7);
    store.write("corrupt.bin", &bytes).await.unwrap();

    match load_tree(&store, "corrupt.bin").await {
        Err(CanopyError::Corrupt(_)) => {}
        other => panic!("expected corrupt error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn round_trip_through_filesystem_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path());

    let names = ["a.txt", "b.txt", "c.txt"];
    let tree = build_merkle_tree("fs", names.iter().map(|n| entry(n, 8)).collect());
    save_tree_v2(&tree, &store, "manifests/tree.bin").await.unwrap();

    assert!(store.file_exists("manifests/tree.bin").await.unwrap());
    let loaded = load_tree(&store, "manifests/tree.bin").await.unwrap().unwrap();
    assert_eq!(loaded.root_hash(), tree.root_hash());
    for name in names {
        assert!(loaded.find_file_node(name).is_some());
    }
}

#[tokio::test]
async fn tombstones_and_mutations_survive_round_trip() {
    let store = MemoryStore::new();
    let mut tree = sample_tree(8);
    tree.mark_file_as_deleted("file-002");
    let mut updated = entry("file-005", 99);
    updated.content_hash = hasher::hash_bytes(b"rewritten");
    assert!(tree.update_file(&updated));

    save_tree_v2(&tree, &store, "mutated.bin").await.unwrap();
    let loaded = load_tree(&store, "mutated.bin").await.unwrap().unwrap();

    assert_eq!(loaded.root_hash(), tree.root_hash());
    assert!(loaded.find_file_node("file-002").is_none());
    assert!(loaded
        .find_file_node_with_deletion_status("file-002")
        .unwrap()
        .is_deleted);
    assert_eq!(
        loaded.find_file_node("file-005").unwrap().content_hash,
        hasher::hash_bytes(b"rewritten")
    );
    assert_eq!(loaded.get_active_files().len(), 7);
}
