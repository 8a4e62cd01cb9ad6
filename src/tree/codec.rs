//! Versioned binary persistence for manifest trees
//!
//! Both formats are little-endian. Bytes [0..4) carry the format version
//! as a u32; the metadata block and the pre-order flattened node array
//! follow. Version 1 omits the sorted lookup index, which is rebuilt on
//! load by an O(N log N) scan; version 2 appends the index entries
//! verbatim. A save always writes a fully consistent snapshot.
//!
//! Error taxonomy: a missing blob loads as `Ok(None)` and a sub-4-byte
//! blob has "no version"; neither is an error. Anything else malformed
//! is a hard `Corrupt` error; there is no partial recovery.

use crate::error::CanopyError;
use crate::store::ByteStore;
use crate::tree::index::SortedIndex;
use crate::tree::node::{Arena, InternalNode, LeafNode, Node};
use crate::tree::ManifestTree;
use crate::types::{Hash, NodeIx};
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info};

/// Original format: metadata + pre-order node array
pub const FORMAT_V1: u32 = 1;
/// Adds the sorted lookup index after the node array
pub const FORMAT_V2: u32 = 2;

const TAG_INTERNAL: u8 = 0;
const TAG_LEAF: u8 = 1;
const FLAG_DELETED: u8 = 0b0000_0001;

/// Deepest node nesting the decoder will follow. The construction paths
/// keep depth logarithmic in the leaf count, so anything past this limit
/// can only be corrupt bytes; failing early keeps the recursion off the
/// stack-overflow path.
const MAX_DECODE_DEPTH: u32 = 256;

/// Read the format version from raw bytes without decoding the rest.
/// `None` ("unknown") for anything shorter than the 4-byte header.
pub fn peek_version(bytes: &[u8]) -> Option<u32> {
    let header: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(header))
}

/// Serialize a tree in the requested format version
pub fn encode_tree(tree: &ManifestTree, version: u32) -> Result<Vec<u8>, CanopyError> {
    if version != FORMAT_V1 && version != FORMAT_V2 {
        return Err(CanopyError::UnsupportedVersion(version));
    }

    let mut out = Writer::new();
    out.u32(version);
    out.string(&tree.id);
    out.u64(tree.total_files);
    out.u64(tree.total_nodes);
    out.u64(tree.total_size);
    out.i64(tree.last_updated.timestamp_millis());

    match tree.root {
        Some(root) => {
            out.u8(1);
            encode_node(tree, root, &mut out);
        }
        None => out.u8(0),
    }

    if version == FORMAT_V2 {
        out.u64(tree.index.len() as u64);
        for entry in tree.index.entries() {
            out.string(&entry.name);
            out.u64(entry.rank);
        }
    }

    Ok(out.into_bytes())
}

fn encode_node(tree: &ManifestTree, ix: NodeIx, out: &mut Writer) {
    match tree.node(ix) {
        Node::Internal(n) => {
            out.u8(TAG_INTERNAL);
            out.hash(&n.hash);
            out.u64(n.node_count);
            out.u64(n.leaf_count);
            out.u64(n.size);
            out.string(&n.min_name);
            encode_node(tree, n.left, out);
            encode_node(tree, n.right, out);
        }
        Node::Leaf(leaf) => {
            out.u8(TAG_LEAF);
            out.hash(&leaf.content_hash);
            out.u64(leaf.size);
            out.i64(leaf.last_modified.timestamp_millis());
            out.u8(if leaf.is_deleted { FLAG_DELETED } else { 0 });
            out.string(&leaf.name);
            match &leaf.directory {
                Some(dir) => {
                    out.u8(1);
                    out.string(dir);
                }
                None => out.u8(0),
            }
        }
    }
}

/// Deserialize a tree from raw bytes, either format version
pub fn decode_tree(bytes: &[u8]) -> Result<ManifestTree, CanopyError> {
    let mut reader = Reader::new(bytes);
    let version = reader.u32()?;
    if version != FORMAT_V1 && version != FORMAT_V2 {
        return Err(CanopyError::UnsupportedVersion(version));
    }

    let id = reader.string()?;
    let total_files = reader.u64()?;
    let total_nodes = reader.u64()?;
    let total_size = reader.u64()?;
    let last_updated = reader.timestamp()?;

    let mut arena = Arena::new();
    let root = match reader.u8()? {
        0 => None,
        1 => Some(decode_node(&mut reader, &mut arena, 0)?),
        other => {
            return Err(CanopyError::Corrupt(format!(
                "invalid root marker {}",
                other
            )))
        }
    };

    if let Some(root) = root {
        let node = arena.node(root);
        if node.node_count() != total_nodes || node.leaf_count() != total_files {
            return Err(CanopyError::Corrupt(format!(
                "metadata disagrees with node array: {}/{} nodes, {}/{} files",
                node.node_count(),
                total_nodes,
                node.leaf_count(),
                total_files
            )));
        }
    } else if total_nodes != 0 || total_files != 0 {
        return Err(CanopyError::Corrupt(
            "nonzero totals with no root node".to_string(),
        ));
    }

    let index = if version == FORMAT_V2 {
        let count = reader.u64()?;
        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = reader.string()?;
            let rank = reader.u64()?;
            pairs.push((name, rank));
        }
        SortedIndex::rebuild(pairs)
    } else {
        // v1 files carry no index: reconstruct it from the leaves'
        // in-order ranks, sorted by name
        let mut pairs = Vec::with_capacity(total_files as usize);
        if let Some(root) = root {
            collect_ranks(&arena, root, &mut 0, &mut pairs);
        }
        SortedIndex::rebuild(pairs)
    };

    debug!(
        id = %id,
        version,
        total_files,
        total_nodes,
        "decoded manifest tree"
    );

    Ok(ManifestTree::from_parts(
        id,
        version,
        root,
        arena,
        index,
        total_files,
        total_nodes,
        total_size,
        last_updated,
    ))
}

fn decode_node(
    reader: &mut Reader<'_>,
    arena: &mut Arena,
    depth: u32,
) -> Result<NodeIx, CanopyError> {
    if depth > MAX_DECODE_DEPTH {
        return Err(CanopyError::Corrupt(format!(
            "node nesting exceeds depth limit {}",
            MAX_DECODE_DEPTH
        )));
    }
    match reader.u8()? {
        TAG_INTERNAL => {
            let hash = reader.hash()?;
            let node_count = reader.u64()?;
            let leaf_count = reader.u64()?;
            let size = reader.u64()?;
            let min_name = reader.string()?;
            let left = decode_node(reader, arena, depth + 1)?;
            let right = decode_node(reader, arena, depth + 1)?;
            let ix = arena.alloc(Node::Internal(InternalNode {
                left,
                right,
                hash,
                node_count,
                leaf_count,
                size,
                min_name,
            }));
            arena.set_parent(left, Some(ix));
            arena.set_parent(right, Some(ix));
            Ok(ix)
        }
        TAG_LEAF => {
            let content_hash = reader.hash()?;
            let size = reader.u64()?;
            let last_modified = reader.timestamp()?;
            let flags = reader.u8()?;
            let name = reader.string()?;
            let directory = match reader.u8()? {
                0 => None,
                1 => Some(reader.string()?),
                other => {
                    return Err(CanopyError::Corrupt(format!(
                        "invalid directory marker {}",
                        other
                    )))
                }
            };
            Ok(arena.alloc(Node::Leaf(LeafNode {
                name,
                directory,
                content_hash,
                size,
                last_modified,
                is_deleted: flags & FLAG_DELETED != 0,
            })))
        }
        other => Err(CanopyError::Corrupt(format!("invalid node tag {}", other))),
    }
}

fn collect_ranks(arena: &Arena, ix: NodeIx, next_rank: &mut u64, out: &mut Vec<(String, u64)>) {
    match arena.node(ix) {
        Node::Leaf(leaf) => {
            out.push((leaf.name.clone(), *next_rank));
            *next_rank += 1;
        }
        Node::Internal(n) => {
            collect_ranks(arena, n.left, next_rank, out);
            collect_ranks(arena, n.right, next_rank, out);
        }
    }
}

/// Persist a tree through the byte store in the original v1 format
pub async fn save_tree<S: ByteStore + ?Sized>(
    tree: &ManifestTree,
    store: &S,
    path: &str,
) -> Result<(), CanopyError> {
    let bytes = encode_tree(tree, FORMAT_V1)?;
    store.write(path, &bytes).await?;
    info!(path, bytes = bytes.len(), "saved manifest tree (v1)");
    Ok(())
}

/// Persist a tree in the v2 format, index included
pub async fn save_tree_v2<S: ByteStore + ?Sized>(
    tree: &ManifestTree,
    store: &S,
    path: &str,
) -> Result<(), CanopyError> {
    let bytes = encode_tree(tree, FORMAT_V2)?;
    store.write(path, &bytes).await?;
    info!(path, bytes = bytes.len(), "saved manifest tree (v2)");
    Ok(())
}

/// Load a tree from the byte store. A missing blob is `Ok(None)`, not an
/// error; corrupt bytes are.
pub async fn load_tree<S: ByteStore + ?Sized>(
    store: &S,
    path: &str,
) -> Result<Option<ManifestTree>, CanopyError> {
    match store.read(path).await? {
        Some(bytes) => Ok(Some(decode_tree(&bytes)?)),
        None => Ok(None),
    }
}

/// Fast-path version probe: inspects only the 4-byte header. `Ok(None)`
/// for a missing blob or one too short to carry a version.
pub async fn load_tree_version<S: ByteStore + ?Sized>(
    store: &S,
    path: &str,
) -> Result<Option<u32>, CanopyError> {
    match store.read(path).await? {
        Some(bytes) => Ok(peek_version(&bytes)),
        None => Ok(None),
    }
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn hash(&mut self, v: &Hash) {
        self.buf.extend_from_slice(v);
    }

    fn string(&mut self, v: &str) {
        self.u32(v.len() as u32);
        self.buf.extend_from_slice(v.as_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CanopyError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                CanopyError::Corrupt(format!(
                    "truncated at byte {} (wanted {} more)",
                    self.pos, len
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CanopyError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CanopyError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, CanopyError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64, CanopyError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn hash(&mut self) -> Result<Hash, CanopyError> {
        Ok(self.take(32)?.try_into().unwrap())
    }

    fn string(&mut self) -> Result<String, CanopyError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CanopyError::Corrupt("invalid utf-8 in string field".to_string()))
    }

    fn timestamp(&mut self) -> Result<DateTime<Utc>, CanopyError> {
        let millis = self.i64()?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| CanopyError::Corrupt(format!("invalid timestamp {}", millis)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::hasher::hash_bytes;
    use crate::tree::node::FileEntry;

    fn sample_tree(n: usize) -> ManifestTree {
        let mut tree = ManifestTree::new("sample");
        for i in 0..n {
            tree.add_file(FileEntry::new(
                format!("f{:03}", i),
                hash_bytes(format!("f{:03}", i).as_bytes()),
                64,
            ));
        }
        tree
    }

    #[test]
    fn test_peek_version() {
        assert_eq!(peek_version(&[]), None);
        assert_eq!(peek_version(&[2, 0]), None);
        assert_eq!(peek_version(&[2, 0, 0, 0]), Some(2));
        assert_eq!(peek_version(&[1, 0, 0, 0, 99]), Some(1));
    }

    #[test]
    fn test_round_trip_both_versions() {
        let tree = sample_tree(11);
        for version in [FORMAT_V1, FORMAT_V2] {
            let bytes = encode_tree(&tree, version).unwrap();
            assert_eq!(peek_version(&bytes), Some(version));
            let decoded = decode_tree(&bytes).unwrap();
            assert_eq!(decoded.id(), "sample");
            assert_eq!(decoded.version(), version);
            assert_eq!(decoded.total_files(), tree.total_files());
            assert_eq!(decoded.total_nodes(), tree.total_nodes());
            assert_eq!(decoded.total_size(), tree.total_size());
            assert_eq!(decoded.root_hash(), tree.root_hash());
            assert_eq!(
                decoded.last_updated().timestamp_millis(),
                tree.last_updated().timestamp_millis()
            );
        }
    }

    #[test]
    fn test_v1_rebuilds_equivalent_index() {
        let tree = sample_tree(9);
        let bytes = encode_tree(&tree, FORMAT_V1).unwrap();
        let decoded = decode_tree(&bytes).unwrap();
        for i in 0..9 {
            let name = format!("f{:03}", i);
            let original = tree.find_file_node(&name).unwrap();
            let rebuilt = decoded.find_file_node(&name).unwrap();
            assert_eq!(original.content_hash, rebuilt.content_hash);
            assert_eq!(original.size, rebuilt.size);
        }
        assert!(decoded.find_file_node("f999").is_none());
    }

    #[test]
    fn test_tombstone_survives_round_trip() {
        let mut tree = sample_tree(4);
        tree.mark_file_as_deleted("f001");
        let bytes = encode_tree(&tree, FORMAT_V2).unwrap();
        let decoded = decode_tree(&bytes).unwrap();
        assert!(decoded.find_file_node("f001").is_none());
        let ghost = decoded.find_file_node_with_deletion_status("f001").unwrap();
        assert!(ghost.is_deleted);
        assert_eq!(decoded.get_active_files().len(), 3);
        assert_eq!(decoded.root_hash(), tree.root_hash());
    }

    #[test]
    fn test_empty_tree_round_trip() {
        let tree = ManifestTree::new("empty");
        let bytes = encode_tree(&tree, FORMAT_V2).unwrap();
        let decoded = decode_tree(&bytes).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.root_hash(), None);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        assert!(matches!(
            encode_tree(&sample_tree(1), 7),
            Err(CanopyError::UnsupportedVersion(7))
        ));
        let mut bytes = encode_tree(&sample_tree(1), FORMAT_V1).unwrap();
        bytes[0] = 9;
        assert!(matches!(
            decode_tree(&bytes),
            Err(CanopyError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let bytes = encode_tree(&sample_tree(5), FORMAT_V2).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            decode_tree(truncated),
            Err(CanopyError::Corrupt(_))
        ));
    }

    #[test]
    fn test_runaway_nesting_is_corrupt_not_a_crash() {
        // A blob of nothing but internal-node records describes a tree
        // nested deeper than any construction path produces; the decoder
        // must refuse it instead of recursing once per record.
        let mut out = Writer::new();
        out.u32(FORMAT_V1);
        out.string("hostile");
        out.u64(1); // total_files
        out.u64(1); // total_nodes
        out.u64(0); // total_size
        out.i64(0); // last_updated
        out.u8(1); // root marker
        for _ in 0..200_000 {
            out.u8(TAG_INTERNAL);
            out.hash(&[0u8; 32]);
            out.u64(1); // node_count
            out.u64(1); // leaf_count
            out.u64(0); // size
            out.string("");
        }
        assert!(matches!(
            decode_tree(&out.into_bytes()),
            Err(CanopyError::Corrupt(_))
        ));
    }

    #[test]
    fn test_depth_limit_admits_large_real_trees() {
        let tree = sample_tree(4096);
        let bytes = encode_tree(&tree, FORMAT_V2).unwrap();
        let decoded = decode_tree(&bytes).unwrap();
        assert_eq!(decoded.root_hash(), tree.root_hash());
    }

    #[test]
    fn test_metadata_mismatch_is_corrupt() {
        let mut bytes = encode_tree(&sample_tree(3), FORMAT_V1).unwrap();
        // total_files sits right after the version and the id string
        let off = 4 + 4 + "sample".len();
        bytes[off] = 99;
        assert!(matches!(decode_tree(&bytes), Err(CanopyError::Corrupt(_))));
    }

    #[test]
    fn test_loaded_tree_accepts_further_inserts() {
        let tree = sample_tree(6);
        let decoded = decode_tree(&encode_tree(&tree, FORMAT_V2).unwrap()).unwrap();
        let mut decoded = decoded;
        decoded.add_file(FileEntry::new("extra", hash_bytes(b"extra"), 8));
        assert_eq!(decoded.total_files(), 7);
        assert_eq!(decoded.total_nodes(), 13);
        assert!(decoded.find_file_node("extra").is_some());
    }
}
