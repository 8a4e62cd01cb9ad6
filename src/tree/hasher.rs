//! Hash computation for manifest nodes
//!
//! Internal nodes hash the concatenation of their children's hashes and
//! nothing else; leaf content hashing is a caller concern, with helpers
//! here for the scan path.

use crate::types::Hash;
use std::io::Read;
use std::path::Path;

/// Domain tag prefixed to a tombstoned leaf's content hash
const TOMBSTONE_TAG: u8 = 0xFF;

/// Combine two child hashes into the parent hash: H(left ‖ right)
pub fn combine_hashes(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

/// Digest a tombstoned leaf contributes in place of its content hash.
///
/// Domain-separated with a tag byte so it can never equal a live leaf's
/// combine input.
pub fn tombstone_hash(content_hash: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[TOMBSTONE_TAG]);
    hasher.update(content_hash);
    *hasher.finalize().as_bytes()
}

/// Hash a byte slice into a content hash
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    *blake3::hash(bytes).as_bytes()
}

/// Hash a file's contents, streaming to avoid loading it whole
pub fn hash_file(path: &Path) -> std::io::Result<Hash> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(*hasher.finalize().as_bytes())
}
