//! Content hashing via xxh3.

use xxhash_rust::xxh3::xxh3_64;

#[inline]
pub fn hash_content(content: &[u8]) -> u64 {
    xxh3_64(content)
}

/// Hex form stored in snapshots and `FileAnalysis::content_hash`.
pub fn content_hash_hex(content: &[u8]) -> String {
    format!("{:016x}", hash_content(content))
}
