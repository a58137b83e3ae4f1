//! Stable hashing for shard assignment
//!
//! FNV-1a is fixed by definition, so the same key hashes to the same shard
//! on every node, process and toolchain version. `std`'s `DefaultHasher`
//! gives no such guarantee.

use crate::types::EntityKey;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a
pub fn fnv1a(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// MurmurHash3 64-bit finalizer.
///
/// FNV-1a alone barely mixes its last input bytes, so scores over inputs
/// that differ only in a suffix cluster together.
pub fn mix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Bucket of entities assigned to a node as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub u32);

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

/// `stableHash(key) mod shard_count`
///
/// `shard_count` must be non-zero; configuration rejects zero.
pub fn shard_for(key: &EntityKey, shard_count: u32) -> ShardId {
    let hash = fnv1a(&key.canonical_bytes());
    ShardId((hash % u64::from(shard_count)) as u32)
}
