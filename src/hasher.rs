//! Node hashing capability.
//!
//! The table derives each node's preference sequence from two independent
//! hashes of its name. The hash functions are consumed through the
//! [`NodeHasher`] trait so callers can plug in whatever they already use;
//! the provided [`Xx64`] implementation covers the common case with seeded
//! xxHash64. The two instances handed to the table must not be correlated,
//! or permutations collide and balance degrades.

use std::hash::Hasher as _;

use twox_hash::XxHash64;

/// Default seed for the offset hasher (`h1`).
pub const DEFAULT_H1_SEED: u64 = 0xb7e1_5162_8aed_2a6a;

/// Default seed for the skip hasher (`h2`).
pub const DEFAULT_H2_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// A deterministic hash from a node name to a `u64`.
///
/// Implementations must return the same value for the same input across
/// calls and across processes that share a table layout.
pub trait NodeHasher {
    /// Hash a node name.
    fn hash_node(&self, node: &str) -> u64;
}

/// Any plain function works as a hasher; tests use this to pin exact
/// hash outputs.
impl<F> NodeHasher for F
where
    F: Fn(&str) -> u64,
{
    fn hash_node(&self, node: &str) -> u64 {
        self(node)
    }
}

/// Seeded xxHash64 node hasher.
///
/// Two instances with different seeds are independent enough for the
/// offset/skip pair.
#[derive(Debug, Clone, Copy)]
pub struct Xx64 {
    seed: u64,
}

impl Xx64 {
    /// Create a hasher with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl NodeHasher for Xx64 {
    fn hash_node(&self, node: &str) -> u64 {
        let mut hasher = XxHash64::with_seed(self.seed);
        hasher.write(node.as_bytes());
        hasher.finish()
    }
}
