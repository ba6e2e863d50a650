//! Error types for the lookup table.

use thiserror::Error;

/// Result type alias for lookup table operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by table construction and membership changes.
///
/// Every variant here is a recoverable condition the caller is expected to
/// handle. Broken preconditions (rebuilding a table with zero nodes, a
/// permutation cursor running past its end) are programmer errors and panic
/// instead of surfacing as an `Error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The partition count is not prime.
    ///
    /// Primality is what guarantees each node's preference sequence visits
    /// every partition exactly once; a composite count would silently leave
    /// partitions unreachable for some nodes. Raised only at construction.
    #[error("number of partitions must be prime, got {0}")]
    PartitionsNotPrime(u64),

    /// The node count exceeds the partition count.
    ///
    /// When returned from `add`, the membership change and table rebuild
    /// have *already* been applied; `added` reports how many nodes the
    /// batch inserted. The caller must compensate (e.g. by removing nodes)
    /// to restore the size invariant.
    #[error("{nodes} nodes exceed {partitions} partitions ({added} added by this change)")]
    CapacityExceeded {
        nodes: usize,
        partitions: u64,
        added: usize,
    },

    /// A removal left the membership empty.
    ///
    /// The node set and permutation cache have been mutated, but the lookup
    /// table was *not* rebuilt: the previous table, still naming the
    /// removed nodes, stays in place until the caller adds a node back.
    #[error("removing {removed} node(s) left the membership empty")]
    EmptyMembership { removed: usize },
}
