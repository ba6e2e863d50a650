//! Maglev consistent-hashing lookup table.
//!
//! This crate implements the lookup-table construction from Google's
//! Maglev load balancer: a fixed, prime number of abstract partitions is
//! spread near-evenly across a small set of named backend nodes, and every
//! `u64` key resolves to its owning node in O(1). When the node set
//! changes, only a small fraction of partitions change owner, so most keys
//! keep routing to the backend they were already on.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                       Maglev                          │
//! │                                                       │
//! │  registry (sorted)         lookup table (dense)       │
//! │  ┌──────────────────┐      ┌───┬───┬───┬───┬───┐      │
//! │  │ "a" → perm [..]  │ ───▶ │ b │ a │ c │ a │ … │      │
//! │  │ "b" → perm [..]  │      └───┴───┴───┴───┴───┘      │
//! │  │ "c" → perm [..]  │        ▲                        │
//! │  └──────────────────┘        │ key % partitions       │
//! └──────────────────────────────┼────────────────────────┘
//!                                key
//! ```
//!
//! Each node's permutation is a full-cycle ordering of all partitions,
//! derived from two independent hashes of its name; the table is filled by
//! letting the sorted membership claim partitions round-robin along those
//! permutations. Every membership change rebuilds the table from scratch.
//!
//! # Example
//!
//! ```
//! use maglev_table::Maglev;
//!
//! let mut table = Maglev::with_default_hashers(["alpha", "beta", "gamma"], 65537)?;
//!
//! let owner = table.lookup(0x517c_c1b7);
//! assert!(table.contains(owner));
//!
//! // Scale the pool out; only a small fraction of partitions move.
//! table.add(["delta"])?;
//! assert_eq!(table.len(), 4);
//! # Ok::<(), maglev_table::Error>(())
//! ```
//!
//! # Concurrency
//!
//! The table performs no internal synchronization and no I/O. Queries take
//! `&self` and mutations `&mut self`, so within a single thread the borrow
//! checker already enforces the reader-writer discipline; to share a table
//! across threads, wrap it in a reader-writer lock or route mutations
//! through one owning task that publishes immutable snapshots.

pub mod error;
pub mod hasher;
pub mod permutation;
pub mod table;

pub use error::{Error, Result};
pub use hasher::{NodeHasher, Xx64, DEFAULT_H1_SEED, DEFAULT_H2_SEED};
pub use table::Maglev;
