//! The Maglev lookup table: node registry, table builder, and queries.
//!
//! [`Maglev`] owns the sorted node registry with each node's cached
//! permutation, the dense partition-to-node lookup table, and the query
//! interface. Any membership change recomputes permutations only for the
//! nodes it touched and then rebuilds the whole table from scratch;
//! queries read the most recently built table in O(1).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::hasher::{NodeHasher, Xx64, DEFAULT_H1_SEED, DEFAULT_H2_SEED};
use crate::permutation;

/// A registered node with its cached permutation.
///
/// The permutation is computed once, when the node is inserted, and
/// discarded with the node. Membership changes to other nodes never touch
/// it.
#[derive(Debug, Clone)]
struct NodeEntry {
    name: Arc<str>,
    permutation: Vec<u64>,
}

/// Maglev consistent-hashing lookup table.
///
/// Maps `u64` keys to named backend nodes through a fixed, prime number of
/// partitions. Lookups are O(1); membership changes rebuild the table in
/// O(partitions) and move only a small fraction of partitions between
/// nodes.
///
/// Node names in the table are held as `Arc<str>` so that a stale table
/// left behind by an underflowing [`remove`](Maglev::remove) keeps its
/// owners alive even after their registry entries are gone.
#[derive(Debug, Clone)]
pub struct Maglev<H1 = Xx64, H2 = Xx64> {
    /// Node registry, sorted by name.
    entries: Vec<NodeEntry>,

    /// Partition index -> owning node. Empty until the first build.
    lookup: Vec<Arc<str>>,

    /// Number of partitions; prime, fixed for the lifetime of the table.
    num_partitions: u64,

    h1: H1,
    h2: H2,
}

impl Maglev {
    /// Create a table using the built-in seeded xxHash64 hasher pair.
    pub fn with_default_hashers<I, S>(nodes: I, num_partitions: u64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            nodes,
            num_partitions,
            Xx64::with_seed(DEFAULT_H1_SEED),
            Xx64::with_seed(DEFAULT_H2_SEED),
        )
    }
}

impl<H1, H2> Maglev<H1, H2>
where
    H1: NodeHasher,
    H2: NodeHasher,
{
    /// Create a table over `num_partitions` partitions with the given
    /// initial nodes and hasher pair.
    ///
    /// `num_partitions` must be prime, and the initial node list must fit
    /// within it; otherwise no instance is returned. Duplicate names in
    /// the initial list are collapsed. An empty node list is accepted —
    /// the table stays unbuilt until [`add`](Maglev::add) supplies
    /// members.
    pub fn new<I, S>(nodes: I, num_partitions: u64, h1: H1, h2: H2) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !permutation::is_prime(num_partitions) {
            return Err(Error::PartitionsNotPrime(num_partitions));
        }

        let mut names: Vec<Arc<str>> = nodes.into_iter().map(|n| Arc::from(n.as_ref())).collect();
        names.sort();
        names.dedup();

        if names.len() as u64 > num_partitions {
            return Err(Error::CapacityExceeded {
                nodes: names.len(),
                partitions: num_partitions,
                added: 0,
            });
        }

        let mut table = Self {
            entries: Vec::with_capacity(names.len()),
            lookup: Vec::new(),
            num_partitions,
            h1,
            h2,
        };

        for name in names {
            let perm = permutation::generate(&name, &table.h1, &table.h2, num_partitions);
            table.entries.push(NodeEntry {
                name,
                permutation: perm,
            });
        }

        if !table.entries.is_empty() {
            table.rebuild();
        }

        Ok(table)
    }

    /// Add nodes to the membership and rebuild the table.
    ///
    /// Returns the number of nodes actually inserted; names already
    /// present are skipped. The rebuild happens unconditionally, even when
    /// nothing was inserted.
    ///
    /// This operation is deliberately non-transactional: if the batch
    /// pushes the node count past the partition count,
    /// [`Error::CapacityExceeded`] is returned *after* the insertions and
    /// the rebuild have been applied. The caller compensates by removing
    /// nodes.
    ///
    /// # Panics
    ///
    /// Panics if called on an instance with no members and an empty (or
    /// entirely duplicate) batch, since a table cannot be built over zero
    /// nodes.
    pub fn add<I, S>(&mut self, nodes: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for node in nodes {
            let node = node.as_ref();
            if let Err(pos) = self.position(node) {
                let name: Arc<str> = Arc::from(node);
                let perm = permutation::generate(&name, &self.h1, &self.h2, self.num_partitions);
                self.entries.insert(
                    pos,
                    NodeEntry {
                        name,
                        permutation: perm,
                    },
                );
                added += 1;
                debug!(node, "added node");
            }
        }

        self.rebuild();

        if self.entries.len() as u64 > self.num_partitions {
            return Err(Error::CapacityExceeded {
                nodes: self.entries.len(),
                partitions: self.num_partitions,
                added,
            });
        }
        Ok(added)
    }

    /// Remove nodes from the membership.
    ///
    /// Returns the number of nodes actually removed; names not present are
    /// skipped. If at least one node remains the table is rebuilt;
    /// otherwise [`Error::EmptyMembership`] is returned and the previous
    /// table — still naming the removed nodes — is left in place, so
    /// in-flight lookups keep resolving until the caller adds a node back.
    ///
    /// The asymmetry with [`add`](Maglev::add) (add rebuilds then reports
    /// overflow, remove refuses to rebuild on underflow) is part of the
    /// contract; callers depend on the exact recovery sequence.
    pub fn remove<I, S>(&mut self, nodes: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for node in nodes {
            let node = node.as_ref();
            if let Ok(pos) = self.position(node) {
                self.entries.remove(pos);
                removed += 1;
                debug!(node, "removed node");
            }
        }

        if self.entries.is_empty() {
            return Err(Error::EmptyMembership { removed });
        }

        self.rebuild();
        Ok(removed)
    }

    /// Look up the node a key belongs to.
    ///
    /// # Panics
    ///
    /// Panics if no table has ever been built, i.e. the instance was
    /// constructed with zero nodes and none were added since.
    pub fn lookup(&self, key: u64) -> &str {
        assert!(
            !self.lookup.is_empty(),
            "lookup on a table that has never had members"
        );
        &self.lookup[self.partition_id(key) as usize]
    }

    /// The partition a key belongs to, in `[0, partitions)`.
    pub fn partition_id(&self, key: u64) -> u64 {
        key % self.num_partitions
    }

    /// Whether the node is a current member. O(log n).
    pub fn contains(&self, node: &str) -> bool {
        self.position(node).is_ok()
    }

    /// Number of current members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the membership is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fixed partition count.
    pub fn partitions(&self) -> u64 {
        self.num_partitions
    }

    /// Current members, in sorted order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_ref())
    }

    /// Partitions currently owned per node, from the live table.
    ///
    /// After an underflowing [`remove`](Maglev::remove) the counts still
    /// describe the stale table and may name nodes that are no longer
    /// members.
    pub fn distribution(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for owner in &self.lookup {
            *counts.entry(owner.as_ref()).or_insert(0) += 1;
        }
        counts
    }

    /// Binary search for a node in the sorted registry. `Ok` holds its
    /// index, `Err` the insertion point.
    fn position(&self, node: &str) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.name.as_ref().cmp(node))
    }

    /// Rebuild the lookup table from scratch.
    ///
    /// Round-robin preference fill: iterate the sorted membership, each
    /// node claiming the first unclaimed partition in its permutation,
    /// until every partition is owned. Because each permutation is
    /// independent of the other members, a membership change only moves
    /// the partitions the affected nodes competed for.
    fn rebuild(&mut self) {
        assert!(
            !self.entries.is_empty(),
            "cannot rebuild the lookup table without nodes"
        );

        let m = self.num_partitions as usize;
        let mut slots: Vec<Option<Arc<str>>> = vec![None; m];
        let mut cursors = vec![0usize; self.entries.len()];
        let mut filled = 0usize;

        'fill: loop {
            for (entry, cursor) in self.entries.iter().zip(cursors.iter_mut()) {
                let slot = loop {
                    // With at most `m` members every cursor finds an empty
                    // slot before its permutation runs out; overrunning it
                    // means that invariant broke somewhere else.
                    let candidate = match entry.permutation.get(*cursor) {
                        Some(&p) => p as usize,
                        None => panic!("permutation cursor overran for node {:?}", entry.name),
                    };
                    if slots[candidate].is_none() {
                        break candidate;
                    }
                    *cursor += 1;
                };

                slots[slot] = Some(entry.name.clone());
                *cursor += 1;
                filled += 1;
                if filled == m {
                    break 'fill;
                }
            }
        }

        self.lookup = slots.into_iter().flatten().collect();
        debug_assert_eq!(self.lookup.len(), m);
        debug!(
            partitions = m,
            nodes = self.entries.len(),
            "rebuilt lookup table"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn table(nodes: &[&str], m: u64) -> Maglev {
        Maglev::with_default_hashers(nodes.iter().copied(), m).unwrap()
    }

    fn owners(t: &Maglev<impl NodeHasher, impl NodeHasher>) -> Vec<String> {
        (0..t.partitions()).map(|p| t.lookup(p).to_string()).collect()
    }

    #[test]
    fn test_hand_computed_small_table() {
        // With these pinned hashes and m = 7:
        //   offset = h1 % 7:      a = 3, b = 0, c = 5
        //   skip   = h2 % 6 + 1:  a = 5, b = 3, c = 2
        // giving permutations
        //   a: [3, 1, 6, 4, 2, 0, 5]
        //   b: [0, 3, 6, 2, 5, 1, 4]
        //   c: [5, 0, 2, 4, 6, 1, 3]
        // and the round-robin fill claims, in order:
        //   a->3, b->0, c->5, a->1, b->6, c->2, a->4.
        let h1 = |node: &str| match node {
            "a" => 3u64,
            "b" => 0,
            "c" => 5,
            other => panic!("unexpected node {other}"),
        };
        let h2 = |node: &str| match node {
            "a" => 4u64,
            "b" => 2,
            "c" => 1,
            other => panic!("unexpected node {other}"),
        };

        let t = Maglev::new(["a", "b", "c"], 7, h1, h2).unwrap();

        let expected = ["b", "a", "c", "a", "a", "c", "b"];
        for (partition, want) in expected.iter().enumerate() {
            assert_eq!(t.lookup(partition as u64), *want, "partition {partition}");
        }
    }

    #[test]
    fn test_every_partition_has_exactly_one_owner() {
        let t = table(&["a", "b", "c", "d", "e"], 1009);

        let dist = t.distribution();
        assert_eq!(dist.len(), 5);
        assert_eq!(dist.values().sum::<usize>(), 1009);
        for (node, _) in dist {
            assert!(t.contains(node));
        }
    }

    #[test]
    fn test_distribution_is_near_even() {
        let t = table(&["a", "b", "c", "d", "e"], 1009);

        let dist = t.distribution();
        let min = dist.values().min().copied().unwrap();
        let max = dist.values().max().copied().unwrap();
        // Partitions are claimed round-robin, one per node per pass, so
        // the counts can differ by at most one.
        assert!(max - min <= 1, "min {min}, max {max}");
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = table(&["a", "b", "c"], 1009);
        let b = table(&["c", "a", "b"], 1009);
        assert_eq!(owners(&a), owners(&b));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut t = table(&["a", "b"], 13);

        assert_eq!(t.add(["x"]).unwrap(), 1);
        let before = owners(&t);

        assert_eq!(t.add(["x"]).unwrap(), 0);
        assert_eq!(owners(&t), before);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_non_prime_partition_count_rejected() {
        let err = Maglev::with_default_hashers(["a"], 8).unwrap_err();
        assert_eq!(err, Error::PartitionsNotPrime(8));
    }

    #[test]
    fn test_constructor_rejects_oversized_membership() {
        let err = Maglev::with_default_hashers(["a", "b", "c", "d"], 3).unwrap_err();
        assert_eq!(
            err,
            Error::CapacityExceeded {
                nodes: 4,
                partitions: 3,
                added: 0
            }
        );
    }

    #[test]
    fn test_add_past_capacity_mutates_then_errors() {
        let mut t = table(&["a", "b"], 2);

        let err = t.add(["c"]).unwrap_err();
        assert_eq!(
            err,
            Error::CapacityExceeded {
                nodes: 3,
                partitions: 2,
                added: 1
            }
        );

        // The mutation and rebuild were applied before the error.
        assert_eq!(t.len(), 3);
        assert!(t.contains("c"));
        for p in 0..2 {
            assert!(t.contains(t.lookup(p)));
        }

        // Removing a node restores the invariant.
        assert_eq!(t.remove(["c"]).unwrap(), 1);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_remove_last_node_keeps_stale_table() {
        let mut t = table(&["only"], 13);
        let before = owners(&t);

        let err = t.remove(["only"]).unwrap_err();
        assert_eq!(err, Error::EmptyMembership { removed: 1 });

        // Membership is gone but lookups still resolve from the old table.
        assert_eq!(t.len(), 0);
        assert!(!t.contains("only"));
        assert_eq!(owners(&t), before);

        // Adding a member back rebuilds over the new membership.
        assert_eq!(t.add(["fresh"]).unwrap(), 1);
        assert_eq!(t.lookup(0), "fresh");
    }

    #[test]
    fn test_remove_missing_node_counts_zero() {
        let mut t = table(&["a", "b"], 13);
        let before = owners(&t);

        assert_eq!(t.remove(["ghost"]).unwrap(), 0);
        assert_eq!(owners(&t), before);
    }

    #[test]
    fn test_empty_construction_then_add() {
        let mut t = Maglev::with_default_hashers(std::iter::empty::<&str>(), 7).unwrap();
        assert!(t.is_empty());

        assert_eq!(t.add(["a", "b"]).unwrap(), 2);
        assert_eq!(t.len(), 2);
        for p in 0..7 {
            assert!(t.contains(t.lookup(p)));
        }
    }

    #[test]
    #[should_panic(expected = "never had members")]
    fn test_lookup_without_members_panics() {
        let t = Maglev::with_default_hashers(std::iter::empty::<&str>(), 7).unwrap();
        t.lookup(1);
    }

    #[test]
    fn test_nodes_are_sorted_and_deduplicated() {
        let t = table(&["b", "a", "b", "c"], 13);
        let names: Vec<&str> = t.nodes().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_partition_id_is_modulo() {
        let t = table(&["a"], 13);
        assert_eq!(t.partition_id(0), 0);
        assert_eq!(t.partition_id(13), 0);
        assert_eq!(t.partition_id(27), 1);
        assert!(t.partition_id(u64::MAX) < 13);
    }

    #[test]
    fn test_removal_disrupts_roughly_one_nth_of_partitions() {
        let m = 1009u64;
        let n = 10usize;
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for trial in 0..5 {
            let mut names: Vec<String> =
                (0..n).map(|_| format!("node-{:08x}", rng.gen::<u32>())).collect();
            names.sort();
            names.dedup();

            let mut t = Maglev::with_default_hashers(names.iter(), m).unwrap();
            let before = owners(&t);

            let victim = names[rng.gen_range(0..names.len())].clone();
            t.remove([victim.as_str()]).unwrap();
            let after = owners(&t);

            let moved = before
                .iter()
                .zip(after.iter())
                .filter(|(b, a)| b != a)
                .count();

            // Every partition the victim owned must move, and little else:
            // the moved fraction should stay near 1/n.
            let victim_share = before.iter().filter(|o| **o == victim).count();
            assert!(moved >= victim_share);
            let moved_fraction = moved as f64 / m as f64;
            let ideal = 1.0 / names.len() as f64;
            assert!(
                moved_fraction <= 3.0 * ideal,
                "trial {trial}: moved {moved}/{m} ({moved_fraction:.3}), ideal {ideal:.3}"
            );
        }
    }
}
