//! Per-node permutation generation.
//!
//! Each node gets its own deterministic ordering of all partition indices,
//! used as a priority list when claiming partitions. The ordering is the
//! arithmetic sequence `(offset + i * skip) mod m` where `offset` and
//! `skip` are derived from two independent hashes of the node name. With
//! `m` prime and `skip` in `[1, m - 1]`, `gcd(skip, m) = 1`, so the
//! sequence is a full cycle: every partition appears exactly once.

use crate::hasher::NodeHasher;

/// Generate the preference sequence for `node`.
///
/// Returns `num_partitions` partition indices, each in
/// `[0, num_partitions)`, every index appearing exactly once.
pub fn generate<H1, H2>(node: &str, h1: &H1, h2: &H2, num_partitions: u64) -> Vec<u64>
where
    H1: NodeHasher,
    H2: NodeHasher,
{
    debug_assert!(is_prime(num_partitions));

    let m = u128::from(num_partitions);
    let offset = u128::from(h1.hash_node(node) % num_partitions);
    let skip = u128::from(h2.hash_node(node) % (num_partitions - 1) + 1);

    // The multiply is done in u128 so partition counts near u64::MAX
    // cannot overflow the index arithmetic.
    (0..num_partitions)
        .map(|i| ((offset + u128::from(i) * skip) % m) as u64)
        .collect()
}

/// Deterministic Miller-Rabin primality test for `u64`.
///
/// The witness set {2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37} is known
/// to be exact for all 64-bit integers, so there are no false positives.
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for p in WITNESSES {
        if n == p {
            return true;
        }
        if n % p == 0 {
            return false;
        }
    }

    // n - 1 = d * 2^r with d odd.
    let mut d = n - 1;
    let mut r = 0;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }

    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 0..r - 1 {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(m)) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1;
    base %= m;
    while exp > 0 {
        if exp % 2 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp /= 2;
    }
    result
}
