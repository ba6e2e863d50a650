//! Route request keys across a pool of backends.

use maglev_table::Maglev;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("maglev_table=debug,info")
        .init();

    let backends = ["10.0.0.1:8080", "10.0.0.2:8080", "10.0.0.3:8080"];
    let mut pool = Maglev::with_default_hashers(backends, 65537)?;

    println!("Pool of {} backends over {} partitions", pool.len(), pool.partitions());

    println!("\n--- Routing ---");
    for key in [0xdead_beefu64, 0xcafe_f00d, 42, 9_999_999_999] {
        println!("  key {key:#x} -> partition {} -> {}", pool.partition_id(key), pool.lookup(key));
    }

    println!("\n--- Distribution ---");
    let mut counts: Vec<_> = pool.distribution().into_iter().collect();
    counts.sort();
    for (backend, partitions) in counts {
        println!("  {backend}: {partitions} partitions");
    }

    // Drain one backend and see how few keys move.
    println!("\n--- Removing 10.0.0.2:8080 ---");
    let before: Vec<String> = (0..pool.partitions())
        .map(|p| pool.lookup(p).to_string())
        .collect();

    pool.remove(["10.0.0.2:8080"])?;

    let moved = (0..pool.partitions())
        .filter(|&p| before[p as usize] != pool.lookup(p))
        .count();
    println!(
        "  {moved} of {} partitions changed owner ({:.1}%)",
        pool.partitions(),
        100.0 * moved as f64 / pool.partitions() as f64
    );

    Ok(())
}
