//! `connpool stress`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Args;
use connpool_pool::{ConnectionPool, PoolRegistry, PoolStats};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct StressArgs {
    /// Worker threads competing for connections
    #[arg(short, long, default_value_t = 50)]
    pub threads: usize,

    /// Acquisitions per thread
    #[arg(short, long, default_value_t = 100)]
    pub rounds: usize,

    /// How long each worker keeps a connection, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub hold_ms: u64,

    /// Query run on every acquired connection
    #[arg(short, long, default_value = "SELECT 1")]
    pub query: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StressReport {
    threads: usize,
    rounds: usize,
    elapsed_ms: u128,
    acquisitions: u64,
    failures: u64,
    /// Times a connection was observed with two owners at once
    ownership_conflicts: u64,
    stats: PoolStats,
}

#[derive(Default)]
struct Counters {
    acquisitions: AtomicU64,
    failures: AtomicU64,
    conflicts: AtomicU64,
}

pub fn run(registry: &PoolRegistry, args: &StressArgs) -> anyhow::Result<()> {
    if args.threads == 0 || args.rounds == 0 {
        bail!("--threads and --rounds must be greater than 0");
    }

    registry
        .init_connection_pool()
        .context("failed to initialize connection pool")?;
    let pool = registry.pool()?;
    tracing::info!(
        threads = args.threads,
        rounds = args.rounds,
        capacity = pool.capacity(),
        "starting stress run"
    );

    let started = Instant::now();
    let counters = hammer(&pool, args);
    let elapsed = started.elapsed();
    let stats = pool.stats();

    registry
        .destroy_connection_pool()
        .context("connection pool did not shut down cleanly")?;

    let report = StressReport {
        threads: args.threads,
        rounds: args.rounds,
        elapsed_ms: elapsed.as_millis(),
        acquisitions: counters.acquisitions.load(Ordering::Relaxed),
        failures: counters.failures.load(Ordering::Relaxed),
        ownership_conflicts: counters.conflicts.load(Ordering::Relaxed),
        stats,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} thread(s) x {} round(s) in {} ms: {} acquired, {} failed, {} ownership conflict(s)",
            report.threads,
            report.rounds,
            report.elapsed_ms,
            report.acquisitions,
            report.failures,
            report.ownership_conflicts
        );
    }

    if report.ownership_conflicts > 0 {
        bail!(
            "{} connection(s) were handed to two threads at once",
            report.ownership_conflicts
        );
    }
    if report.failures > 0 {
        bail!("{} acquisition(s) or queries failed", report.failures);
    }
    Ok(())
}

/// Run every worker to completion
fn hammer(pool: &ConnectionPool, args: &StressArgs) -> Arc<Counters> {
    let counters = Arc::new(Counters::default());
    let owners: Arc<Mutex<HashMap<usize, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let hold = Duration::from_millis(args.hold_ms);

    let workers: Vec<_> = (0..args.threads)
        .map(|worker| {
            let pool = pool.clone();
            let counters = Arc::clone(&counters);
            let owners = Arc::clone(&owners);
            let query = args.query.clone();
            let rounds = args.rounds;

            thread::Builder::new()
                .name(format!("stress-{worker}"))
                .spawn(move || {
                    for _ in 0..rounds {
                        let mut conn = match pool.acquire_default() {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::warn!(worker, error = %e, "acquire failed");
                                counters.failures.fetch_add(1, Ordering::Relaxed);
                                continue;
                            }
                        };
                        counters.acquisitions.fetch_add(1, Ordering::Relaxed);

                        let slot = conn.id();
                        if let Some(other) = owners.lock().insert(slot, worker) {
                            tracing::error!(slot, worker, other, "connection owned by two threads");
                            counters.conflicts.fetch_add(1, Ordering::Relaxed);
                        }

                        if let Err(e) = conn.query(&query, &[]) {
                            tracing::warn!(worker, slot, error = %e, "query failed");
                            counters.failures.fetch_add(1, Ordering::Relaxed);
                        }
                        if !hold.is_zero() {
                            thread::sleep(hold);
                        }

                        owners.lock().remove(&slot);
                        if let Err(e) = conn.release() {
                            tracing::warn!(worker, slot, error = %e, "release failed");
                            counters.failures.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
        })
        .collect();

    for worker in workers {
        match worker {
            Ok(handle) => {
                if handle.join().is_err() {
                    tracing::error!("stress worker panicked");
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn stress worker");
                counters.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    counters
}
