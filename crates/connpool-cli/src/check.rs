//! `connpool check`

use anyhow::Context;
use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use connpool_core::{QueryResult, Value};
use connpool_pool::{PoolRegistry, PoolStats};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Query run on one pooled connection
    #[arg(short, long, default_value = "SELECT 1 AS ok")]
    pub query: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CheckReport {
    driver: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    stats: PoolStats,
}

pub fn run(registry: &PoolRegistry, args: &CheckArgs) -> anyhow::Result<()> {
    registry
        .init_connection_pool()
        .context("failed to initialize connection pool")?;

    let probed = probe(registry, &args.query);
    let destroyed = registry.destroy_connection_pool();

    let report = probed?;
    destroyed.context("connection pool did not shut down cleanly")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn probe(registry: &PoolRegistry, query: &str) -> anyhow::Result<CheckReport> {
    let pool = registry.pool()?;
    let mut conn = pool.acquire().context("failed to acquire a connection")?;
    tracing::info!(slot = conn.id(), query, "running probe query");

    let result: QueryResult = conn
        .query(query, &[])
        .with_context(|| format!("probe query failed: {}", query))?;
    conn.release().context("failed to return the connection")?;

    Ok(CheckReport {
        driver: pool.driver_name().to_string(),
        columns: result.columns,
        rows: result.rows.into_iter().map(|row| row.values).collect(),
        stats: pool.stats(),
    })
}

fn print_report(report: &CheckReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(&report.columns);
    for row in &report.rows {
        table.add_row(row.iter().map(|value| value.to_string()));
    }
    println!("{table}");

    let stats = &report.stats;
    println!(
        "driver {}: {} connection(s), {} acquired, {} released",
        report.driver,
        stats.capacity(),
        stats.acquired_total(),
        stats.released_total()
    );
}
