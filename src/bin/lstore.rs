//! LStore Binary
//!
//! Runs demonstration scenarios and synthetic workloads against an
//! in-memory table.

use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use lstore::{Config, Database, MergeMode, Query, Result, LATEST_VERSION};
use tracing_subscriber::{fmt, EnvFilter};

/// LStore
#[derive(Parser, Debug)]
#[command(name = "lstore")]
#[command(about = "Column-oriented, log-structured record store")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the versioning and aggregation walkthrough
    Demo,

    /// Insert, update, read and sum a synthetic table
    Workload {
        /// Number of records to insert
        #[arg(short, long, default_value = "10000")]
        records: i64,

        /// Number of update rounds over every record
        #[arg(short, long, default_value = "3")]
        updates: usize,

        /// Tail groups per page range before compaction
        #[arg(short, long, default_value = "50")]
        merge_threshold: usize,

        /// Compact on the writer thread instead of the background worker
        #[arg(long)]
        inline_merge: bool,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("LStore v{}", lstore::VERSION);

    let outcome = match args.command {
        Commands::Demo => run_demo(),
        Commands::Workload {
            records,
            updates,
            merge_threshold,
            inline_merge,
        } => {
            let mode = if inline_merge {
                MergeMode::Inline
            } else {
                MergeMode::Background
            };
            run_workload(records, updates, merge_threshold, mode)
        }
    };

    if let Err(e) = outcome {
        tracing::error!("Run failed: {}", e);
        process::exit(1);
    }
}

fn run_demo() -> Result<()> {
    let db = Database::open(Config::default())?;
    let table = db.create_table("demo", 3, 0)?;

    table.insert(&[1, 10, 100])?;
    table.update(1, &[None, Some(20), None])?;
    tracing::info!("key 1, column 1, latest   = {}", table.read_column(1, 1, 0)?);
    tracing::info!("key 1, column 1, previous = {}", table.read_column(1, 1, 1)?);
    tracing::info!("key 1, column 2, latest   = {}", table.read_column(2, 1, 0)?);

    let grades = db.create_table("grades", 2, 0)?;
    for (key, value) in (1..=5).zip([10, 20, 30, 40, 50]) {
        grades.insert(&[key, value])?;
    }
    tracing::info!("sum of column 1 over keys [2, 4] = {}", grades.sum_range(2, 4, 1, 0)?);

    db.close();
    Ok(())
}

fn run_workload(records: i64, updates: usize, merge_threshold: usize, mode: MergeMode) -> Result<()> {
    let config = Config::builder()
        .merge_threshold_pages(merge_threshold)
        .merge_mode(mode)
        .build();
    let db = Database::open(config)?;
    let table = db.create_table("workload", 5, 0)?;
    let query = Query::new(table.clone());

    let started = Instant::now();
    for key in 0..records {
        table.insert(&[key, key * 2, key * 3, key % 7, 0])?;
    }
    tracing::info!("Inserted {} records in {:?}", records, started.elapsed());

    let started = Instant::now();
    for round in 0..updates {
        for key in 0..records {
            table.update(key, &[None, Some(key + round as i64), None, None, Some(round as i64)])?;
        }
    }
    tracing::info!(
        "Applied {} updates in {:?}",
        records * updates as i64,
        started.elapsed()
    );

    let started = Instant::now();
    let mut checksum: i64 = 0;
    for key in 0..records {
        checksum = checksum.wrapping_add(table.read_column(1, key, LATEST_VERSION)?);
    }
    tracing::info!("Read {} latest values in {:?} (checksum {})", records, started.elapsed(), checksum);

    let started = Instant::now();
    let total = query.sum(0, records - 1, 2);
    tracing::info!("Summed column 2 in {:?}: {:?}", started.elapsed(), total);

    db.close();
    let stats = table.stats();
    tracing::info!(
        "Page ranges: {}, tail groups: {}, live records: {}, RIDs: {}, merges: {}",
        stats.page_ranges,
        stats.tail_groups,
        stats.live_records,
        stats.rids_minted,
        stats.merges
    );
    Ok(())
}
