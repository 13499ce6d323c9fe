//! Bundles a record collection, reads the first bundle on a worker thread,
//! and steals the tail of its range mid-read.
//!
//! Run with `cargo run --example rebalance -- --records 500`.

use clap::Parser;
use tracing::info;

use bundles::harness;
use bundles::source::{BoundedSource, VecSource};
use bundles::{JsonCodec, SourceError};

#[derive(Parser, Debug)]
#[command(about = "Bundle a record collection and rebalance it mid-read")]
struct Args {
    /// Number of records in the demo collection.
    #[arg(long, default_value_t = 500)]
    records: u64,
    /// Desired bundle size in estimated bytes.
    #[arg(long, default_value_t = 1024)]
    bundle_size: u64,
    /// Fraction of the live bundle's remaining range to steal.
    #[arg(long, default_value_t = 0.5)]
    steal_at: f64,
}

fn main() -> Result<(), SourceError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let args = Args::parse();

    let source = VecSource::from_records((0..args.records).collect(), JsonCodec)?;
    let splits = source.split(args.bundle_size)?;
    info!(
        total_size = source.total_size(),
        bundles = splits.len(),
        "planned static bundles"
    );
    for (idx, split) in splits.iter().enumerate() {
        info!(
            bundle = idx,
            start = split.start,
            stop = ?split.stop,
            size = split.size_estimate,
            "bundle"
        );
    }

    let victim = &splits[0];
    let tracker = victim
        .source
        .range_tracker(Some(victim.start), victim.stop.bounded())?;
    let stolen = std::thread::scope(|scope| {
        let reader = scope.spawn(|| -> Result<usize, SourceError> {
            let mut count = 0usize;
            for record in victim.source.read(&tracker) {
                record?;
                count += 1;
                std::thread::yield_now();
            }
            Ok(count)
        });
        // Retry until the steal lands or the reader drains the bundle.
        let residual = loop {
            match tracker.try_split_at_fraction(args.steal_at)? {
                Some(residual) => break Some(residual),
                None if tracker.fraction_consumed() >= 1.0 => break None,
                None => std::thread::yield_now(),
            }
        };
        let primary_count = reader.join().expect("reader thread panicked")?;
        info!(primary_count, "primary read finished");
        Ok::<_, SourceError>(residual)
    })?;

    match stolen {
        Some(residual) => {
            let tail = harness::read_all(&source, Some(residual.start), Some(residual.stop))?;
            info!(
                start = residual.start,
                stop = residual.stop,
                records = tail.len(),
                "stole residual range for another worker"
            );
        }
        None => info!("reader finished before any steal landed"),
    }
    Ok(())
}
