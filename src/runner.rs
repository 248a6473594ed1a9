//! High-level runner API for the taxi trip loader.
//!
//! This module provides a simplified public interface that encapsulates
//! opening the source, connecting to the destination and driving the chunked
//! load with progress reporting.
//!
//! This is the primary API for external users and for the CLI.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::db::pool as db_pool;
use crate::formats::{DelimitedBatchReader, DelimitedConfig};
use crate::io::{self, SourceUri};
use crate::loading::{ChunkedTableLoader, TableWriter};
use crate::telemetry::{ProgressStats, TelemetryEvent};

pub use crate::db::pool::{PoolArgs, PoolArgsBuilder};
pub use crate::db::schema::{ColumnTyping, SqlType};
pub use crate::error::{ErrorCategory, LoadError};

/// Arguments for running a load operation
#[derive(Clone)]
pub struct LoadArgs {
    // Destination configuration
    pub destination: PoolArgs,
    pub target_table: String,
    pub schema: String,

    // Source configuration
    pub source_uri: String,
    pub typing: ColumnTyping,

    // Batching
    pub chunk_size: usize,
    pub insert_batch_size: usize,

    // Options
    pub index_column: Option<String>,
    pub quiet: bool,

    // Test-only: inject a pre-created pool (for SQLite testing)
    #[cfg(test)]
    pub test_pool: Option<crate::db::Pool>,
}

/// Result of a completed load operation
#[derive(Debug)]
pub struct LoadResult {
    pub run_id: String,
    pub batches_loaded: u64,
    pub records_loaded: u64,
    pub duration: Duration,
    pub batch_p50_ms: Option<u64>,
    pub batch_p90_ms: Option<u64>,
    pub batch_p99_ms: Option<u64>,
    /// Row count of every batch in arrival order (accessed in integration tests)
    #[cfg_attr(not(test), allow(dead_code))]
    pub batch_sizes: Vec<usize>,
}

/// Build a column typing from `name:type` pairs and timestamp column names
///
/// # Example
///
/// ```
/// use nyc_taxi_loader::runner::column_typing;
///
/// let typing = column_typing(
///     &[("VendorID".to_string(), "Int64".to_string())],
///     &["tpep_pickup_datetime".to_string()],
/// )
/// .unwrap();
/// assert_eq!(typing.column_count(), 2);
/// ```
pub fn column_typing(dtypes: &[(String, String)], parse_dates: &[String]) -> Result<ColumnTyping> {
    let typed = dtypes
        .iter()
        .map(|(name, ty)| Ok((name.clone(), SqlType::parse(ty)?)))
        .collect::<Result<Vec<_>, LoadError>>()?;
    Ok(ColumnTyping::new(typed, parse_dates.iter().cloned())?)
}

/// Run a load operation with the specified arguments
///
/// Connects to the destination, opens the source, replaces the target table
/// from the first batch and appends the rest. The destination is not touched
/// until the first batch has been read in full.
///
/// # Example
///
/// ```no_run
/// use nyc_taxi_loader::runner::{LoadArgs, default_typing, run_load};
/// use nyc_taxi_loader::runner::PoolArgsBuilder;
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = LoadArgs {
///     destination: PoolArgsBuilder::default().port(5432u16).build()?,
///     target_table: "yellow_taxi_data".to_string(),
///     schema: "public".to_string(),
///     source_uri: "/data/yellow_tripdata_2021-01.csv.gz".to_string(),
///     typing: default_typing(),
///     chunk_size: 100_000,
///     insert_batch_size: 2000,
///     index_column: None,
///     quiet: true,
/// };
///
/// let result = run_load(args).await?;
/// println!("Loaded {} records in {:?}", result.records_loaded, result.duration);
/// # Ok(())
/// # }
/// ```
pub async fn run_load(args: LoadArgs) -> Result<LoadResult> {
    if args.chunk_size == 0 {
        anyhow::bail!("Chunk size must be at least 1");
    }

    let run_id = Uuid::new_v4().to_string();
    tracing::info!(run_id, source = %args.source_uri, table = %args.target_table, "Starting ingestion");

    // Create connection pool (or use test pool if provided)
    #[cfg(test)]
    let (pool, owns_pool) = if let Some(test_pool) = args.test_pool.clone() {
        (test_pool, false)
    } else {
        let pool = db_pool::pool(args.destination.clone())
            .await
            .context("Failed to connect to destination")?;
        (pool, true)
    };

    #[cfg(not(test))]
    let (pool, owns_pool) = (
        db_pool::pool(args.destination.clone())
            .await
            .context("Failed to connect to destination")?,
        true,
    );

    tracing::info!("Connected to destination");

    // The table is only replaced once the first batch has been fully read
    let source_uri = SourceUri::parse(&args.source_uri)?;
    tracing::info!(source = %source_uri, "Opening source");
    let byte_source = io::byte_source(&source_uri)?;
    let stream = byte_source
        .open()
        .await
        .with_context(|| format!("Failed to open source {}", byte_source.location()))?;
    let decompressed = io::decompress(stream).context("Failed to open source stream")?;
    let mut reader = DelimitedBatchReader::new(
        decompressed,
        &DelimitedConfig::csv(),
        &args.typing,
        args.chunk_size,
    )
    .context("Failed to read source header")?;
    tracing::info!(columns = reader.schema().len(), "Source header matches declared typing");

    let (telemetry_tx, telemetry_rx) = mpsc::unbounded_channel::<TelemetryEvent>();
    let progress = spawn_progress_tracking(args.quiet, telemetry_rx);

    let writer = TableWriter::new(
        pool.clone(),
        &args.schema,
        &args.target_table,
        args.index_column.clone(),
        args.insert_batch_size,
    );
    let loader = ChunkedTableLoader::new(writer, Some(telemetry_tx));
    let outcome = loader.run(&mut reader).await;

    // Closing the channel lets the progress task finish
    drop(loader);
    let stats = progress.await.unwrap_or_default();
    if owns_pool {
        pool.close().await;
    }

    let outcome = outcome?;
    let (batch_p50_ms, batch_p90_ms, batch_p99_ms) = stats.get_percentiles();

    Ok(LoadResult {
        run_id,
        batches_loaded: outcome.batches_loaded,
        records_loaded: outcome.records_loaded,
        duration: outcome.duration,
        batch_p50_ms,
        batch_p90_ms,
        batch_p99_ms,
        batch_sizes: outcome.batch_sizes,
    })
}

/// Typing of the NYC yellow taxi trip files
pub fn default_typing() -> ColumnTyping {
    ColumnTyping::yellow_taxi()
}

/// Aggregate telemetry and, unless quiet, drive a progress spinner
///
/// The total row count of a compressed stream is unknown up front, so this is a
/// spinner with counters rather than a bar.
fn spawn_progress_tracking(
    quiet: bool,
    mut telemetry_rx: mpsc::UnboundedReceiver<TelemetryEvent>,
) -> tokio::task::JoinHandle<ProgressStats> {
    let spinner = if quiet {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("[{elapsed_precise}] {spinner} {msg}")
        {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message("Creating table schema...");
        Some(bar)
    };

    tokio::spawn(async move {
        let mut stats = ProgressStats::new();
        let started = Instant::now();

        while let Some(event) = telemetry_rx.recv().await {
            stats.update(&event);

            if let Some(ref bar) = spinner {
                let (p50, p90, p99) = stats.get_percentiles();
                let timing = match (p50, p90, p99) {
                    (Some(p50), Some(p90), Some(p99)) => {
                        format!(" | batch p50: {}ms, p90: {}ms, p99: {}ms", p50, p90, p99)
                    }
                    _ => String::new(),
                };
                let rate = stats.records_loaded as f64 / started.elapsed().as_secs_f64().max(0.001);
                let columns = stats
                    .columns
                    .map(|c| format!("Columns: {} | ", c))
                    .unwrap_or_default();
                bar.set_message(format!(
                    "{}Batches: {} | Rows: {} ({:.0} rows/s){}",
                    columns, stats.batches_loaded, stats.records_loaded, rate, timing
                ));
            }
        }

        if let Some(bar) = spinner {
            bar.finish();
        }

        stats
    })
}
