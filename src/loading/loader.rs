use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::writer::{TableWriter, record_preview};
use crate::formats::BatchSource;
use crate::telemetry::TelemetryEvent;

/// Result of a completed load
#[derive(Debug)]
pub struct LoadOutcome {
    pub batches_loaded: u64,
    pub records_loaded: u64,
    pub duration: Duration,
    /// Row count of every batch in arrival order (accessed in integration tests)
    #[cfg_attr(not(test), allow(dead_code))]
    pub batch_sizes: Vec<usize>,
}

/// Loads a batch stream into one destination table: replace from the first
/// batch's projection, then append every batch in order.
///
/// Strictly sequential. One batch is pulled, written and dropped before the
/// next pull. Nothing is retried; the first error aborts the run and leaves
/// whatever batches were already committed.
pub struct ChunkedTableLoader {
    writer: TableWriter,
    telemetry_tx: Option<mpsc::UnboundedSender<TelemetryEvent>>,
}

impl ChunkedTableLoader {
    pub fn new(
        writer: TableWriter,
        telemetry_tx: Option<mpsc::UnboundedSender<TelemetryEvent>>,
    ) -> Self {
        Self {
            writer,
            telemetry_tx,
        }
    }

    fn send(&self, event: TelemetryEvent) {
        if let Some(tx) = &self.telemetry_tx {
            let _ = tx.send(event);
        }
    }

    /// Run the complete load
    ///
    /// 1. Pull the first batch (a failure here leaves the destination untouched)
    /// 2. Replace the table from the batch's zero-row projection
    /// 3. Append the first batch
    /// 4. Append the remaining batches until the source is exhausted
    ///
    /// Batches are pulled inline on the calling task, so decompression and CSV
    /// parsing block that worker until the batch is complete. The load is the
    /// only task touching the source or the destination; the progress task is
    /// the only other work on the runtime. This also keeps `run` usable on a
    /// current-thread runtime, where `block_in_place` would panic.
    pub async fn run(&self, batches: &mut dyn BatchSource) -> Result<LoadOutcome> {
        let start_time = Instant::now();

        // 1. First batch
        let Some(first) = batches.next_batch().context("Failed to read first batch")? else {
            anyhow::bail!("Source produced no batches");
        };

        // 2. Replace
        info!(
            table = self.writer.table_spec(),
            columns = first.schema.len(),
            "Creating table schema..."
        );
        self.writer
            .replace(&first.projection())
            .await
            .with_context(|| format!("Failed to create table schema for {}", self.writer.table_spec()))?;
        self.send(TelemetryEvent::TableReplaced {
            columns: first.schema.len(),
        });

        // 3 + 4. Append in arrival order
        let mut outcome = LoadOutcome {
            batches_loaded: 0,
            records_loaded: 0,
            duration: Duration::ZERO,
            batch_sizes: Vec::new(),
        };

        info!("Inserting first chunk...");
        let mut next = Some(first);
        while let Some(batch) = next {
            let batch_index = outcome.batches_loaded;

            let result = match self.writer.append(&batch).await {
                Ok(result) => result,
                Err(e) => {
                    if let Some(record) = batch.records.first() {
                        warn!(
                            batch_index,
                            batch_size = batch.len(),
                            first_record = %record_preview(record),
                            "batch rejected by destination"
                        );
                    }
                    return Err(e).with_context(|| {
                        format!(
                            "Failed to append batch {} (source rows {}..{})",
                            batch_index,
                            batch.first_row,
                            batch.first_row + batch.len() as u64
                        )
                    });
                }
            };

            outcome.batches_loaded += 1;
            outcome.records_loaded += result.records_loaded;
            outcome.batch_sizes.push(batch.len());
            self.send(TelemetryEvent::BatchLoaded {
                batch_index,
                records_loaded: result.records_loaded,
                duration_ms: result.duration_ms,
            });

            if batch_index == 0 {
                info!("Loading remaining chunks...");
            }

            // Release the written batch before pulling the next one
            drop(batch);
            next = batches.next_batch().with_context(|| {
                format!("Failed to read batch {}", outcome.batches_loaded)
            })?;
        }

        outcome.duration = start_time.elapsed();
        info!(
            "Load complete: {} batches, {} records in {:.2}s",
            outcome.batches_loaded,
            outcome.records_loaded,
            outcome.duration.as_secs_f64()
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Pool;
    use crate::db::schema::{Column, Schema, SqlType};
    use crate::error::{ErrorCategory, LoadError};
    use crate::formats::{Batch, Record, Value};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted producer: yields the given batches (or errors) in order
    struct ScriptedSource {
        steps: VecDeque<Result<Batch, LoadError>>,
    }

    impl BatchSource for ScriptedSource {
        fn next_batch(&mut self) -> Result<Option<Batch>, LoadError> {
            self.steps.pop_front().transpose()
        }
    }

    fn batch(first_row: u64, ids: &[i64]) -> Batch {
        Batch {
            schema: Arc::new(Schema {
                columns: vec![Column {
                    name: "VendorID".to_string(),
                    sql_type: SqlType::BigInt,
                }],
            }),
            records: ids
                .iter()
                .map(|id| Record {
                    values: vec![Value::Int(Some(*id))],
                })
                .collect(),
            first_row,
        }
    }

    async fn table_exists(pool: &Pool, name: &str) -> bool {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(pool.sqlite())
                .await
                .unwrap();
        count > 0
    }

    #[tokio::test]
    async fn test_replace_then_append_sequence() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let loader = ChunkedTableLoader::new(
            TableWriter::new(pool.clone(), "public", "trips", None, 100),
            Some(tx),
        );

        let mut source = ScriptedSource {
            steps: VecDeque::from(vec![Ok(batch(0, &[1, 2])), Ok(batch(2, &[3]))]),
        };
        let outcome = loader.run(&mut source).await.unwrap();
        drop(loader);

        assert_eq!(outcome.batch_sizes, vec![2, 1]);
        assert_eq!(outcome.records_loaded, 3);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events[0], TelemetryEvent::TableReplaced { columns: 1 }));
        assert!(matches!(
            events[1],
            TelemetryEvent::BatchLoaded {
                batch_index: 0,
                records_loaded: 2,
                ..
            }
        ));
        assert!(matches!(
            events[2],
            TelemetryEvent::BatchLoaded {
                batch_index: 1,
                records_loaded: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_first_batch_failure_leaves_destination_untouched() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let loader =
            ChunkedTableLoader::new(TableWriter::new(pool.clone(), "public", "trips", None, 100), None);

        let mut source = ScriptedSource {
            steps: VecDeque::from(vec![Err(LoadError::TypeCoercion {
                line: 6,
                column: "fare_amount".to_string(),
                expected: "DOUBLE PRECISION",
                value: "x".to_string(),
            })]),
        };
        let err = loader.run(&mut source).await.unwrap_err();

        let load_error = err.downcast_ref::<LoadError>().unwrap();
        assert_eq!(load_error.category(), ErrorCategory::TypeCoercion);
        assert!(!table_exists(&pool, "trips").await);
    }

    #[tokio::test]
    async fn test_later_failure_keeps_committed_batches() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let loader =
            ChunkedTableLoader::new(TableWriter::new(pool.clone(), "public", "trips", None, 100), None);

        let mut source = ScriptedSource {
            steps: VecDeque::from(vec![
                Ok(batch(0, &[1, 2])),
                Ok(batch(2, &[3, 4])),
                Err(LoadError::FieldCount {
                    line: 6,
                    expected: 1,
                    found: 2,
                }),
            ]),
        };
        let err = loader.run(&mut source).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read batch 2"));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM \"trips\"")
            .fetch_one(pool.sqlite())
            .await
            .unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_empty_source_is_an_error() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let loader =
            ChunkedTableLoader::new(TableWriter::new(pool.clone(), "public", "trips", None, 100), None);

        let mut source = ScriptedSource {
            steps: VecDeque::new(),
        };
        assert!(loader.run(&mut source).await.is_err());
        assert!(!table_exists(&pool, "trips").await);
    }
}
