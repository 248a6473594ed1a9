use std::io::BufRead;
use std::sync::Arc;

use crate::db::schema::{ColumnTyping, Schema};
use crate::error::LoadError;
use crate::formats::conversion::{FieldPosition, convert_field};
use crate::formats::reader::{Batch, BatchSource, DelimitedConfig, Record};

/// Cap on up-front allocation per batch; large chunk sizes grow on demand
const MAX_PREALLOCATED_RECORDS: usize = 8192;

/// Cursor over a delimited stream that yields typed batches in file order
///
/// Bytes are pulled from the underlying (already decompressed) stream only as
/// records are needed, so at most one batch of parsed records is resident.
pub struct DelimitedBatchReader<R: BufRead + Send> {
    csv_reader: csv::Reader<R>,
    schema: Arc<Schema>,
    chunk_size: usize,
    record: csv::StringRecord,
    rows_read: u64,
    batches_produced: u64,
}

impl<R: BufRead + Send> DelimitedBatchReader<R> {
    /// Read the header and resolve it against the declared typing
    pub fn new(
        reader: R,
        config: &DelimitedConfig,
        typing: &ColumnTyping,
        chunk_size: usize,
    ) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(config.delimiter)
            .quote(config.quote)
            .has_headers(true)
            .flexible(true) // field counts are checked per record with line numbers
            .from_reader(reader);

        let header: Vec<String> = csv_reader
            .headers()
            .map_err(|e| csv_error(e, 1))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();

        let schema = typing.resolve(&header)?;

        tracing::debug!(columns = schema.len(), "source header resolved");

        Ok(Self {
            csv_reader,
            schema: Arc::new(schema),
            chunk_size: chunk_size.max(1),
            record: csv::StringRecord::new(),
            rows_read: 0,
            batches_produced: 0,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn current_line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }

    fn convert_record(&self) -> Result<Record, LoadError> {
        let line = self.current_line();

        if self.record.len() != self.schema.len() {
            return Err(LoadError::FieldCount {
                line,
                expected: self.schema.len(),
                found: self.record.len(),
            });
        }

        let values = self
            .record
            .iter()
            .zip(&self.schema.columns)
            .map(|(raw, column)| {
                convert_field(
                    raw,
                    column.sql_type,
                    &FieldPosition {
                        line,
                        column: &column.name,
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Record { values })
    }
}

impl<R: BufRead + Send> BatchSource for DelimitedBatchReader<R> {
    fn next_batch(&mut self) -> Result<Option<Batch>, LoadError> {
        let first_row = self.rows_read;
        let mut records = Vec::with_capacity(self.chunk_size.min(MAX_PREALLOCATED_RECORDS));

        while records.len() < self.chunk_size {
            let has_record = self
                .csv_reader
                .read_record(&mut self.record)
                .map_err(|e| csv_error(e, self.rows_read + records.len() as u64 + 2))?;
            if !has_record {
                break;
            }
            records.push(self.convert_record()?);
        }

        // The first pull always produces a batch so the schema can be derived
        // from a header-only source.
        if records.is_empty() && self.batches_produced > 0 {
            return Ok(None);
        }

        self.rows_read += records.len() as u64;
        self.batches_produced += 1;

        Ok(Some(Batch {
            schema: Arc::clone(&self.schema),
            records,
            first_row,
        }))
    }
}

/// Map a csv error, keeping I/O failures (network, decompression) apart
/// from malformed content.
fn csv_error(error: csv::Error, approx_line: u64) -> LoadError {
    let line = error
        .position()
        .map(|p| p.line())
        .unwrap_or(approx_line);
    match error.into_kind() {
        csv::ErrorKind::Io(e) => LoadError::io("Failed to read source", e),
        kind => LoadError::MalformedRecord {
            line,
            message: format!("{:?}", kind),
        },
    }
}
