use std::time::Instant;

use crate::config::MAX_BIND_PARAMS;
use crate::db::Pool;
use crate::db::schema::{Schema, quote_ident};
use crate::error::LoadError;
use crate::formats::{Batch, Record};

/// Result of appending one batch
#[derive(Debug)]
pub struct BatchResult {
    pub records_loaded: u64,
    pub duration_ms: u64,
}

/// Issues the two table operations a load needs: replace and append
pub struct TableWriter {
    pool: Pool,
    table_spec: String,
    index_column: Option<String>,
    insert_batch_size: usize,
}

impl TableWriter {
    pub fn new(
        pool: Pool,
        schema_name: &str,
        table_name: &str,
        index_column: Option<String>,
        insert_batch_size: usize,
    ) -> Self {
        let table_spec = pool.qualified_table_name(schema_name, table_name);
        Self {
            pool,
            table_spec,
            index_column,
            insert_batch_size: insert_batch_size.max(1),
        }
    }

    pub fn table_spec(&self) -> &str {
        &self.table_spec
    }

    /// Destroy any table of the same name and create it from a zero-row batch
    pub async fn replace(&self, projection: &Batch) -> Result<(), LoadError> {
        debug_assert!(projection.is_empty());
        self.pool
            .replace_table(
                &self.table_spec,
                &projection.schema,
                self.index_column.as_deref(),
            )
            .await?;
        Ok(())
    }

    /// Append a batch's rows in a single transaction
    ///
    /// Rows go out as multi-row INSERTs sized to stay under the bind-parameter
    /// cap. Either the whole batch is committed or none of it is.
    pub async fn append(&self, batch: &Batch) -> Result<BatchResult, LoadError> {
        let start = Instant::now();

        if batch.is_empty() {
            return Ok(BatchResult {
                records_loaded: 0,
                duration_ms: 0,
            });
        }

        let rows_per_statement = self.rows_per_statement(&batch.schema);
        let mut tx = self.pool.begin().await?;
        let mut records_loaded = 0u64;
        let mut next_index = batch.first_row;

        for records in batch.records.chunks(rows_per_statement) {
            let insert_sql = self.insert_sql(&batch.schema, records.len());
            let first_index = self.index_column.as_ref().map(|_| next_index);

            records_loaded += tx.execute_insert(&insert_sql, records, first_index).await?;
            next_index += records.len() as u64;
        }

        tx.commit().await?;

        Ok(BatchResult {
            records_loaded,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn params_per_row(&self, schema: &Schema) -> usize {
        schema.len() + usize::from(self.index_column.is_some())
    }

    fn rows_per_statement(&self, schema: &Schema) -> usize {
        let by_params = MAX_BIND_PARAMS / self.params_per_row(schema).max(1);
        self.insert_batch_size.min(by_params).max(1)
    }

    /// Build batch INSERT statement: INSERT INTO table (col1, col2) VALUES ($1, $2), ($3, $4), ...
    fn insert_sql(&self, schema: &Schema, row_count: usize) -> String {
        let column_list: Vec<String> = self
            .index_column
            .iter()
            .map(|name| quote_ident(name))
            .chain(schema.columns.iter().map(|c| quote_ident(&c.name)))
            .collect();

        let params_per_row = column_list.len();
        let mut param_idx = 1;
        let mut value_groups = Vec::with_capacity(row_count);

        for _ in 0..row_count {
            let placeholders: Vec<String> = (0..params_per_row)
                .map(|_| {
                    let placeholder = self.pool.placeholder(param_idx);
                    param_idx += 1;
                    placeholder
                })
                .collect();
            value_groups.push(format!("({})", placeholders.join(", ")));
        }

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table_spec,
            column_list.join(", "),
            value_groups.join(", ")
        )
    }
}

/// Preview of the first fields of a record, for failure messages
pub(crate) fn record_preview(record: &Record) -> String {
    let preview: Vec<String> = record
        .values
        .iter()
        .take(3)
        .map(|v| {
            if v.is_null() {
                "NULL".to_string()
            } else {
                format!("{:?}", v)
            }
        })
        .collect();
    format!(
        "[{}{}]",
        preview.join(", "),
        if record.values.len() > 3 { ", ..." } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{Column, SqlType};
    use crate::formats::Value;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema {
            columns: vec![
                Column {
                    name: "VendorID".to_string(),
                    sql_type: SqlType::BigInt,
                },
                Column {
                    name: "fare_amount".to_string(),
                    sql_type: SqlType::DoublePrecision,
                },
            ],
        })
    }

    fn batch(first_row: u64, rows: &[(Option<i64>, Option<f64>)]) -> Batch {
        Batch {
            schema: schema(),
            records: rows
                .iter()
                .map(|(id, fare)| Record {
                    values: vec![Value::Int(*id), Value::Float(*fare)],
                })
                .collect(),
            first_row,
        }
    }

    #[tokio::test]
    async fn test_insert_sql_shape() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = TableWriter::new(pool, "public", "trips", None, 100);

        let sql = writer.insert_sql(&schema(), 2);
        assert_eq!(
            sql,
            "INSERT INTO \"trips\" (\"VendorID\", \"fare_amount\") VALUES (?, ?), (?, ?)"
        );
    }

    #[tokio::test]
    async fn test_rows_per_statement_respects_param_cap() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = TableWriter::new(pool, "public", "trips", Some("index".to_string()), 100_000);

        // 2 columns + index = 3 params per row
        assert_eq!(writer.rows_per_statement(&schema()), MAX_BIND_PARAMS / 3);
    }

    #[tokio::test]
    async fn test_replace_then_append_in_statement_chunks() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        // 2 rows per INSERT forces several statements inside one transaction
        let writer = TableWriter::new(pool.clone(), "public", "trips", None, 2);

        let first = batch(0, &[(Some(1), Some(2.5)), (None, Some(3.0)), (Some(3), None)]);
        writer.replace(&first.projection()).await.unwrap();
        let result = writer.append(&first).await.unwrap();
        assert_eq!(result.records_loaded, 3);

        let rows: Vec<(Option<i64>, Option<f64>)> =
            sqlx::query_as("SELECT \"VendorID\", \"fare_amount\" FROM \"trips\" ORDER BY rowid")
                .fetch_all(pool.sqlite())
                .await
                .unwrap();
        assert_eq!(
            rows,
            vec![(Some(1), Some(2.5)), (None, Some(3.0)), (Some(3), None)]
        );
    }

    #[tokio::test]
    async fn test_append_writes_index_column() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = TableWriter::new(pool.clone(), "public", "trips", Some("index".to_string()), 10);

        let later = batch(5, &[(Some(7), Some(1.0)), (Some(8), Some(2.0))]);
        writer.replace(&later.projection()).await.unwrap();
        writer.append(&later).await.unwrap();

        let rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT \"index\", \"VendorID\" FROM \"trips\" ORDER BY rowid")
                .fetch_all(pool.sqlite())
                .await
                .unwrap();
        assert_eq!(rows, vec![(5, 7), (6, 8)]);
    }

    #[tokio::test]
    async fn test_append_empty_batch_is_noop() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = TableWriter::new(pool, "public", "missing_table", None, 10);

        // No statement is issued, so the missing table is never touched
        let result = writer.append(&batch(0, &[])).await.unwrap();
        assert_eq!(result.records_loaded, 0);
    }

    #[tokio::test]
    async fn test_append_without_table_is_destination_error() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = TableWriter::new(pool, "public", "missing_table", None, 10);

        let err = writer
            .append(&batch(0, &[(Some(1), Some(1.0))]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Destination);
    }

    #[test]
    fn test_record_preview_truncates() {
        let record = Record {
            values: vec![
                Value::Int(Some(1)),
                Value::Float(None),
                Value::Text(Some("N".to_string())),
                Value::Int(None),
            ],
        };
        let preview = record_preview(&record);
        assert!(preview.ends_with(", ...]"));
        assert!(preview.starts_with("[Int(Some(1)), NULL, "));
    }
}
