use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::db::schema::Schema;
use crate::error::LoadError;

/// A single typed field. `None` is an absent value and is written as NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Timestamp(Option<NaiveDateTime>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Int(v) => v.is_none(),
            Value::Float(v) => v.is_none(),
            Value::Text(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
        }
    }
}

/// A single record (row) from the file, typed per the batch schema
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<Value>,
}

/// An ordered, bounded group of records pulled from the source in one step
#[derive(Debug, Clone)]
pub struct Batch {
    pub schema: Arc<Schema>,
    pub records: Vec<Record>,
    /// 0-based position of the first record among all data rows of the source
    pub first_row: u64,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Same columns and types, zero rows
    pub fn projection(&self) -> Batch {
        Batch {
            schema: Arc::clone(&self.schema),
            records: Vec::new(),
            first_row: self.first_row,
        }
    }
}

/// Forward-only producer of batches
///
/// The first pull always yields a batch, possibly empty when the source has
/// a header and no rows, so the destination schema can still be derived.
/// Subsequent pulls yield `None` once the source is exhausted.
pub trait BatchSource: Send {
    fn next_batch(&mut self) -> Result<Option<Batch>, LoadError>;
}

/// Configuration for delimited file reading (CSV, TSV, etc.)
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl DelimitedConfig {
    pub fn csv() -> Self {
        Self::default()
    }
}
