//! File format parsers and readers

pub mod conversion;
pub mod delimited;
pub mod reader;

pub use delimited::reader::DelimitedBatchReader;
pub use reader::{Batch, BatchSource, DelimitedConfig, Record, Value};
