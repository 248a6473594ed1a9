//! Delimited (CSV) batch reading

pub mod reader;
