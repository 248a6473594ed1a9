//! The chunked extract-load sequence

pub mod loader;
pub mod writer;

pub use loader::ChunkedTableLoader;
pub use writer::TableWriter;
