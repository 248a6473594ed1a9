//! Database layer - destination pool and table schema

pub mod pool;
pub mod schema;

pub use pool::Pool;
