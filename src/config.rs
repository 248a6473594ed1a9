//! Configuration constants for the loader
//!
//! This module centralizes defaults and tunable parameters used throughout
//! the application.

use std::time::Duration;

// ============================================================================
// Source Configuration
// ============================================================================

/// Release bucket the NYC TLC trip files are published under
pub const DATASET_URL_PREFIX: &str =
    "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/yellow/";

pub const DEFAULT_DATASET: &str = "yellow_tripdata_2021-01.csv.gz";

/// Rows per batch pulled from the source
///
/// 100k taxi rows decode to roughly 30-40 MB of typed values, which keeps a
/// single resident batch comfortably bounded.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size for reading the decompressed source stream
pub const READ_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

// ============================================================================
// Destination Configuration
// ============================================================================

pub const DEFAULT_PG_USER: &str = "root";
pub const DEFAULT_PG_PASSWORD: &str = "root";
pub const DEFAULT_PG_HOST: &str = "localhost";
pub const DEFAULT_PG_PORT: u16 = 5433;
pub const DEFAULT_PG_DATABASE: &str = "ny_taxi";
pub const DEFAULT_TARGET_TABLE: &str = "yellow_taxi_data";
pub const DEFAULT_SCHEMA: &str = "public";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(45);

/// Rows per INSERT statement before the bind-parameter cap applies
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 2000;

/// Upper bound on bind parameters in a single statement
///
/// Postgres accepts 65535, SQLite 32766; the lower of the two keeps test and
/// production statements the same shape.
pub const MAX_BIND_PARAMS: usize = 32_766;
