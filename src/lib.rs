// Public API - the runner plus the defaults the CLI is built from
pub mod config;
pub mod runner;

// Internal modules - organized by subsystem
mod db;
mod error;
mod formats;
mod io;
mod loading;
mod telemetry;
