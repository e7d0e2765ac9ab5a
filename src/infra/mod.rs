//! Infrastructure layer: config, logging, errors and on-disk persistence.

pub mod config;
pub mod contracts;
pub mod error;
pub mod logging;
pub mod snapshot_file;
pub mod storage_layout;
#[cfg(test)]
pub mod stubs;
