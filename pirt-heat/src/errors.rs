use thiserror::Error;

use pirt_core::errors::{ConfigError, InputError};
use pirt_overlaps::TreeError;

/// Errors surfaced by a scan or correlation run.
///
/// All of these are fatal to the run: configuration problems are caught
/// before any input is read, input problems abort the run, and
/// inconsistencies indicate an engine bug rather than bad data.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("input: {0}")]
    Input(#[from] InputError),

    #[error("data inconsistency: {0}")]
    Inconsistency(String),
}

impl From<TreeError> for ScanError {
    fn from(e: TreeError) -> Self {
        ScanError::Inconsistency(e.to_string())
    }
}
