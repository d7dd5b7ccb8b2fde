//! Error types for the batch extraction run.
//!
//! Provider failures are per case and never reach the top level during a run;
//! they are collected into the iteration report instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::providers::ProviderError;
use crate::pipeline::taxonomy::TaxonomyError;

/// The iteration store could not be read or written. Aborts the current
/// iteration only.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid {field} for a store file name: {value:?}")]
    InvalidName { field: &'static str, value: String },

    #[error("Store {path} has columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum CaseSourceError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task definition error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Case loading failed: {0}")]
    CaseSource(#[from] CaseSourceError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid answer pattern: {0}")]
    Pattern(#[from] regex::Error),
}
