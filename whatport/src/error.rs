use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store and query operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures surfaced by the record store and the query engine.
///
/// An empty match set is never an error; these cover missing data, data
/// access failures and datasets that cannot be loaded.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No port database at {}, run `whatport import <file>` first", .0.display())]
    Missing(PathBuf),

    #[error("{} is not a port database, table {table:?} is missing", .path.display())]
    Schema { path: PathBuf, table: &'static str },

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Invalid record #{index}: {message}")]
    InvalidRecord { index: usize, message: String },

    #[error("Store worker is not running")]
    WorkerGone,
}

impl StoreError {
    /// Check if this is the "no data yet" condition rather than a failure
    pub fn is_missing(&self) -> bool {
        matches!(self, StoreError::Missing(_))
    }
}
