//! Star-schema warehouse: truncate-and-rebuild transformation plus the
//! integrity QA battery over the result.

pub mod qa;
pub mod transform;

pub use qa::{run_checks, CheckStatus, QaCheck, QaReport};
pub use transform::{rebuild, TransformStats};

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
