//! Incremental batch load: feed records → operational store, exactly once
//! per natural key.

pub mod cache;
pub mod filter;
pub mod identity;
pub mod load;

pub use cache::ReferenceCache;
pub use load::{LoadEngine, LoadStats};

use thiserror::Error;

use crate::db::DatabaseError;
use crate::feed::FeedError;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}
