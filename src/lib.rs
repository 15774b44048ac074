//! radmart: incremental ETL and dimensional warehouse engine for clinical
//! imaging records.
//!
//! The engine moves study records from a tabular source feed into a
//! natural-keyed operational store exactly once per natural key, then
//! rebuilds a surrogate-keyed star schema from it and checks the result
//! with a fixed integrity battery:
//!
//! feed → incremental filter → batch load (operational store) →
//! dimensional transform (warehouse, truncate-and-rebuild) → QA report.
//!
//! Execution is single-threaded and synchronous: one transaction per load
//! batch, one per transform stage, batches strictly in input order. The
//! engine assumes a single running instance; nothing guards the
//! incremental filter's read-then-write window against a second writer.

pub mod config;
pub mod db;
pub mod etl;
pub mod feed;
pub mod models;
pub mod warehouse;
