//! observer: a continuously-updatable store of flattened article records.
//!
//! Raw versioned article-json goes in; flat, reportable article rows plus
//! deduplicated authors and subjects come out, rebuildable at any time
//! from the stored version history.

pub mod config;
pub mod db;
pub mod feed;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod transport;
