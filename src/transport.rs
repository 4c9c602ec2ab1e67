//! The document-transport collaborator boundary.
//!
//! Fetching lives behind a trait: the engine only needs ordered version
//! lists and a latest-version index, and it never blocks on network I/O
//! itself. Retry, backoff and pagination belong to the implementation.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde_json::Value;
use thiserror::Error;

use crate::db;
use crate::ingest::{self, IngestError};
use crate::models::enums::DocumentKind;
use crate::models::Article;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("content not found: {0}")]
    NotFound(String),

    #[error("transient fetch failure: {0}")]
    Transient(String),
}

pub trait DocumentTransport {
    /// Every known version of one article, ascending.
    fn fetch(&self, msid: &str) -> Result<Vec<Value>, FetchError>;

    /// msid to latest-known-version, for bulk ingestion.
    fn fetch_index(&self) -> Result<BTreeMap<String, i64>, FetchError>;
}

/// Fetch and store all versions of one article. Returns how many were stored.
pub fn download_article_versions(
    conn: &Connection,
    transport: &dyn DocumentTransport,
    msid: &str,
) -> Result<usize, IngestError> {
    let docs = transport.fetch(msid)?;
    tracing::info!(msid, versions = docs.len(), "storing fetched versions");
    for doc in &docs {
        let version = doc
            .get("version")
            .and_then(Value::as_i64)
            .ok_or_else(|| IngestError::Validation(format!("document for {msid} has no version")))?;
        db::upsert_raw_document(conn, msid, version, DocumentKind::ArticleJson, doc)?;
    }
    Ok(docs.len())
}

/// Fetch and store every article the index knows about, newest msid first.
pub fn download_all_article_versions(
    conn: &Connection,
    transport: &dyn DocumentTransport,
) -> Result<usize, IngestError> {
    let index = transport.fetch_index()?;
    tracing::info!(articles = index.len(), "articles to fetch");
    let mut stored = 0;
    for msid in index.keys().rev() {
        stored += download_article_versions(conn, transport, msid)?;
    }
    Ok(stored)
}

/// Convenience: download one article's versions and regenerate it.
/// A fetch failure is logged and skipped, never fatal; the article is
/// probably unpublished.
pub fn download_regenerate(
    conn: &mut Connection,
    transport: &dyn DocumentTransport,
    msid: &str,
) -> Result<Option<Article>, IngestError> {
    match download_article_versions(conn, transport, msid) {
        Ok(_) => {}
        Err(IngestError::Fetch(FetchError::NotFound(reason))) => {
            tracing::debug!(msid, reason, "failed to fetch article");
            return Ok(None);
        }
        Err(IngestError::Fetch(FetchError::Transient(reason))) => {
            tracing::error!(msid, reason, "failed to fetch article");
            return Ok(None);
        }
        Err(other) => return Err(other),
    }
    ingest::regenerate_article(conn, msid).map(Some)
}
