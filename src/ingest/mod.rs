//! The ingestion core: declarative extraction, history derivation and
//! transactional regeneration of articles from their raw version history.

pub mod article;
pub mod children;
pub mod derive;
pub mod descriptor;
pub mod guard;
pub mod regenerate;
pub mod value;

pub use descriptor::{Descriptor, EvalContext, ExtractError, Stage};
pub use regenerate::{
    ingest_document, regenerate_all, regenerate_article, regenerate_many, BatchReport, RegenPolicy,
};
pub use value::{Extracted, FieldMap, FlatRecord};

use thiserror::Error;

use crate::db::StoreError;
use crate::transport::FetchError;

/// Failure taxonomy for ingestion. Batch processing keys off the class:
/// validation and state errors may be downgraded to skip-and-log, fetch
/// errors surface unchanged from the transport collaborator, anything
/// else aborts the enclosing batch.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("validation: {0}")]
    Extract(#[from] ExtractError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("state: {0}")]
    State(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Unclassified(String),
}

impl IngestError {
    pub fn is_validation(&self) -> bool {
        matches!(self, IngestError::Extract(_) | IngestError::Validation(_))
    }

    pub fn is_state(&self) -> bool {
        matches!(self, IngestError::State(_))
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use serde_json::{json, Value};

    /// A plausible article-json document for one version.
    pub fn ajson(msid: &str, version: i64, status: &str, published: &str, version_date: &str) -> Value {
        json!({
            "id": msid,
            "version": version,
            "status": status,
            "type": "research-article",
            "title": format!("Article {msid}"),
            "published": published,
            "versionDate": version_date,
            "volume": 7,
            "authorLine": "Jane Doe et al.",
            "abstract": {"content": [{"text": "An abstract."}]},
            "authors": [
                {
                    "type": "person",
                    "name": {"preferred": "Jane Doe", "index": "Doe, Jane"},
                    "emailAddresses": ["jane@example.org"],
                    "affiliations": [{"address": {"components": {"country": "BE"}}}]
                },
                {
                    "type": "person",
                    "name": {"preferred": "John Roe", "index": "Roe, John"}
                }
            ],
            "subjects": [
                {"id": "cell-biology", "name": "Cell Biology"}
            ],
            "references": [{}, {}]
        })
    }
}
