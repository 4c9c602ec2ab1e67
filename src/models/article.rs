use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::PubStatus;

/// Flattened, latest-known state of one article.
///
/// Every field except the identity and the version counter may be absent:
/// a single-version replay can only recompute the subset of fields
/// derivable from that version's context, and leaves the rest alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub msid: String,
    pub current_version: i64,
    pub status: Option<PubStatus>,
    pub journal_name: Option<String>,
    pub title: Option<String>,
    pub doi: Option<String>,
    pub abstract_text: Option<String>,
    pub author_line: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub impact_statement: Option<String>,
    pub article_type: Option<String>,
    pub volume: Option<i64>,
    pub num_authors: Option<i64>,
    pub num_references: Option<i64>,
    pub num_poa_versions: Option<i64>,
    pub num_vor_versions: Option<i64>,
    pub datetime_published: Option<DateTime<Utc>>,
    pub datetime_version_published: Option<DateTime<Utc>>,
    pub datetime_poa_published: Option<DateTime<Utc>>,
    pub datetime_vor_published: Option<DateTime<Utc>>,
    pub days_publication_to_current_version: Option<i64>,
    pub num_views: Option<i64>,
    pub num_downloads: Option<i64>,
    pub num_citations: Option<i64>,
}

impl Article {
    pub fn new(msid: &str) -> Self {
        Self {
            msid: msid.to_string(),
            current_version: 0,
            status: None,
            journal_name: None,
            title: None,
            doi: None,
            abstract_text: None,
            author_line: None,
            author_name: None,
            author_email: None,
            impact_statement: None,
            article_type: None,
            volume: None,
            num_authors: None,
            num_references: None,
            num_poa_versions: None,
            num_vor_versions: None,
            datetime_published: None,
            datetime_version_published: None,
            datetime_poa_published: None,
            datetime_vor_published: None,
            days_publication_to_current_version: None,
            num_views: None,
            num_downloads: None,
            num_citations: None,
        }
    }
}
