use serde::{Deserialize, Serialize};

use super::enums::DocumentKind;

/// One stored version of an article's source JSON, exactly as fetched.
/// Identity: (msid, version, kind). Upserts are last-write-wins and the
/// stored JSON is never touched by regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub msid: String,
    /// 1-based article version; metrics summaries use version 0.
    pub version: i64,
    pub kind: DocumentKind,
    pub json: serde_json::Value,
}
