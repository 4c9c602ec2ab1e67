//! The exclusion sentinel and the flat record it travels in.
//!
//! A field whose pipeline cannot be computed from the current version's
//! context yields `Extracted::Excluded` instead of a value. Excluded
//! fields are stripped before persistence so the stored value, if any,
//! is left untouched.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::IngestError;
use crate::models::enums::PubStatus;
use crate::models::Article;

/// A field value produced by a pipeline: either real data (JSON null
/// included) or the marker for "not computable this round".
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Value(Value),
    Excluded,
}

impl Extracted {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Extracted::Excluded)
    }

    /// The inner value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Extracted::Value(v) => Some(v),
            Extracted::Excluded => None,
        }
    }
}

impl From<Value> for Extracted {
    fn from(v: Value) -> Self {
        Extracted::Value(v)
    }
}

/// Output of descriptor evaluation: field name to pipeline result.
pub type FlatRecord = BTreeMap<String, Extracted>;

/// A record ready for persistence: excluded fields removed.
pub type FieldMap = BTreeMap<String, Value>;

/// Drop every excluded field, keeping real values (nulls included).
pub fn strip_excluded(record: FlatRecord) -> FieldMap {
    record
        .into_iter()
        .filter_map(|(k, v)| match v {
            Extracted::Value(v) => Some((k, v)),
            Extracted::Excluded => None,
        })
        .collect()
}

/// Emptiness in the original pipeline sense: null, "", 0, false, [] and {}.
pub fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Merge a stripped field map over an article. Fields absent from the map
/// keep their stored value; explicit nulls clear theirs.
pub fn apply_fields(article: &mut Article, fields: &FieldMap) -> Result<(), IngestError> {
    for (key, value) in fields {
        match key.as_str() {
            "msid" => article.msid = req_string(key, value)?,
            "current_version" => article.current_version = req_int(key, value)?,
            "status" => {
                article.status = match opt_string(key, value)? {
                    Some(s) => Some(
                        PubStatus::from_str(&s)
                            .map_err(|e| IngestError::Validation(e.to_string()))?,
                    ),
                    None => None,
                }
            }
            "journal_name" => article.journal_name = opt_string(key, value)?,
            "title" => article.title = opt_string(key, value)?,
            "doi" => article.doi = opt_string(key, value)?,
            "abstract" => article.abstract_text = opt_string(key, value)?,
            "author_line" => article.author_line = opt_string(key, value)?,
            "author_name" => article.author_name = opt_string(key, value)?,
            "author_email" => article.author_email = opt_string(key, value)?,
            "impact_statement" => article.impact_statement = opt_string(key, value)?,
            "type" => article.article_type = opt_string(key, value)?,
            "volume" => article.volume = opt_int(key, value)?,
            "num_authors" => article.num_authors = opt_int(key, value)?,
            "num_references" => article.num_references = opt_int(key, value)?,
            "num_poa_versions" => article.num_poa_versions = opt_int(key, value)?,
            "num_vor_versions" => article.num_vor_versions = opt_int(key, value)?,
            "days_publication_to_current_version" => {
                article.days_publication_to_current_version = opt_int(key, value)?
            }
            "num_views" => article.num_views = opt_int(key, value)?,
            "num_downloads" => article.num_downloads = opt_int(key, value)?,
            "num_citations" => article.num_citations = opt_int(key, value)?,
            "datetime_published" => article.datetime_published = opt_datetime(key, value)?,
            "datetime_version_published" => {
                article.datetime_version_published = opt_datetime(key, value)?
            }
            "datetime_poa_published" => article.datetime_poa_published = opt_datetime(key, value)?,
            "datetime_vor_published" => article.datetime_vor_published = opt_datetime(key, value)?,
            _ => {
                return Err(IngestError::Validation(format!(
                    "unknown article field '{key}'"
                )))
            }
        }
    }
    Ok(())
}

fn req_string(key: &str, value: &Value) -> Result<String, IngestError> {
    opt_string(key, value)?
        .ok_or_else(|| IngestError::Validation(format!("field '{key}' must not be null")))
}

fn req_int(key: &str, value: &Value) -> Result<i64, IngestError> {
    opt_int(key, value)?
        .ok_or_else(|| IngestError::Validation(format!("field '{key}' must not be null")))
}

fn opt_string(key: &str, value: &Value) -> Result<Option<String>, IngestError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(IngestError::Validation(format!(
            "field '{key}' must be a string, got {other}"
        ))),
    }
}

fn opt_int(key: &str, value: &Value) -> Result<Option<i64>, IngestError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| {
            IngestError::Validation(format!("field '{key}' must be an integer, got {n}"))
        }),
        other => Err(IngestError::Validation(format!(
            "field '{key}' must be an integer, got {other}"
        ))),
    }
}

fn opt_datetime(key: &str, value: &Value) -> Result<Option<DateTime<Utc>>, IngestError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| {
                IngestError::Validation(format!("field '{key}': bad datetime '{s}': {e}"))
            }),
        other => Err(IngestError::Validation(format!(
            "field '{key}' must be a datetime string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_removes_only_excluded_fields() {
        let mut record = FlatRecord::new();
        record.insert("title".into(), Extracted::Value(json!("t")));
        record.insert("num_poa_versions".into(), Extracted::Excluded);
        record.insert("volume".into(), Extracted::Value(Value::Null));

        let stripped = strip_excluded(record);
        assert_eq!(stripped.len(), 2);
        assert!(!stripped.contains_key("num_poa_versions"));
        assert_eq!(stripped["volume"], Value::Null);
    }

    #[test]
    fn falsy_matches_pipeline_semantics() {
        for v in [json!(null), json!(""), json!(0), json!(false), json!([]), json!({})] {
            assert!(is_falsy(&v), "{v} should be falsy");
        }
        for v in [json!("x"), json!(1), json!(true), json!([0])] {
            assert!(!is_falsy(&v), "{v} should be truthy");
        }
    }

    #[test]
    fn apply_sets_present_fields_and_keeps_missing_ones() {
        let mut article = Article::new("1");
        article.title = Some("old title".into());
        article.num_poa_versions = Some(2);

        let mut fields = FieldMap::new();
        fields.insert("title".into(), json!("new title"));
        fields.insert("current_version".into(), json!(3));
        apply_fields(&mut article, &fields).unwrap();

        assert_eq!(article.title.as_deref(), Some("new title"));
        assert_eq!(article.current_version, 3);
        // absent from the map, so untouched
        assert_eq!(article.num_poa_versions, Some(2));
    }

    #[test]
    fn apply_null_clears_a_field() {
        let mut article = Article::new("1");
        article.impact_statement = Some("dramatic".into());

        let mut fields = FieldMap::new();
        fields.insert("impact_statement".into(), Value::Null);
        apply_fields(&mut article, &fields).unwrap();
        assert_eq!(article.impact_statement, None);
    }

    #[test]
    fn apply_rejects_unknown_field() {
        let mut article = Article::new("1");
        let mut fields = FieldMap::new();
        fields.insert("made_up".into(), json!(1));
        let err = apply_fields(&mut article, &fields).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn apply_rejects_mistyped_field() {
        let mut article = Article::new("1");
        let mut fields = FieldMap::new();
        fields.insert("volume".into(), json!("seven"));
        assert!(apply_fields(&mut article, &fields).is_err());
    }

    #[test]
    fn apply_parses_status_and_datetimes() {
        let mut article = Article::new("1");
        let mut fields = FieldMap::new();
        fields.insert("status".into(), json!("vor"));
        fields.insert("datetime_published".into(), json!("2018-01-05T12:00:00Z"));
        apply_fields(&mut article, &fields).unwrap();

        assert_eq!(article.status, Some(PubStatus::Vor));
        assert_eq!(
            article.datetime_published.unwrap().to_rfc3339(),
            "2018-01-05T12:00:00+00:00"
        );
    }
}
