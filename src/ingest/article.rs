//! The article field descriptor: how one raw article-json version
//! flattens into a record, including nested author/subject extraction and
//! the metrics-summary merge.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::derive::{self, VersionView};
use super::descriptor::{
    lookup_path, Agg, Coercion, CustomFn, Descriptor, EvalContext, ExtractError, Stage,
};
use super::value::{Extracted, FlatRecord};
use crate::models::enums::PubStatus;
use crate::models::Article;

pub const JOURNAL_NAME: &str = "elife";
pub const UNKNOWN_TYPE: &str = "unknown-type";

/// "10.7554/eLife.00003" from msid "3"
fn msid_to_doi(_: &EvalContext<'_>, input: Extracted) -> Result<Extracted, String> {
    let Some(v) = input.value() else {
        return Ok(input);
    };
    let msid = match v {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("msid must be an integer: {n}"))?,
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("msid must be an integer: {s:?}"))?,
        other => return Err(format!("msid must be an integer: {other}")),
    };
    if msid <= 0 {
        return Err(format!("msid must be a positive integer: {msid}"));
    }
    Ok(Extracted::Value(json!(format!("10.7554/eLife.{msid:05}"))))
}

/// The first author carrying an email address, or an empty object.
fn find_author(ctx: &EvalContext<'_>, _: Extracted) -> Result<Extracted, String> {
    let author = ctx
        .doc
        .get("authors")
        .and_then(Value::as_array)
        .and_then(|authors| {
            authors
                .iter()
                .find(|a| a.get("emailAddresses").is_some())
                .cloned()
        })
        .unwrap_or_else(|| json!({}));
    Ok(Extracted::Value(author))
}

fn find_author_name(ctx: &EvalContext<'_>, input: Extracted) -> Result<Extracted, String> {
    let Extracted::Value(author) = find_author(ctx, input)? else {
        unreachable!()
    };
    let name = match author.get("name") {
        Some(Value::Object(o)) => o.get("preferred").cloned().unwrap_or(Value::Null),
        Some(other) => other.clone(),
        None => Value::Null,
    };
    Ok(Extracted::Value(name))
}

fn author_desc() -> Descriptor {
    Descriptor {
        fields: vec![
            ("type", vec![Stage::Path { path: "type", default: None }]),
            (
                "name",
                vec![Stage::FirstOf(vec![
                    Stage::Path { path: "name.preferred", default: None },
                    Stage::Path { path: "name", default: Some(Value::Null) },
                ])],
            ),
            (
                "country",
                vec![Stage::Path {
                    path: "affiliations.0.address.components.country",
                    default: Some(Value::Null),
                }],
            ),
        ],
    }
}

fn subject_desc() -> Descriptor {
    Descriptor {
        fields: vec![
            ("name", vec![Stage::Path { path: "id", default: None }]),
            ("label", vec![Stage::Path { path: "name", default: None }]),
        ],
    }
}

pub fn article_desc() -> Descriptor {
    let path = |path: &'static str| Stage::Path { path, default: None };
    let path_or = |path: &'static str, default: Value| Stage::Path {
        path,
        default: Some(default),
    };

    Descriptor {
        fields: vec![
            ("journal_name", vec![Stage::Const(json!(JOURNAL_NAME))]),
            ("msid", vec![path("id"), Stage::Coerce(Coercion::ToString)]),
            ("doi", vec![path("id"), Stage::Custom(msid_to_doi as CustomFn)]),
            ("title", vec![path("title")]),
            ("abstract", vec![path_or("abstract.content.0.text", json!(""))]),
            // at least one paper has no authors at all
            ("author_line", vec![path_or("authorLine", json!("no-author?"))]),
            ("author_name", vec![Stage::Custom(find_author_name as CustomFn)]),
            (
                "author_email",
                vec![
                    Stage::Custom(find_author as CustomFn),
                    path_or("emailAddresses.0", Value::Null),
                ],
            ),
            ("impact_statement", vec![path_or("impactStatement", Value::Null)]),
            ("type", vec![path("type"), Stage::Default(json!(UNKNOWN_TYPE))]),
            ("volume", vec![path("volume"), Stage::Coerce(Coercion::ToInt)]),
            (
                "num_authors",
                vec![path_or("authors", json!([])), Stage::Aggregate(Agg::Len)],
            ),
            (
                "num_references",
                vec![path_or("references", json!([])), Stage::Aggregate(Agg::Len)],
            ),
            ("current_version", vec![path("version"), Stage::Coerce(Coercion::ToInt)]),
            ("status", vec![path("status")]),
            // changes on every single version
            (
                "datetime_version_published",
                vec![path("versionDate"), Stage::Coerce(Coercion::ToDatetime)],
            ),
            ("num_views", vec![path_or("metrics.views", json!(0))]),
            ("num_downloads", vec![path_or("metrics.downloads", json!(0))]),
            // source with the highest number of citations
            (
                "num_citations",
                vec![
                    Stage::AllOf(vec![
                        path_or("metrics.crossref", json!(0)),
                        path_or("metrics.pubmed", json!(0)),
                        path_or("metrics.scopus", json!(0)),
                    ]),
                    Stage::Aggregate(Agg::Max),
                ],
            ),
            (
                "subjects",
                vec![path_or("subjects", json!([])), Stage::Foreach(subject_desc())],
            ),
            (
                "authors",
                vec![
                    path_or("authors", json!([])),
                    Stage::Foreach(author_desc()),
                    Stage::Filter("country"),
                ],
            ),
        ],
    }
}

/// Flatten one version of article-json into a record: declarative
/// extraction first, then the history-derived fields. Metrics summary
/// data, when present, is merged in under `metrics` beforehand.
pub fn flatten_article(
    doc: &Value,
    metrics: Option<&Value>,
    prior: Option<&Article>,
) -> Result<FlatRecord, ExtractError> {
    let mut doc = doc.clone();
    if let (Some(m), Some(obj)) = (metrics, doc.as_object_mut()) {
        obj.insert("metrics".to_string(), m.clone());
    }

    let ctx = EvalContext { doc: &doc, prior };
    let mut record = article_desc().eval(&ctx)?;

    let view = version_view(&record, &doc)?;
    record.extend(derive::derived_fields(&view, prior));
    Ok(record)
}

/// Pull the typed version/status/date slice out of an evaluated record.
fn version_view(record: &FlatRecord, doc: &Value) -> Result<VersionView, ExtractError> {
    let version = record
        .get("current_version")
        .and_then(|e| e.value())
        .and_then(Value::as_i64)
        .ok_or_else(|| ExtractError::Invalid {
            field: "current_version".to_string(),
            reason: "missing or not an integer".to_string(),
        })?;

    let status = record
        .get("status")
        .and_then(|e| e.value())
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractError::Invalid {
            field: "status".to_string(),
            reason: "missing or not a string".to_string(),
        })
        .and_then(|s| {
            PubStatus::from_str(s).map_err(|e| ExtractError::Invalid {
                field: "status".to_string(),
                reason: e.to_string(),
            })
        })?;

    let version_date = record
        .get("datetime_version_published")
        .and_then(|e| e.value())
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ExtractError::Invalid {
            field: "datetime_version_published".to_string(),
            reason: "missing or not a datetime".to_string(),
        })?;

    let published = lookup_path(doc, "published")
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractError::NotFound {
            field: "datetime_published".to_string(),
            path: "published".to_string(),
        })
        .and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ExtractError::Coerce {
                    field: "datetime_published".to_string(),
                    wanted: "datetime",
                    found: s.to_string(),
                })
        })?;

    Ok(VersionView {
        version,
        status,
        published,
        version_date,
    })
}
