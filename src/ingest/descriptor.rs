//! Declarative field extraction.
//!
//! A descriptor maps each output field to an ordered stage pipeline. The
//! first stage receives the whole source document; every later stage
//! consumes the previous stage's output. One dispatch loop evaluates the
//! closed set of stage kinds, so there is no ad-hoc function composition
//! to chase through.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use super::value::{is_falsy, Extracted, FlatRecord};
use crate::models::Article;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("field '{field}': nothing found at path '{path}'")]
    NotFound { field: String, path: String },

    #[error("field '{field}': cannot coerce {found} to {wanted}")]
    Coerce {
        field: String,
        wanted: &'static str,
        found: String,
    },

    #[error("field '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

/// Everything a stage may consult. Stages stay pure: the previously
/// committed article is handed in, never fetched.
pub struct EvalContext<'a> {
    pub doc: &'a Value,
    pub prior: Option<&'a Article>,
}

/// Signature for `Stage::Custom`. Errors are plain reasons; the evaluator
/// attaches the field name.
pub type CustomFn = fn(&EvalContext<'_>, Extracted) -> Result<Extracted, String>;

pub enum Stage {
    /// A literal, ignoring the input.
    Const(Value),
    /// Dotted-path lookup into the input; integer segments index arrays.
    /// A missing path without a default is an error.
    Path {
        path: &'static str,
        default: Option<Value>,
    },
    /// First sub-stage that succeeds wins; if all fail, the last error
    /// is the pipeline's error.
    FirstOf(Vec<Stage>),
    /// Replaces a falsy input.
    Default(Value),
    Coerce(Coercion),
    /// Evaluates each sub-stage against the same input and collects the
    /// results into a list (feeds an aggregation).
    AllOf(Vec<Stage>),
    Aggregate(Agg),
    /// Applies a nested descriptor to each element of a list input.
    Foreach(Descriptor),
    /// Keeps list elements whose named key is present and non-null.
    Filter(&'static str),
    Custom(CustomFn),
}

pub enum Coercion {
    ToInt,
    ToString,
    /// Parses an RFC3339 datetime and re-emits it normalized to UTC.
    ToDatetime,
}

pub enum Agg {
    Len,
    Max,
}

pub struct Descriptor {
    pub fields: Vec<(&'static str, Vec<Stage>)>,
}

impl Descriptor {
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<FlatRecord, ExtractError> {
        let mut record = FlatRecord::new();
        for (field, stages) in &self.fields {
            let mut current = Extracted::Value(ctx.doc.clone());
            for stage in stages {
                current = apply_stage(field, stage, current, ctx)?;
            }
            record.insert((*field).to_string(), current);
        }
        Ok(record)
    }
}

fn apply_stage(
    field: &str,
    stage: &Stage,
    input: Extracted,
    ctx: &EvalContext<'_>,
) -> Result<Extracted, ExtractError> {
    // the sentinel flows through untouched; only a custom stage may see it
    if input.is_excluded() && !matches!(stage, Stage::Custom(_)) {
        return Ok(input);
    }

    match stage {
        Stage::Const(v) => Ok(Extracted::Value(v.clone())),

        Stage::Path { path, default } => {
            let Extracted::Value(v) = input else {
                unreachable!()
            };
            match lookup_path(&v, path) {
                Some(found) => Ok(Extracted::Value(found.clone())),
                None => match default {
                    Some(d) => Ok(Extracted::Value(d.clone())),
                    None => Err(ExtractError::NotFound {
                        field: field.to_string(),
                        path: path.to_string(),
                    }),
                },
            }
        }

        Stage::FirstOf(stages) => {
            let mut last_err = ExtractError::Invalid {
                field: field.to_string(),
                reason: "FirstOf with no alternatives".to_string(),
            };
            for alt in stages {
                match apply_stage(field, alt, input.clone(), ctx) {
                    Ok(v) => return Ok(v),
                    Err(e) => last_err = e,
                }
            }
            Err(last_err)
        }

        Stage::Default(v) => {
            let Extracted::Value(cur) = input else {
                unreachable!()
            };
            if is_falsy(&cur) {
                Ok(Extracted::Value(v.clone()))
            } else {
                Ok(Extracted::Value(cur))
            }
        }

        Stage::Coerce(c) => {
            let Extracted::Value(cur) = input else {
                unreachable!()
            };
            coerce(field, c, cur).map(Extracted::Value)
        }

        Stage::AllOf(stages) => {
            let mut collected = Vec::with_capacity(stages.len());
            for sub in stages {
                match apply_stage(field, sub, input.clone(), ctx)? {
                    Extracted::Value(v) => collected.push(v),
                    Extracted::Excluded => {
                        return Err(ExtractError::Invalid {
                            field: field.to_string(),
                            reason: "exclusion sentinel inside AllOf".to_string(),
                        })
                    }
                }
            }
            Ok(Extracted::Value(Value::Array(collected)))
        }

        Stage::Aggregate(agg) => {
            let Extracted::Value(cur) = input else {
                unreachable!()
            };
            aggregate(field, agg, &cur).map(Extracted::Value)
        }

        Stage::Foreach(desc) => {
            let Extracted::Value(cur) = input else {
                unreachable!()
            };
            let Value::Array(items) = cur else {
                return Err(ExtractError::Coerce {
                    field: field.to_string(),
                    wanted: "list",
                    found: type_name(&cur).to_string(),
                });
            };
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                let sub_ctx = EvalContext {
                    doc: item,
                    prior: ctx.prior,
                };
                let sub = desc.eval(&sub_ctx)?;
                let mut obj = serde_json::Map::new();
                for (k, v) in sub {
                    match v {
                        Extracted::Value(v) => {
                            obj.insert(k, v);
                        }
                        Extracted::Excluded => {
                            return Err(ExtractError::Invalid {
                                field: field.to_string(),
                                reason: format!("exclusion sentinel in nested field '{k}'"),
                            })
                        }
                    }
                }
                out.push(Value::Object(obj));
            }
            Ok(Extracted::Value(Value::Array(out)))
        }

        Stage::Filter(key) => {
            let Extracted::Value(cur) = input else {
                unreachable!()
            };
            let Value::Array(items) = cur else {
                return Err(ExtractError::Coerce {
                    field: field.to_string(),
                    wanted: "list",
                    found: type_name(&cur).to_string(),
                });
            };
            let kept = items
                .into_iter()
                .filter(|item| matches!(item.get(*key), Some(v) if !v.is_null()))
                .collect();
            Ok(Extracted::Value(Value::Array(kept)))
        }

        Stage::Custom(f) => f(ctx, input).map_err(|reason| ExtractError::Invalid {
            field: field.to_string(),
            reason,
        }),
    }
}

/// Dotted-path lookup: `abstract.content.0.text` descends objects by key
/// and arrays by index.
pub fn lookup_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(o) => o.get(segment)?,
            Value::Array(a) => a.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn coerce(field: &str, coercion: &Coercion, value: Value) -> Result<Value, ExtractError> {
    // null carries through every coercion, like the sentinel does
    if value.is_null() {
        return Ok(value);
    }
    match coercion {
        Coercion::ToInt => match &value {
            Value::Number(n) if n.as_i64().is_some() => Ok(value),
            Value::String(s) => s.parse::<i64>().map(Value::from).map_err(|_| {
                ExtractError::Coerce {
                    field: field.to_string(),
                    wanted: "integer",
                    found: format!("{value}"),
                }
            }),
            _ => Err(ExtractError::Coerce {
                field: field.to_string(),
                wanted: "integer",
                found: format!("{value}"),
            }),
        },
        Coercion::ToString => match &value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err(ExtractError::Coerce {
                field: field.to_string(),
                wanted: "string",
                found: format!("{value}"),
            }),
        },
        Coercion::ToDatetime => match &value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::String(dt.with_timezone(&Utc).to_rfc3339()))
                .map_err(|_| ExtractError::Coerce {
                    field: field.to_string(),
                    wanted: "datetime",
                    found: format!("{value}"),
                }),
            _ => Err(ExtractError::Coerce {
                field: field.to_string(),
                wanted: "datetime",
                found: format!("{value}"),
            }),
        },
    }
}

fn aggregate(field: &str, agg: &Agg, value: &Value) -> Result<Value, ExtractError> {
    let Value::Array(items) = value else {
        return Err(ExtractError::Coerce {
            field: field.to_string(),
            wanted: "list",
            found: type_name(value).to_string(),
        });
    };
    match agg {
        Agg::Len => Ok(Value::from(items.len() as i64)),
        Agg::Max => {
            let mut max: Option<i64> = None;
            for item in items {
                let n = item.as_i64().ok_or_else(|| ExtractError::Coerce {
                    field: field.to_string(),
                    wanted: "integer",
                    found: format!("{item}"),
                })?;
                max = Some(max.map_or(n, |m| m.max(n)));
            }
            max.map(Value::from).ok_or_else(|| ExtractError::Invalid {
                field: field.to_string(),
                reason: "max over an empty list".to_string(),
            })
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(doc: &Value) -> EvalContext<'_> {
        EvalContext { doc, prior: None }
    }

    fn eval_one(stages: Vec<Stage>, doc: &Value) -> Result<Extracted, ExtractError> {
        let desc = Descriptor {
            fields: vec![("out", stages)],
        };
        let mut record = desc.eval(&ctx(doc))?;
        Ok(record.remove("out").unwrap())
    }

    #[test]
    fn path_descends_objects_and_arrays() {
        let doc = json!({"abstract": {"content": [{"text": "hi"}]}});
        let out = eval_one(
            vec![Stage::Path {
                path: "abstract.content.0.text",
                default: None,
            }],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!("hi")));
    }

    #[test]
    fn missing_path_without_default_names_field_and_path() {
        let doc = json!({});
        let err = eval_one(vec![Stage::Path { path: "title", default: None }], &doc).unwrap_err();
        match err {
            ExtractError::NotFound { field, path } => {
                assert_eq!(field, "out");
                assert_eq!(path, "title");
            }
            other => panic!("expected NotFound, got {other}"),
        }
    }

    #[test]
    fn missing_path_with_default_uses_default() {
        let doc = json!({});
        let out = eval_one(
            vec![Stage::Path {
                path: "authorLine",
                default: Some(json!("no-author?")),
            }],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!("no-author?")));
    }

    #[test]
    fn first_of_returns_first_success() {
        let doc = json!({"name": {"preferred": "Jane"}});
        let out = eval_one(
            vec![Stage::FirstOf(vec![
                Stage::Path { path: "name.preferred", default: None },
                Stage::Path { path: "name", default: Some(Value::Null) },
            ])],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!("Jane")));
    }

    #[test]
    fn first_of_surfaces_last_error_when_all_fail() {
        let doc = json!({});
        let err = eval_one(
            vec![Stage::FirstOf(vec![
                Stage::Path { path: "a", default: None },
                Stage::Path { path: "b", default: None },
            ])],
            &doc,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { path, .. } if path == "b"));
    }

    #[test]
    fn default_replaces_falsy_only() {
        let doc = json!({"type": ""});
        let out = eval_one(
            vec![
                Stage::Path { path: "type", default: None },
                Stage::Default(json!("unknown-type")),
            ],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!("unknown-type")));

        let doc = json!({"type": "research-article"});
        let out = eval_one(
            vec![
                Stage::Path { path: "type", default: None },
                Stage::Default(json!("unknown-type")),
            ],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!("research-article")));
    }

    #[test]
    fn coerce_passes_sentinel_through() {
        let doc = json!({});
        let out = eval_one(
            vec![
                Stage::Custom(|_, _| Ok(Extracted::Excluded)),
                Stage::Coerce(Coercion::ToDatetime),
            ],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Excluded);
    }

    #[test]
    fn coerce_normalizes_datetimes_to_utc() {
        let doc = json!({"published": "2018-01-01T14:00:00+02:00"});
        let out = eval_one(
            vec![
                Stage::Path { path: "published", default: None },
                Stage::Coerce(Coercion::ToDatetime),
            ],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!("2018-01-01T12:00:00+00:00")));
    }

    #[test]
    fn coerce_int_rejects_garbage() {
        let doc = json!({"volume": "seven"});
        let err = eval_one(
            vec![
                Stage::Path { path: "volume", default: None },
                Stage::Coerce(Coercion::ToInt),
            ],
            &doc,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::Coerce { wanted: "integer", .. }));
    }

    #[test]
    fn all_of_plus_max_picks_highest() {
        let doc = json!({"metrics": {"crossref": 3, "pubmed": 11, "scopus": 7}});
        let out = eval_one(
            vec![
                Stage::AllOf(vec![
                    Stage::Path { path: "metrics.crossref", default: Some(json!(0)) },
                    Stage::Path { path: "metrics.pubmed", default: Some(json!(0)) },
                    Stage::Path { path: "metrics.scopus", default: Some(json!(0)) },
                ]),
                Stage::Aggregate(Agg::Max),
            ],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!(11)));
    }

    #[test]
    fn aggregate_len_counts_list() {
        let doc = json!({"authors": [{}, {}, {}]});
        let out = eval_one(
            vec![
                Stage::Path { path: "authors", default: Some(json!([])) },
                Stage::Aggregate(Agg::Len),
            ],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!(3)));
    }

    #[test]
    fn foreach_renders_each_element() {
        let doc = json!({"subjects": [
            {"id": "cell-biology", "name": "Cell Biology"},
            {"id": "ecology", "name": "Ecology"},
        ]});
        let sub = Descriptor {
            fields: vec![
                ("name", vec![Stage::Path { path: "id", default: None }]),
                ("label", vec![Stage::Path { path: "name", default: None }]),
            ],
        };
        let out = eval_one(
            vec![
                Stage::Path { path: "subjects", default: Some(json!([])) },
                Stage::Foreach(sub),
            ],
            &doc,
        )
        .unwrap();
        assert_eq!(
            out,
            Extracted::Value(json!([
                {"name": "cell-biology", "label": "Cell Biology"},
                {"name": "ecology", "label": "Ecology"},
            ]))
        );
    }

    #[test]
    fn filter_drops_elements_missing_key() {
        let doc = json!({"authors": [
            {"name": "a", "country": "BE"},
            {"name": "b", "country": null},
            {"name": "c"},
        ]});
        let out = eval_one(
            vec![
                Stage::Path { path: "authors", default: None },
                Stage::Filter("country"),
            ],
            &doc,
        )
        .unwrap();
        assert_eq!(out, Extracted::Value(json!([{"name": "a", "country": "BE"}])));
    }
}
