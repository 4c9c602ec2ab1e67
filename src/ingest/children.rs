//! Splitting child collections out of a flattened record.
//!
//! Authors and subjects are extracted as independent upsert specs keyed
//! by their natural key; the record they came from keeps only scalar
//! fields. Re-extracting identical input yields identical keys.

use serde_json::Value;

use super::value::FieldMap;
use super::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Author,
    Subject,
}

impl ChildKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildKind::Author => "authors",
            ChildKind::Subject => "subjects",
        }
    }
}

/// One child row ready for upsert-by-natural-key.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildSpec {
    Author {
        name: String,
        author_type: String,
        country: Option<String>,
    },
    Subject {
        name: String,
        label: Option<String>,
    },
}

impl ChildSpec {
    /// The natural dedup key. Byte-identical input gives byte-identical keys.
    pub fn natural_key(&self) -> String {
        match self {
            ChildSpec::Author { name, author_type, .. } => format!("{name}\u{1f}{author_type}"),
            ChildSpec::Subject { name, .. } => name.clone(),
        }
    }
}

/// Remove the known child collections from a record and return them as
/// upsert specs. Rows with no usable natural key are dropped with a
/// warning rather than failing the whole version.
pub fn extract_children(record: &mut FieldMap) -> Result<Vec<ChildSpec>, IngestError> {
    let mut specs = Vec::new();

    for kind in [ChildKind::Author, ChildKind::Subject] {
        let Some(rows) = record.remove(kind.as_str()) else {
            continue;
        };
        let Value::Array(rows) = rows else {
            return Err(IngestError::Validation(format!(
                "'{}' must be a list, got {rows}",
                kind.as_str()
            )));
        };
        for row in rows {
            let Value::Object(row) = row else {
                return Err(IngestError::Validation(format!(
                    "'{}' elements must be objects, got {row}",
                    kind.as_str()
                )));
            };
            match build_spec(kind, &row)? {
                Some(spec) => specs.push(spec),
                None => {
                    tracing::warn!(kind = kind.as_str(), "child row without a name, dropping");
                }
            }
        }
    }

    Ok(specs)
}

fn build_spec(
    kind: ChildKind,
    row: &serde_json::Map<String, Value>,
) -> Result<Option<ChildSpec>, IngestError> {
    let field = |key: &str| -> Result<Option<String>, IngestError> {
        match row.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(IngestError::Validation(format!(
                "child field '{key}' must be a string, got {other}"
            ))),
        }
    };

    match kind {
        ChildKind::Author => {
            let Some(name) = field("name")? else {
                return Ok(None);
            };
            Ok(Some(ChildSpec::Author {
                name,
                author_type: field("type")?.unwrap_or_else(|| "person".to_string()),
                country: field("country")?,
            }))
        }
        ChildKind::Subject => {
            let Some(name) = field("name")? else {
                return Ok(None);
            };
            Ok(Some(ChildSpec::Subject {
                name,
                label: field("label")?,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_with_children() -> FieldMap {
        let mut record = FieldMap::new();
        record.insert("title".into(), json!("t"));
        record.insert(
            "authors".into(),
            json!([{"name": "Jane Doe", "type": "person", "country": "BE"}]),
        );
        record.insert(
            "subjects".into(),
            json!([{"name": "ecology", "label": "Ecology"}]),
        );
        record
    }

    #[test]
    fn splits_children_from_record() {
        let mut record = record_with_children();
        let specs = extract_children(&mut record).unwrap();

        assert!(!record.contains_key("authors"));
        assert!(!record.contains_key("subjects"));
        assert!(record.contains_key("title"));
        assert_eq!(
            specs,
            vec![
                ChildSpec::Author {
                    name: "Jane Doe".into(),
                    author_type: "person".into(),
                    country: Some("BE".into()),
                },
                ChildSpec::Subject {
                    name: "ecology".into(),
                    label: Some("Ecology".into()),
                },
            ]
        );
    }

    #[test]
    fn identical_input_gives_identical_keys() {
        let mut a = record_with_children();
        let mut b = record_with_children();
        let keys_a: Vec<String> = extract_children(&mut a)
            .unwrap()
            .iter()
            .map(ChildSpec::natural_key)
            .collect();
        let keys_b: Vec<String> = extract_children(&mut b)
            .unwrap()
            .iter()
            .map(ChildSpec::natural_key)
            .collect();
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn author_key_includes_type() {
        let person = ChildSpec::Author {
            name: "Jane Doe".into(),
            author_type: "person".into(),
            country: None,
        };
        let group = ChildSpec::Author {
            name: "Jane Doe".into(),
            author_type: "group".into(),
            country: None,
        };
        assert_ne!(person.natural_key(), group.natural_key());
    }

    #[test]
    fn record_without_children_yields_nothing() {
        let mut record = FieldMap::new();
        record.insert("title".into(), json!("t"));
        assert!(extract_children(&mut record).unwrap().is_empty());
    }

    #[test]
    fn nameless_rows_are_dropped_not_fatal() {
        let mut record = FieldMap::new();
        record.insert("authors".into(), json!([{"type": "person", "name": null}]));
        let specs = extract_children(&mut record).unwrap();
        assert!(specs.is_empty());
    }

    #[test]
    fn non_list_children_are_invalid() {
        let mut record = FieldMap::new();
        record.insert("authors".into(), json!("nope"));
        assert!(extract_children(&mut record).is_err());
    }
}
