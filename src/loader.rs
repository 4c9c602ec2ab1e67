//! Filesystem ingestion of article-json, used for bulk backfills and in
//! tests. Files are loaded in sorted order so version 1 lands before
//! version 2 when files are named sensibly; regeneration replays the
//! stored history in version order regardless.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use rusqlite::Connection;
use serde_json::Value;

use crate::db;
use crate::ingest::{self, BatchReport, IngestError, RegenPolicy};
use crate::models::enums::DocumentKind;

/// Insert/update one raw article-json file. Returns the msid it belongs to.
pub fn load_file(conn: &Connection, path: &Path) -> Result<String, IngestError> {
    tracing::info!(path = %path.display(), "loading article-json");
    let text = fs::read_to_string(path)
        .map_err(|e| IngestError::Unclassified(format!("cannot read {}: {e}", path.display())))?;
    let doc: Value = serde_json::from_str(&text)
        .map_err(|e| IngestError::Validation(format!("bad json in {}: {e}", path.display())))?;

    let msid = doc
        .get("id")
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| IngestError::Validation(format!("{}: document has no id", path.display())))?;
    let version = doc
        .get("version")
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            IngestError::Validation(format!("{}: document has no version", path.display()))
        })?;

    db::upsert_raw_document(conn, &msid, version, DocumentKind::ArticleJson, &doc)?;
    Ok(msid)
}

/// Load a single file or a directory of `.json` files, then regenerate
/// every touched article. Unreadable files in a directory are logged and
/// skipped so one bad file doesn't sink a backfill.
pub fn load_path(
    conn: &mut Connection,
    target: &Path,
    policy: &RegenPolicy,
) -> Result<BatchReport, IngestError> {
    if target.is_file() {
        let msid = load_file(conn, target)?;
        let article = ingest::regenerate_article(conn, &msid)?;
        return Ok(BatchReport {
            committed: vec![article.msid],
            skipped: vec![],
        });
    }

    if !target.is_dir() {
        return Err(IngestError::Unclassified(format!(
            "can't handle path {}",
            target.display()
        )));
    }

    let mut paths: Vec<_> = fs::read_dir(target)
        .map_err(|e| IngestError::Unclassified(format!("cannot read {}: {e}", target.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut msids = BTreeSet::new();
    for path in &paths {
        match load_file(conn, path) {
            Ok(msid) => {
                msids.insert(msid);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping file");
            }
        }
    }

    let msids: Vec<String> = msids.into_iter().collect();
    ingest::regenerate_many(conn, &msids, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::ingest::test_fixtures::ajson;

    fn write_json(dir: &Path, name: &str, doc: &Value) {
        fs::write(dir.join(name), serde_json::to_string(doc).unwrap()).unwrap();
    }

    #[test]
    fn loads_single_file_and_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ajson("9560", 1, "poa", "2018-01-01T00:00:00Z", "2018-01-01T00:00:00Z");
        write_json(dir.path(), "elife-09560-v1.json", &doc);

        let mut conn = open_memory_database().unwrap();
        let report = load_path(
            &mut conn,
            &dir.path().join("elife-09560-v1.json"),
            &RegenPolicy::default(),
        )
        .unwrap();

        assert_eq!(report.committed, vec!["9560"]);
        assert!(db::get_article(&conn, "9560").unwrap().is_some());
    }

    #[test]
    fn loads_directory_across_versions() {
        let dir = tempfile::tempdir().unwrap();
        write_json(
            dir.path(),
            "elife-01000-v1.json",
            &ajson("1000", 1, "poa", "2018-01-01T00:00:00Z", "2018-01-01T00:00:00Z"),
        );
        write_json(
            dir.path(),
            "elife-01000-v2.json",
            &ajson("1000", 2, "vor", "2018-01-01T00:00:00Z", "2018-01-09T00:00:00Z"),
        );
        write_json(
            dir.path(),
            "elife-02000-v1.json",
            &ajson("2000", 1, "vor", "2018-02-01T00:00:00Z", "2018-02-01T00:00:00Z"),
        );

        let mut conn = open_memory_database().unwrap();
        let report = load_path(&mut conn, dir.path(), &RegenPolicy::default()).unwrap();

        assert_eq!(report.committed, vec!["1000", "2000"]);
        let article = db::get_article(&conn, "1000").unwrap().unwrap();
        assert_eq!(article.current_version, 2);
        assert_eq!(article.num_vor_versions, Some(1));
    }

    #[test]
    fn unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("junk.json"), "not json at all").unwrap();
        write_json(
            dir.path(),
            "elife-03000-v1.json",
            &ajson("3000", 1, "poa", "2018-01-01T00:00:00Z", "2018-01-01T00:00:00Z"),
        );

        let mut conn = open_memory_database().unwrap();
        let report = load_path(&mut conn, dir.path(), &RegenPolicy::default()).unwrap();
        assert_eq!(report.committed, vec!["3000"]);
    }

    #[test]
    fn bad_single_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("junk.json"), "not json at all").unwrap();

        let mut conn = open_memory_database().unwrap();
        let err = load_path(&mut conn, &dir.path().join("junk.json"), &RegenPolicy::default())
            .unwrap_err();
        assert!(err.is_validation());
    }
}
