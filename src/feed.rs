//! Read-only queries for the reporting/feed layer: one article plus its
//! associated children, enough to build a feed entry. No formatting here.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{self, StoreError};
use crate::models::{Author, Subject};

#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    pub msid: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub datetime_published: Option<DateTime<Utc>>,
    pub author_email: Option<String>,
    pub authors: Vec<Author>,
    pub subjects: Vec<Subject>,
}

/// One article with its children, or nothing if the article isn't stored.
pub fn feed_entry(conn: &Connection, msid: &str) -> Result<Option<FeedEntry>, StoreError> {
    let Some(article) = db::get_article(conn, msid)? else {
        return Ok(None);
    };
    Ok(Some(FeedEntry {
        authors: db::authors_for_article(conn, msid)?,
        subjects: db::subjects_for_article(conn, msid)?,
        msid: article.msid,
        doi: article.doi,
        title: article.title,
        abstract_text: article.abstract_text,
        datetime_published: article.datetime_published,
        author_email: article.author_email,
    }))
}

/// The most recently published articles, ready for a feed.
pub fn latest_entries(conn: &Connection, limit: i64) -> Result<Vec<FeedEntry>, StoreError> {
    let mut entries = Vec::new();
    for msid in db::latest_article_msids(conn, limit)? {
        if let Some(entry) = feed_entry(conn, &msid)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::ingest::test_fixtures::ajson;
    use crate::ingest::{ingest_document, regenerate_article};
    use crate::models::enums::DocumentKind;

    #[test]
    fn entry_carries_children() {
        let conn = open_memory_database().unwrap();
        let doc = ajson("9560", 1, "vor", "2018-01-01T00:00:00Z", "2018-01-01T00:00:00Z");
        ingest_document(&conn, "9560", &doc, None).unwrap();

        let entry = feed_entry(&conn, "9560").unwrap().unwrap();
        assert_eq!(entry.doi.as_deref(), Some("10.7554/eLife.09560"));
        assert_eq!(entry.authors.len(), 1);
        assert_eq!(entry.authors[0].name, "Jane Doe");
        assert_eq!(entry.subjects[0].name, "cell-biology");
    }

    #[test]
    fn missing_article_yields_none() {
        let conn = open_memory_database().unwrap();
        assert!(feed_entry(&conn, "404").unwrap().is_none());
    }

    #[test]
    fn latest_entries_newest_first() {
        let mut conn = open_memory_database().unwrap();
        for (msid, date) in [("1", "2018-01-01T00:00:00Z"), ("2", "2018-05-01T00:00:00Z")] {
            let doc = ajson(msid, 1, "vor", date, date);
            db::upsert_raw_document(&conn, msid, 1, DocumentKind::ArticleJson, &doc).unwrap();
            regenerate_article(&mut conn, msid).unwrap();
        }

        let entries = latest_entries(&conn, 10).unwrap();
        let order: Vec<&str> = entries.iter().map(|e| e.msid.as_str()).collect();
        assert_eq!(order, vec!["2", "1"]);
    }
}
