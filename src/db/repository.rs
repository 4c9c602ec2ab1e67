use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::StoreError;
use crate::models::enums::{DocumentKind, PubStatus};
use crate::models::{Article, Author, RawDocument, Subject};

// ═══════════════════════════════════════════
// Raw document store
// ═══════════════════════════════════════════

/// Insert or update one raw JSON document. Last write wins.
pub fn upsert_raw_document(
    conn: &Connection,
    msid: &str,
    version: i64,
    kind: DocumentKind,
    json: &serde_json::Value,
) -> Result<(), StoreError> {
    if kind == DocumentKind::ArticleJson && version < 1 {
        return Err(StoreError::ConstraintViolation(format!(
            "article-json version must be a positive integer, got {version}"
        )));
    }
    conn.execute(
        "INSERT INTO raw_documents (msid, version, kind, json) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (msid, version, kind) DO UPDATE SET json = excluded.json",
        params![msid, version, kind.as_str(), json.to_string()],
    )?;
    Ok(())
}

/// All stored article-json versions for one msid, ascending by version.
pub fn article_versions(conn: &Connection, msid: &str) -> Result<Vec<RawDocument>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT msid, version, kind, json FROM raw_documents
         WHERE msid = ?1 AND kind = ?2 ORDER BY version ASC",
    )?;
    let rows = stmt.query_map(params![msid, DocumentKind::ArticleJson.as_str()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut docs = Vec::new();
    for row in rows {
        let (msid, version, kind, json) = row?;
        docs.push(RawDocument {
            msid,
            version,
            kind: DocumentKind::from_str(&kind)?,
            json: serde_json::from_str(&json)
                .map_err(|e| StoreError::ConstraintViolation(e.to_string()))?,
        });
    }
    Ok(docs)
}

/// The stored metrics summary for one msid, if any.
pub fn metrics_summary(
    conn: &Connection,
    msid: &str,
) -> Result<Option<serde_json::Value>, StoreError> {
    let json: Option<String> = conn
        .query_row(
            "SELECT json FROM raw_documents WHERE msid = ?1 AND kind = ?2",
            params![msid, DocumentKind::MetricsSummary.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match json {
        Some(s) => Ok(Some(serde_json::from_str(&s).map_err(|e| {
            StoreError::ConstraintViolation(e.to_string())
        })?)),
        None => Ok(None),
    }
}

/// Every msid with at least one stored article-json document, ascending.
pub fn known_msids(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT msid FROM raw_documents WHERE kind = ?1
         ORDER BY CAST(msid AS INTEGER) ASC",
    )?;
    let rows = stmt.query_map(params![DocumentKind::ArticleJson.as_str()], |row| {
        row.get::<_, String>(0)
    })?;
    let mut msids = Vec::new();
    for row in rows {
        msids.push(row?);
    }
    Ok(msids)
}

// ═══════════════════════════════════════════
// Article repository
// ═══════════════════════════════════════════

const ARTICLE_COLS: &str = "msid, current_version, status, journal_name, title, doi, abstract,
    author_line, author_name, author_email, impact_statement, article_type, volume,
    num_authors, num_references, num_poa_versions, num_vor_versions,
    datetime_published, datetime_version_published, datetime_poa_published,
    datetime_vor_published, days_publication_to_current_version,
    num_views, num_downloads, num_citations";

pub fn get_article(conn: &Connection, msid: &str) -> Result<Option<Article>, StoreError> {
    let sql = format!("SELECT {ARTICLE_COLS} FROM articles WHERE msid = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let result = stmt.query_row(params![msid], |row| {
        Ok(ArticleRow {
            msid: row.get(0)?,
            current_version: row.get(1)?,
            status: row.get(2)?,
            journal_name: row.get(3)?,
            title: row.get(4)?,
            doi: row.get(5)?,
            abstract_text: row.get(6)?,
            author_line: row.get(7)?,
            author_name: row.get(8)?,
            author_email: row.get(9)?,
            impact_statement: row.get(10)?,
            article_type: row.get(11)?,
            volume: row.get(12)?,
            num_authors: row.get(13)?,
            num_references: row.get(14)?,
            num_poa_versions: row.get(15)?,
            num_vor_versions: row.get(16)?,
            datetime_published: row.get(17)?,
            datetime_version_published: row.get(18)?,
            datetime_poa_published: row.get(19)?,
            datetime_vor_published: row.get(20)?,
            days_publication_to_current_version: row.get(21)?,
            num_views: row.get(22)?,
            num_downloads: row.get(23)?,
            num_citations: row.get(24)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(article_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert or update the full article row. An in-place update rather than
/// delete-and-replace, so child associations survive within a replay.
pub fn save_article(conn: &Connection, article: &Article) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT INTO articles ({ARTICLE_COLS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)
         ON CONFLICT (msid) DO UPDATE SET
            current_version = excluded.current_version,
            status = excluded.status,
            journal_name = excluded.journal_name,
            title = excluded.title,
            doi = excluded.doi,
            abstract = excluded.abstract,
            author_line = excluded.author_line,
            author_name = excluded.author_name,
            author_email = excluded.author_email,
            impact_statement = excluded.impact_statement,
            article_type = excluded.article_type,
            volume = excluded.volume,
            num_authors = excluded.num_authors,
            num_references = excluded.num_references,
            num_poa_versions = excluded.num_poa_versions,
            num_vor_versions = excluded.num_vor_versions,
            datetime_published = excluded.datetime_published,
            datetime_version_published = excluded.datetime_version_published,
            datetime_poa_published = excluded.datetime_poa_published,
            datetime_vor_published = excluded.datetime_vor_published,
            days_publication_to_current_version = excluded.days_publication_to_current_version,
            num_views = excluded.num_views,
            num_downloads = excluded.num_downloads,
            num_citations = excluded.num_citations"
    );
    conn.execute(
        &sql,
        params![
            article.msid,
            article.current_version,
            article.status.map(|s| s.as_str()),
            article.journal_name,
            article.title,
            article.doi,
            article.abstract_text,
            article.author_line,
            article.author_name,
            article.author_email,
            article.impact_statement,
            article.article_type,
            article.volume,
            article.num_authors,
            article.num_references,
            article.num_poa_versions,
            article.num_vor_versions,
            article.datetime_published,
            article.datetime_version_published,
            article.datetime_poa_published,
            article.datetime_vor_published,
            article.days_publication_to_current_version,
            article.num_views,
            article.num_downloads,
            article.num_citations,
        ],
    )?;
    Ok(())
}

/// Delete an article row. Associations cascade; authors and subjects
/// themselves are shared and stay.
pub fn delete_article(conn: &Connection, msid: &str) -> Result<(), StoreError> {
    conn.execute("DELETE FROM articles WHERE msid = ?1", params![msid])?;
    Ok(())
}

/// msids of stored articles, most recently published first.
pub fn latest_article_msids(conn: &Connection, limit: i64) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT msid FROM articles WHERE datetime_published IS NOT NULL
         ORDER BY datetime_published DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;
    let mut msids = Vec::new();
    for row in rows {
        msids.push(row?);
    }
    Ok(msids)
}

// Internal row type for Article mapping
struct ArticleRow {
    msid: String,
    current_version: i64,
    status: Option<String>,
    journal_name: Option<String>,
    title: Option<String>,
    doi: Option<String>,
    abstract_text: Option<String>,
    author_line: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
    impact_statement: Option<String>,
    article_type: Option<String>,
    volume: Option<i64>,
    num_authors: Option<i64>,
    num_references: Option<i64>,
    num_poa_versions: Option<i64>,
    num_vor_versions: Option<i64>,
    datetime_published: Option<DateTime<Utc>>,
    datetime_version_published: Option<DateTime<Utc>>,
    datetime_poa_published: Option<DateTime<Utc>>,
    datetime_vor_published: Option<DateTime<Utc>>,
    days_publication_to_current_version: Option<i64>,
    num_views: Option<i64>,
    num_downloads: Option<i64>,
    num_citations: Option<i64>,
}

fn article_from_row(row: ArticleRow) -> Result<Article, StoreError> {
    Ok(Article {
        msid: row.msid,
        current_version: row.current_version,
        status: row.status.as_deref().map(PubStatus::from_str).transpose()?,
        journal_name: row.journal_name,
        title: row.title,
        doi: row.doi,
        abstract_text: row.abstract_text,
        author_line: row.author_line,
        author_name: row.author_name,
        author_email: row.author_email,
        impact_statement: row.impact_statement,
        article_type: row.article_type,
        volume: row.volume,
        num_authors: row.num_authors,
        num_references: row.num_references,
        num_poa_versions: row.num_poa_versions,
        num_vor_versions: row.num_vor_versions,
        datetime_published: row.datetime_published,
        datetime_version_published: row.datetime_version_published,
        datetime_poa_published: row.datetime_poa_published,
        datetime_vor_published: row.datetime_vor_published,
        days_publication_to_current_version: row.days_publication_to_current_version,
        num_views: row.num_views,
        num_downloads: row.num_downloads,
        num_citations: row.num_citations,
    })
}

// ═══════════════════════════════════════════
// Author / Subject repositories
// ═══════════════════════════════════════════

/// Insert-or-reuse an author by natural key (name, author_type).
/// A provided country refreshes the stored one.
pub fn upsert_author(
    conn: &Connection,
    name: &str,
    author_type: &str,
    country: Option<&str>,
) -> Result<Uuid, StoreError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM authors WHERE name = ?1 AND author_type = ?2",
            params![name, author_type],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        if country.is_some() {
            conn.execute(
                "UPDATE authors SET country = ?1 WHERE id = ?2",
                params![country, id],
            )?;
        }
        return Uuid::parse_str(&id).map_err(|e| StoreError::ConstraintViolation(e.to_string()));
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO authors (id, name, author_type, country) VALUES (?1, ?2, ?3, ?4)",
        params![id.to_string(), name, author_type, country],
    )?;
    Ok(id)
}

/// Insert-or-reuse a subject by natural key (name).
pub fn upsert_subject(
    conn: &Connection,
    name: &str,
    label: Option<&str>,
) -> Result<Uuid, StoreError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM subjects WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        if label.is_some() {
            conn.execute(
                "UPDATE subjects SET label = ?1 WHERE id = ?2",
                params![label, id],
            )?;
        }
        return Uuid::parse_str(&id).map_err(|e| StoreError::ConstraintViolation(e.to_string()));
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO subjects (id, name, label) VALUES (?1, ?2, ?3)",
        params![id.to_string(), name, label],
    )?;
    Ok(id)
}

/// Associate an author with an article. Additive: duplicates are ignored.
pub fn link_author(conn: &Connection, msid: &str, author_id: &Uuid) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO article_authors (article_msid, author_id) VALUES (?1, ?2)",
        params![msid, author_id.to_string()],
    )?;
    Ok(())
}

/// Associate a subject with an article. Additive: duplicates are ignored.
pub fn link_subject(conn: &Connection, msid: &str, subject_id: &Uuid) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO article_subjects (article_msid, subject_id) VALUES (?1, ?2)",
        params![msid, subject_id.to_string()],
    )?;
    Ok(())
}

pub fn authors_for_article(conn: &Connection, msid: &str) -> Result<Vec<Author>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.name, a.author_type, a.country
         FROM authors a
         JOIN article_authors aa ON aa.author_id = a.id
         WHERE aa.article_msid = ?1
         ORDER BY aa.rowid ASC",
    )?;
    let rows = stmt.query_map(params![msid], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut authors = Vec::new();
    for row in rows {
        let (id, name, author_type, country) = row?;
        authors.push(Author {
            id: Uuid::parse_str(&id).map_err(|e| StoreError::ConstraintViolation(e.to_string()))?,
            name,
            author_type,
            country,
        });
    }
    Ok(authors)
}

pub fn subjects_for_article(conn: &Connection, msid: &str) -> Result<Vec<Subject>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.label
         FROM subjects s
         JOIN article_subjects sa ON sa.subject_id = s.id
         WHERE sa.article_msid = ?1
         ORDER BY sa.rowid ASC",
    )?;
    let rows = stmt.query_map(params![msid], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut subjects = Vec::new();
    for row in rows {
        let (id, name, label) = row?;
        subjects.push(Subject {
            id: Uuid::parse_str(&id).map_err(|e| StoreError::ConstraintViolation(e.to_string()))?,
            name,
            label,
        });
    }
    Ok(subjects)
}
