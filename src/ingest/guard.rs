//! Version ordering checks.
//!
//! Several derived fields are only correct when versions are applied in
//! strictly ascending order against the previously committed state, so
//! every persist is preceded by this check. A violation here means the
//! running counters would silently corrupt.

use super::IngestError;
use crate::models::Article;

/// Reject out-of-order ingestion: a version older than the stored one is
/// a stale write, and an article can only bootstrap at version 1.
/// Re-applying the stored version is allowed (last write wins).
pub fn check_version_order(
    msid: &str,
    incoming: i64,
    stored: Option<&Article>,
) -> Result<(), IngestError> {
    if incoming < 1 {
        return Err(IngestError::State(format!(
            "article {msid}: version must be positive, got {incoming}"
        )));
    }
    match stored {
        None if incoming != 1 => Err(IngestError::State(format!(
            "article {msid}: version {incoming} arrived before version 1 was stored"
        ))),
        Some(article) if incoming < article.current_version => Err(IngestError::State(format!(
            "article {msid}: stale write, version {incoming} is older than stored version {}",
            article.current_version
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_at(version: i64) -> Article {
        let mut article = Article::new("1");
        article.current_version = version;
        article
    }

    #[test]
    fn v1_bootstraps_fresh_article() {
        assert!(check_version_order("1", 1, None).is_ok());
    }

    #[test]
    fn v2_without_stored_article_is_rejected() {
        let err = check_version_order("1", 2, None).unwrap_err();
        assert!(matches!(err, IngestError::State(_)));
    }

    #[test]
    fn stale_version_is_rejected() {
        let stored = stored_at(3);
        let err = check_version_order("1", 2, Some(&stored)).unwrap_err();
        assert!(matches!(err, IngestError::State(_)));
    }

    #[test]
    fn same_version_reapplies() {
        let stored = stored_at(2);
        assert!(check_version_order("1", 2, Some(&stored)).is_ok());
    }

    #[test]
    fn next_version_advances() {
        let stored = stored_at(2);
        assert!(check_version_order("1", 3, Some(&stored)).is_ok());
    }

    #[test]
    fn nonpositive_version_is_rejected() {
        assert!(check_version_order("1", 0, None).is_err());
    }
}
