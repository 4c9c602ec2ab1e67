//! History-derived fields.
//!
//! Each function computes one field from the current version plus the
//! previously committed article, and yields the exclusion sentinel when
//! the field cannot be recomputed from that context. These are only
//! correct under strictly ordered replay (see `guard`).
//!
//! Per-article state machine: absent -> poa -> vor, driven by each
//! version's observed status. Only version 1 may leave `absent`. An
//! unexpected transition degrades the affected field to the sentinel
//! instead of aborting the ingest.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::value::{Extracted, FlatRecord};
use crate::models::enums::PubStatus;
use crate::models::Article;

/// The typed slice of one document version that derivation needs.
#[derive(Debug, Clone)]
pub struct VersionView {
    pub version: i64,
    pub status: PubStatus,
    /// The v1 publication date; identical across versions in source data.
    pub published: DateTime<Utc>,
    /// When this particular version went live.
    pub version_date: DateTime<Utc>,
}

/// Compute every derived field for one version and add it to the record.
pub fn derived_fields(view: &VersionView, prior: Option<&Article>) -> FlatRecord {
    let mut record = FlatRecord::new();
    record.insert("num_poa_versions".into(), num_poa_versions(view));
    record.insert("num_vor_versions".into(), num_vor_versions(view, prior));
    record.insert("datetime_published".into(), datetime_published(view));
    record.insert(
        "days_publication_to_current_version".into(),
        days_publication_to_current_version(view, prior),
    );
    record.insert(
        "datetime_poa_published".into(),
        transition_date(view, prior, PubStatus::Poa),
    );
    record.insert(
        "datetime_vor_published".into(),
        transition_date(view, prior, PubStatus::Vor),
    );
    record
}

/// How many poa versions exist once this version lands. While the article
/// is still poa that is the version number itself; a v1 that went straight
/// to vor pins it at zero; any later vor version can't tell and defers to
/// the stored count.
pub fn num_poa_versions(view: &VersionView) -> Extracted {
    if view.status == PubStatus::Poa {
        Extracted::Value(json!(view.version))
    } else if view.version == 1 {
        Extracted::Value(json!(0))
    } else {
        Extracted::Excluded
    }
}

/// How many vor versions exist once this version lands: total versions
/// minus the stored poa count. Needs the stored count for v2+.
pub fn num_vor_versions(view: &VersionView, prior: Option<&Article>) -> Extracted {
    if view.status != PubStatus::Vor {
        return Extracted::Excluded;
    }
    if view.version == 1 {
        return Extracted::Value(json!(1));
    }
    match prior.and_then(|p| p.num_poa_versions) {
        // a poa count above the version number means the history is
        // inconsistent; degrade rather than store a negative count
        Some(poa_count) if poa_count <= view.version => {
            Extracted::Value(json!(view.version - poa_count))
        }
        _ => Extracted::Excluded,
    }
}

/// The immutable v1 publication date. Only v1 may set it; later versions
/// must never overwrite it.
pub fn datetime_published(view: &VersionView) -> Extracted {
    if view.version == 1 {
        Extracted::Value(json!(view.published.to_rfc3339()))
    } else {
        Extracted::Excluded
    }
}

/// Days from first publication to this version going live. Zero when no
/// article is stored yet (this is the bootstrap version).
pub fn days_publication_to_current_version(
    view: &VersionView,
    prior: Option<&Article>,
) -> Extracted {
    let Some(prior) = prior else {
        return Extracted::Value(json!(0));
    };
    match prior.datetime_published {
        Some(v1_published) => {
            Extracted::Value(json!((view.version_date - v1_published).num_days()))
        }
        None => Extracted::Excluded,
    }
}

/// The date the article entered the given status: v1 arriving directly in
/// it, or a later version switching into it. Any other version leaves the
/// stored date alone.
pub fn transition_date(view: &VersionView, prior: Option<&Article>, status: PubStatus) -> Extracted {
    if view.status != status {
        return Extracted::Excluded;
    }
    let entered = match prior {
        None => view.version == 1,
        Some(p) => p.status != Some(status),
    };
    if entered {
        Extracted::Value(Value::String(view.version_date.to_rfc3339()))
    } else {
        Extracted::Excluded
    }
}
