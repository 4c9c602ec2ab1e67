use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A subject classification, shared many-to-many across articles.
/// Natural key: name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub label: Option<String>,
}
