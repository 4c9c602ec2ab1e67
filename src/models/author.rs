use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An article author, shared many-to-many across articles.
/// Natural key: (name, author_type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub author_type: String,
    pub country: Option<String>,
}
