pub mod article;
pub mod author;
pub mod enums;
pub mod raw_document;
pub mod subject;

pub use article::Article;
pub use author::Author;
pub use enums::{DocumentKind, PubStatus};
pub use raw_document::RawDocument;
pub use subject::Subject;
