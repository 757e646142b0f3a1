//! Document splitting contract

use crate::error::RagResult;
use crate::rag::types::Document;
use async_trait::async_trait;

/// Splits documents into smaller fragments.
///
/// Output fragments inherit whatever metadata the implementation chooses;
/// callers assign their own identifiers and parent links.
#[async_trait]
pub trait Splitter: Send + Sync {
    async fn split(&self, documents: Vec<Document>) -> RagResult<Vec<Document>>;
}
