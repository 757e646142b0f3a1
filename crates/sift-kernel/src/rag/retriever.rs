//! Retrieval contracts

use crate::error::RagResult;
use crate::rag::options::RetrieveOptions;
use crate::rag::types::Document;
use async_trait::async_trait;

/// The single capability every retrieval strategy exposes.
///
/// Results are ranked by descending score and never exceed
/// `options.top_k`. Strategies compose by holding other retrievers.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>>;
}

/// Reorders (and may filter or rescore) candidate documents for a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, documents: Vec<Document>) -> RagResult<Vec<Document>>;
}
