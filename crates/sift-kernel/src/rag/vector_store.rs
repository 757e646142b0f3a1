//! VectorStore trait definition
//!
//! Defines the abstract interface for vector storage and similarity search.
//! Concrete backends (in-memory, remote databases) implement it outside the
//! retrieval core.

use crate::error::RagResult;
use crate::rag::options::SearchOptions;
use crate::rag::types::Document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Abstract interface for vector storage and similarity search.
///
/// Stores are shared between concurrently running retrievers, so every
/// operation takes `&self`; implementations synchronize internally.
///
/// # Example
///
/// ```rust,ignore
/// use sift_kernel::rag::{Document, SearchOptions, VectorStore};
///
/// store.add(vec![Document::new("id-1", "Sift is a retrieval core").with_embedding(embedding)]).await?;
///
/// let results = store.search(&query_embedding, &SearchOptions::new(5)).await?;
/// for doc in results {
///     println!("{}: {}", doc.score, doc.content);
/// }
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace documents keyed by id.
    async fn add(&self, documents: Vec<Document>) -> RagResult<()>;

    /// Return up to `options.top_k` documents ranked by similarity to the
    /// query vector (highest first).
    async fn search(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> RagResult<Vec<Document>>;

    /// Delete documents by id, returning how many existed.
    async fn delete(&self, ids: &[String]) -> RagResult<usize>;

    /// Remove every document.
    async fn clear(&self) -> RagResult<()>;

    /// Number of stored documents.
    async fn count(&self) -> RagResult<usize>;
}

/// Similarity metric used for comparing embedding vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity (angle between vectors, -1.0 to 1.0)
    #[default]
    Cosine,
    /// Euclidean distance mapped to `1 / (1 + distance)`
    Euclidean,
    /// Raw dot product
    DotProduct,
}
