//! In-memory vector store implementation
//!
//! Provides a simple brute-force vector store backed by a HashMap.
//! Suitable for development, testing, and small datasets.

use crate::rag::fusion::sort_by_score;
use crate::rag::similarity::compute_similarity;
use async_trait::async_trait;
use parking_lot::RwLock;
use sift_kernel::RagResult;
use sift_kernel::rag::{Document, SearchOptions, SimilarityMetric, VectorStore};
use std::collections::HashMap;

/// In-memory vector store using brute-force similarity search.
///
/// Stores all documents in a HashMap and computes similarity against every
/// stored vector on each search. Documents without an embedding are kept
/// but never returned by `search`.
///
/// # Example
///
/// ```rust,ignore
/// use sift_foundation::rag::InMemoryVectorStore;
/// use sift_kernel::rag::{Document, SearchOptions, VectorStore};
///
/// let store = InMemoryVectorStore::cosine();
/// store.add(vec![Document::new("doc-1", "Hello world").with_embedding(vec![0.1, 0.2, 0.3])]).await?;
///
/// let results = store.search(&[0.1, 0.2, 0.3], &SearchOptions::new(5)).await?;
/// ```
pub struct InMemoryVectorStore {
    documents: RwLock<HashMap<String, Document>>,
    metric: SimilarityMetric,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store with the given similarity metric.
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            metric,
        }
    }

    /// Create a new store using cosine similarity (the most common default).
    pub fn cosine() -> Self {
        Self::new(SimilarityMetric::Cosine)
    }

    pub fn similarity_metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Fetch a stored document by id.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.documents.read().get(id).cloned()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::cosine()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, documents: Vec<Document>) -> RagResult<()> {
        let mut guard = self.documents.write();
        for doc in documents {
            guard.insert(doc.id.clone(), doc);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> RagResult<Vec<Document>> {
        let mut scored: Vec<Document> = {
            let guard = self.documents.read();
            guard
                .values()
                .filter(|doc| {
                    options
                        .filter
                        .as_ref()
                        .is_none_or(|filter| doc.matches_filter(filter))
                })
                .filter_map(|doc| {
                    let embedding = doc.embedding.as_ref()?;
                    let score = compute_similarity(embedding, query_embedding, self.metric);
                    if options.min_score.is_some_and(|t| score < t) {
                        return None;
                    }
                    let mut hit = doc.clone();
                    hit.score = score;
                    if !options.include_embedding {
                        hit.embedding = None;
                    }
                    Some(hit)
                })
                .collect()
        };

        sort_by_score(&mut scored);
        scored.truncate(options.top_k);

        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> RagResult<usize> {
        let mut guard = self.documents.write();
        Ok(ids.iter().filter(|id| guard.remove(id.as_str()).is_some()).count())
    }

    async fn clear(&self) -> RagResult<()> {
        self.documents.write().clear();
        Ok(())
    }

    async fn count(&self) -> RagResult<usize> {
        Ok(self.documents.read().len())
    }
}
