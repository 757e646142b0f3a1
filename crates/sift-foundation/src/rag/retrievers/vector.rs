//! Nearest-neighbour retrieval over a vector store

use crate::rag::embedding_cache::CachedEmbedder;
use crate::rag::fusion::tag_retrieval_type;
use async_trait::async_trait;
use sift_kernel::RagResult;
use sift_kernel::rag::{Document, Embedder, RetrieveOptions, Retriever, VectorStore, with_cancel};
use std::sync::Arc;
use tracing::debug;

/// Embeds the query and searches the backing store.
///
/// Errors from the embedder or the store propagate unchanged.
#[derive(Clone)]
pub struct VectorRetriever {
    embedder: CachedEmbedder,
    store: Arc<dyn VectorStore>,
}

impl VectorRetriever {
    pub fn new(embedder: CachedEmbedder, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn embedder(&self) -> &CachedEmbedder {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Search with an already computed query vector.
    pub async fn search_by_vector(
        &self,
        vector: &[f32],
        options: &RetrieveOptions,
    ) -> RagResult<Vec<Document>> {
        let search = options.search_options(options.top_k);
        let mut docs = with_cancel(&options.cancel, self.store.search(vector, &search)).await?;
        tag_retrieval_type(&mut docs, "vector");
        Ok(docs)
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        let vector = with_cancel(&options.cancel, self.embedder.embed_one(query)).await?;
        let docs = self.search_by_vector(&vector, options).await?;
        debug!(top_k = options.top_k, hits = docs.len(), "vector retrieval");
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::vector_store::InMemoryVectorStore;
    use sift_kernel::RagError;
    use sift_kernel::rag::SearchOptions;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("rust") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn add(&self, _documents: Vec<Document>) -> RagResult<()> {
            Ok(())
        }
        async fn search(&self, _q: &[f32], _o: &SearchOptions) -> RagResult<Vec<Document>> {
            Err(RagError::Search("connection refused".to_string()))
        }
        async fn delete(&self, _ids: &[String]) -> RagResult<usize> {
            Ok(0)
        }
        async fn clear(&self) -> RagResult<()> {
            Ok(())
        }
        async fn count(&self) -> RagResult<usize> {
            Ok(0)
        }
    }

    async fn populated_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::cosine());
        store
            .add(vec![
                Document::new("r", "rust book").with_embedding(vec![1.0, 0.0]),
                Document::new("p", "python book").with_embedding(vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn retrieves_nearest_documents() {
        let retriever = VectorRetriever::new(
            CachedEmbedder::with_defaults(Arc::new(AxisEmbedder)),
            populated_store().await,
        );

        let docs = retriever.retrieve("learn rust", &RetrieveOptions::new(1)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "r");
        assert_eq!(docs[0].metadata_str("retrieval_type"), Some("vector"));
    }

    #[tokio::test]
    async fn applies_min_score() {
        let retriever = VectorRetriever::new(
            CachedEmbedder::with_defaults(Arc::new(AxisEmbedder)),
            populated_store().await,
        );

        let docs = retriever
            .retrieve("learn rust", &RetrieveOptions::new(5).with_min_score(0.5))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn store_errors_propagate_unchanged() {
        let retriever = VectorRetriever::new(
            CachedEmbedder::with_defaults(Arc::new(AxisEmbedder)),
            Arc::new(BrokenStore),
        );

        let err = retriever.retrieve("rust", &RetrieveOptions::default()).await.unwrap_err();
        assert!(matches!(err, RagError::Search(msg) if msg == "connection refused"));
    }

    #[tokio::test]
    async fn cancelled_call_fails_fast() {
        let retriever = VectorRetriever::new(
            CachedEmbedder::with_defaults(Arc::new(AxisEmbedder)),
            populated_store().await,
        );
        let options = RetrieveOptions::default();
        options.cancel.cancel();

        let err = retriever.retrieve("rust", &options).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
