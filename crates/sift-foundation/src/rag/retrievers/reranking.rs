//! Fetch-then-rerank decorator

use async_trait::async_trait;
use sift_kernel::RagResult;
use sift_kernel::rag::{Document, Reranker, RetrieveOptions, Retriever, with_cancel};
use std::sync::Arc;
use tracing::debug;

/// Fetches `fetch_k` candidates from an inner retriever and hands them to a
/// reranker before truncating to the caller's `top_k`.
pub struct RerankingRetriever {
    inner: Arc<dyn Retriever>,
    reranker: Arc<dyn Reranker>,
    fetch_k: usize,
}

impl RerankingRetriever {
    pub fn new(inner: Arc<dyn Retriever>, reranker: Arc<dyn Reranker>, fetch_k: usize) -> Self {
        Self {
            inner,
            reranker,
            fetch_k,
        }
    }

    pub fn fetch_k(&self) -> usize {
        self.fetch_k
    }
}

#[async_trait]
impl Retriever for RerankingRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        let fetch_options = options.clone().with_top_k(self.fetch_k.max(options.top_k));
        let candidates = self.inner.retrieve(query, &fetch_options).await?;
        let fetched = candidates.len();

        let mut docs = with_cancel(&options.cancel, self.reranker.rerank(query, candidates)).await?;
        docs.truncate(options.top_k);
        debug!(fetched, returned = docs.len(), "reranked candidates");
        Ok(docs)
    }
}
