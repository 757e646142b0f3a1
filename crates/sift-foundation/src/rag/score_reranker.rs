//! Reranking by the score a retriever already assigned

use crate::rag::fusion::sort_by_score;
use async_trait::async_trait;
use sift_kernel::RagResult;
use sift_kernel::rag::{Document, Reranker};
use tracing::debug;

/// Reorders results by their existing score, drops those under a floor and
/// optionally caps how many survive.
///
/// Useful as the default stage of a [`RerankingRetriever`] when no
/// cross-encoder is available: fused or merged lists come back in a stable
/// order and low-confidence tails are cut.
///
/// [`RerankingRetriever`]: crate::rag::retrievers::RerankingRetriever
#[derive(Debug, Clone, Default)]
pub struct ScoreReranker {
    floor: f32,
    limit: Option<usize>,
}

impl ScoreReranker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results scoring under `floor` are dropped.
    #[must_use]
    pub fn min_score(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
impl Reranker for ScoreReranker {
    async fn rerank(&self, _query: &str, docs: Vec<Document>) -> RagResult<Vec<Document>> {
        let received = docs.len();
        let mut kept: Vec<Document> = docs.into_iter().filter(|d| d.score >= self.floor).collect();
        sort_by_score(&mut kept);
        if let Some(limit) = self.limit {
            kept.truncate(limit);
        }
        debug!(received, kept = kept.len(), "score rerank");
        Ok(kept)
    }
}
