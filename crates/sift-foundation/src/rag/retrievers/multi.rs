//! Fan-out over several retrievers with partial-failure tolerance

use super::fan_out;
use crate::rag::fusion::{dedupe_by_id, rank_and_truncate, tag_retrieval_type};
use async_trait::async_trait;
use sift_kernel::rag::{Document, RetrieveOptions, Retriever};
use sift_kernel::{RagError, RagResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Queries every source concurrently at the caller's `top_k`.
///
/// A failing source is dropped with a warning; the call fails only when
/// every source failed.
pub struct MultiRetriever {
    retrievers: Vec<Arc<dyn Retriever>>,
    dedupe: bool,
}

impl MultiRetriever {
    pub fn new(retrievers: Vec<Arc<dyn Retriever>>, dedupe: bool) -> RagResult<Self> {
        if retrievers.is_empty() {
            return Err(RagError::Config(
                "multi retriever needs at least one source".to_string(),
            ));
        }
        Ok(Self { retrievers, dedupe })
    }

    pub fn sources(&self) -> usize {
        self.retrievers.len()
    }
}

#[async_trait]
impl Retriever for MultiRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        let results = fan_out(&self.retrievers, query, options).await;
        options.check_cancelled()?;

        let mut collected = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in results.into_iter().enumerate() {
            match result {
                Ok(docs) => collected.extend(docs),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(source, error = %e, "dropping failed retrieval source");
                    failures.push(format!("source {source}: {e}"));
                }
            }
        }

        if failures.len() == self.retrievers.len() {
            return Err(RagError::AllSourcesFailed(failures.join("; ")));
        }

        if self.dedupe {
            collected = dedupe_by_id(collected);
        }
        let mut docs = rank_and_truncate(collected, options.top_k);
        tag_retrieval_type(&mut docs, "multi");
        debug!(
            sources = self.retrievers.len(),
            failed = failures.len(),
            hits = docs.len(),
            "multi retrieval"
        );
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRetriever(Vec<(&'static str, f32)>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(&self, _query: &str, _options: &RetrieveOptions) -> RagResult<Vec<Document>> {
            Ok(self
                .0
                .iter()
                .map(|(id, score)| Document::new(*id, format!("from {id}")).with_score(*score))
                .collect())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn retrieve(&self, _query: &str, _options: &RetrieveOptions) -> RagResult<Vec<Document>> {
            Err(RagError::Search("down".to_string()))
        }
    }

    fn fixed(docs: Vec<(&'static str, f32)>) -> Arc<dyn Retriever> {
        Arc::new(FixedRetriever(docs))
    }

    #[test]
    fn rejects_empty_source_list() {
        assert!(matches!(MultiRetriever::new(vec![], true), Err(RagError::Config(_))));
    }

    #[tokio::test]
    async fn dedupes_shared_ids() {
        let retriever = MultiRetriever::new(
            vec![fixed(vec![("a", 0.9), ("b", 0.5)]), fixed(vec![("a", 0.4), ("c", 0.6)])],
            true,
        )
        .unwrap();

        let docs = retriever.retrieve("q", &RetrieveOptions::new(10)).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(docs[0].score, 0.9);
    }

    #[tokio::test]
    async fn keeps_duplicates_without_dedupe() {
        let retriever = MultiRetriever::new(
            vec![fixed(vec![("a", 0.9)]), fixed(vec![("a", 0.4)])],
            false,
        )
        .unwrap();

        let docs = retriever.retrieve("q", &RetrieveOptions::new(10)).await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn tolerates_partial_failure() {
        let retriever = MultiRetriever::new(
            vec![Arc::new(FailingRetriever), fixed(vec![("a", 0.9), ("b", 0.8), ("c", 0.7)])],
            true,
        )
        .unwrap();

        let docs = retriever.retrieve("q", &RetrieveOptions::new(2)).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.metadata_str("retrieval_type") == Some("multi")));
    }

    #[tokio::test]
    async fn fails_when_every_source_fails() {
        let retriever =
            MultiRetriever::new(vec![Arc::new(FailingRetriever), Arc::new(FailingRetriever)], true).unwrap();

        let err = retriever.retrieve("q", &RetrieveOptions::new(2)).await.unwrap_err();
        assert!(matches!(err, RagError::AllSourcesFailed(_)));
    }
}
