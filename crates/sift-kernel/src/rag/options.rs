//! Per-call retrieval and search options.

use crate::error::{RagError, RagResult};
use crate::rag::types::Metadata;
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Options accepted by every `Retriever::retrieve` call.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Maximum number of results
    pub top_k: usize,
    /// Results scoring at or below this value are dropped where a retriever
    /// applies thresholds
    pub min_score: f32,
    /// Exact metadata-equality filter
    pub filter: Option<Metadata>,
    /// Caller's cancellation signal
    pub cancel: CancellationToken,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.0,
            filter: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl RetrieveOptions {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_filter(mut self, filter: Metadata) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add a single filter entry
    pub fn with_filter_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fail fast if the caller has already cancelled.
    pub fn check_cancelled(&self) -> RagResult<()> {
        if self.cancel.is_cancelled() {
            Err(RagError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Search options mirroring these retrieve options with a different size.
    pub fn search_options(&self, top_k: usize) -> SearchOptions {
        let mut search = SearchOptions::new(top_k);
        if self.min_score > 0.0 {
            search.min_score = Some(self.min_score);
        }
        search.filter = self.filter.clone();
        search
    }
}

/// Options for a backend `VectorStore::search`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top_k: usize,
    /// Only results scoring at least this value are returned
    pub min_score: Option<f32>,
    pub filter: Option<Metadata>,
    /// Keep stored vectors on returned documents
    pub include_embedding: bool,
}

impl SearchOptions {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_filter(mut self, filter: Option<Metadata>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_embedding(mut self, include: bool) -> Self {
        self.include_embedding = include;
        self
    }
}

/// Race a cross-boundary call against the caller's cancellation signal.
///
/// Already-cancelled tokens win without polling the call at all.
pub async fn with_cancel<T, F>(cancel: &CancellationToken, call: F) -> RagResult<T>
where
    F: Future<Output = RagResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagError::Cancelled),
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_search_options_from_retrieve_options() {
        let opts = RetrieveOptions::new(4)
            .with_min_score(0.25)
            .with_filter_entry("lang", "en");
        let search = opts.search_options(8);

        assert_eq!(search.top_k, 8);
        assert_eq!(search.min_score, Some(0.25));
        assert_eq!(search.filter.unwrap().get("lang"), Some(&json!("en")));
        assert!(!search.include_embedding);
    }

    #[test]
    fn test_zero_min_score_is_not_a_threshold() {
        let search = RetrieveOptions::new(3).search_options(3);
        assert_eq!(search.min_score, None);
    }

    #[tokio::test]
    async fn test_with_cancel_passes_result_through() {
        let token = CancellationToken::new();
        let value = with_cancel(&token, async { Ok::<_, RagError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_cancel_fails_fast() {
        let token = CancellationToken::new();
        token.cancel();
        let err = with_cancel(&token, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, RagError>(())
        })
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_with_cancel_interrupts_in_flight_call() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = with_cancel(&token, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, RagError>(())
        })
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
    }
}
