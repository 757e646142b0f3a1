//! Retrieval strategies
//!
//! Every strategy implements the kernel [`Retriever`] contract. Composite
//! strategies hold other retrievers and delegate to them.

pub mod adaptive;
pub mod hybrid;
pub mod hyde;
pub mod keyword;
pub mod multi;
pub mod parent_document;
pub mod recursive;
pub mod reranking;
pub mod vector;

pub use adaptive::{AdaptiveConfig, AdaptiveRetriever, AdaptiveRetrieverBuilder};
pub use hybrid::{HybridConfig, HybridRetriever};
pub use hyde::{HydeConfig, HydeRetriever, HydeRetrieverBuilder, MergeStrategy};
pub use keyword::KeywordRetriever;
pub use multi::MultiRetriever;
pub use parent_document::{ParentDocumentConfig, ParentDocumentRetriever, ParentDocumentRetrieverBuilder};
pub use recursive::{RecursiveConfig, RecursiveRetriever, RecursiveRetrieverBuilder};
pub use reranking::RerankingRetriever;
pub use vector::VectorRetriever;

use sift_kernel::rag::{Document, RetrieveOptions, Retriever};
use sift_kernel::{RagError, RagResult};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Run retrievers in parallel, returning one result per retriever in input
/// order.
///
/// Branches run as tasks of a `JoinSet`, so dropping the returned future
/// aborts every branch still in flight.
pub(crate) async fn fan_out(
    retrievers: &[Arc<dyn Retriever>],
    query: &str,
    options: &RetrieveOptions,
) -> Vec<RagResult<Vec<Document>>> {
    let mut set = JoinSet::new();
    for (index, retriever) in retrievers.iter().enumerate() {
        let retriever = Arc::clone(retriever);
        let query = query.to_string();
        let options = options.clone();
        set.spawn(async move { (index, retriever.retrieve(&query, &options).await) });
    }

    let mut results: Vec<Option<RagResult<Vec<Document>>>> = retrievers.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => tracing::warn!(error = %e, "retriever task did not complete"),
        }
    }

    results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| Err(RagError::Internal("retriever task did not complete".to_string()))))
        .collect()
}
