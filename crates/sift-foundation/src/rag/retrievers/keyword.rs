//! BM25 keyword retrieval over an in-memory document set

use crate::rag::bm25::{bm25_score, tokenize};
use crate::rag::fusion::{rank_and_truncate, tag_retrieval_type};
use async_trait::async_trait;
use parking_lot::RwLock;
use sift_kernel::RagResult;
use sift_kernel::rag::{Document, RetrieveOptions, Retriever};
use tracing::{debug, info};

/// Scores every held document with BM25 on each call.
///
/// Documents scoring at or below `min_score` are dropped, so with the
/// default threshold of zero only documents sharing at least one term with
/// the query are returned.
#[derive(Default)]
pub struct KeywordRetriever {
    documents: RwLock<Vec<Document>>,
}

impl KeywordRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Add documents, replacing any existing document with the same id.
    pub fn add_documents(&self, documents: Vec<Document>) {
        let mut guard = self.documents.write();
        for doc in documents {
            match guard.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc,
                None => guard.push(doc),
            }
        }
        info!(total = guard.len(), "keyword index updated");
    }

    /// Returns whether a document was removed.
    pub fn remove_document(&self, id: &str) -> bool {
        let mut guard = self.documents.write();
        let before = guard.len();
        guard.retain(|d| d.id != id);
        guard.len() != before
    }

    pub fn clear(&self) {
        self.documents.write().clear();
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        options.check_cancelled()?;

        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let scored: Vec<Document> = {
            let guard = self.documents.read();
            guard
                .iter()
                .filter(|doc| {
                    options
                        .filter
                        .as_ref()
                        .is_none_or(|filter| doc.matches_filter(filter))
                })
                .filter_map(|doc| {
                    let score = bm25_score(&terms, &doc.content) as f32;
                    (score > options.min_score).then(|| {
                        let mut hit = doc.clone();
                        hit.score = score;
                        hit
                    })
                })
                .collect()
        };

        let mut docs = rank_and_truncate(scored, options.top_k);
        tag_retrieval_type(&mut docs, "keyword");
        debug!(terms = terms.len(), hits = docs.len(), "keyword retrieval");
        Ok(docs)
    }
}
