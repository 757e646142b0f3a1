//! Parent-document retrieval
//!
//! Small child fragments are indexed for precise matching while the larger
//! parent documents they came from are returned for context. Parents live
//! in an in-memory map owned by the retriever; children live in the vector
//! store with a `parent_id` back-reference.

use crate::rag::embedding_cache::CachedEmbedder;
use crate::rag::fusion::sort_by_score;
use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sift_kernel::error::StageExt;
use sift_kernel::rag::{
    Document, Embedder, PARENT_ID_KEY, RETRIEVAL_TYPE_KEY, RetrieveOptions, Retriever, Splitter,
    VectorStore, with_cancel,
};
use sift_kernel::{RagError, RagResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of children of a returned parent that matched the query.
pub const MATCHED_CHILDREN_KEY: &str = "matched_children";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParentDocumentConfig {
    /// Child fragments fetched from the store per query
    pub child_top_k: usize,
    /// Upper bound on parents returned per call
    pub parent_top_k: usize,
    /// Parents split and embedded concurrently while indexing
    pub index_concurrency: usize,
}

impl Default for ParentDocumentConfig {
    fn default() -> Self {
        Self {
            child_top_k: 20,
            parent_top_k: 5,
            index_concurrency: 4,
        }
    }
}

struct ParentEntry {
    document: Document,
    child_ids: Vec<String>,
}

pub struct ParentDocumentRetriever {
    parents: RwLock<HashMap<String, ParentEntry>>,
    store: Arc<dyn VectorStore>,
    embedder: CachedEmbedder,
    splitter: Option<Arc<dyn Splitter>>,
    config: ParentDocumentConfig,
}

fn child_id(parent_id: &str, index: usize) -> String {
    format!("{parent_id}::child::{index}")
}

impl ParentDocumentRetriever {
    pub fn builder() -> ParentDocumentRetrieverBuilder {
        ParentDocumentRetrieverBuilder::default()
    }

    pub fn config(&self) -> &ParentDocumentConfig {
        &self.config
    }

    pub fn parent_count(&self) -> usize {
        self.parents.read().len()
    }

    pub fn get_parent(&self, id: &str) -> Option<Document> {
        self.parents.read().get(id).map(|e| e.document.clone())
    }

    /// Split, embed and store the given parents.
    ///
    /// At most `index_concurrency` parents are processed at once. The parent
    /// map lock is only taken for the final insert, so retrieval keeps
    /// running while slow splitting and embedding happen. A parent whose
    /// children could not be stored is not registered. Returns the number
    /// of child fragments written.
    pub async fn add_documents(
        &self,
        parents: Vec<Document>,
        cancel: &CancellationToken,
    ) -> RagResult<usize> {
        let permits = Semaphore::new(self.config.index_concurrency.max(1));
        let total = parents.len();

        let mut tasks = Vec::with_capacity(total);
        for parent in parents {
            tasks.push(self.index_with_permit(&permits, parent, cancel));
        }
        let indexed = try_join_all(tasks).await?;

        let children: usize = indexed.iter().sum();
        info!(parents = total, children, "indexed parent documents");
        Ok(children)
    }

    async fn index_with_permit(
        &self,
        permits: &Semaphore,
        parent: Document,
        cancel: &CancellationToken,
    ) -> RagResult<usize> {
        let _permit = permits
            .acquire()
            .await
            .map_err(|e| RagError::Internal(e.to_string()))?;
        self.index_parent(parent, cancel).await
    }

    async fn index_parent(&self, parent: Document, cancel: &CancellationToken) -> RagResult<usize> {
        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let fragments = match &self.splitter {
            Some(splitter) => with_cancel(cancel, splitter.split(vec![parent.clone()]))
                .await
                .stage("parent.split")?,
            None => vec![parent.clone()],
        };

        let mut children: Vec<Document> = fragments
            .into_iter()
            .filter(|f| !f.content.is_empty())
            .enumerate()
            .map(|(index, fragment)| {
                let mut child = Document::new(child_id(&parent.id, index), fragment.content);
                child.metadata = fragment.metadata;
                child
                    .metadata
                    .insert(PARENT_ID_KEY.to_string(), parent.id.clone().into());
                child
            })
            .collect();

        let texts: Vec<String> = children.iter().map(|c| c.content.clone()).collect();
        let vectors = with_cancel(cancel, self.embedder.embed(&texts))
            .await
            .stage("parent.embed")?;
        for (child, vector) in children.iter_mut().zip(vectors) {
            child.embedding = Some(vector);
        }

        let child_ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        let count = children.len();
        with_cancel(cancel, self.store.add(children))
            .await
            .stage("parent.store")?;

        // The parent only becomes visible once its children are stored.
        let previous = self.parents.write().insert(
            parent.id.clone(),
            ParentEntry {
                document: parent,
                child_ids: child_ids.clone(),
            },
        );

        if let Some(previous) = previous {
            let stale: Vec<String> = previous
                .child_ids
                .into_iter()
                .filter(|id| !child_ids.contains(id))
                .collect();
            if !stale.is_empty() {
                self.store.delete(&stale).await.stage("parent.store")?;
            }
        }
        Ok(count)
    }

    /// Remove a parent and its indexed children. Returns whether the parent
    /// existed.
    pub async fn remove_document(&self, id: &str) -> RagResult<bool> {
        let Some(entry) = self.parents.write().remove(id) else {
            return Ok(false);
        };
        self.store.delete(&entry.child_ids).await.stage("parent.store")?;
        info!(parent = id, children = entry.child_ids.len(), "removed parent document");
        Ok(true)
    }
}

#[async_trait]
impl Retriever for ParentDocumentRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        let vector = with_cancel(&options.cancel, self.embedder.embed_one(query))
            .await
            .stage("parent.embed")?;
        let search = options.search_options(self.config.child_top_k);
        let children = with_cancel(&options.cancel, self.store.search(&vector, &search))
            .await
            .stage("parent.search")?;

        let mut best: HashMap<String, (f32, usize)> = HashMap::new();
        for child in &children {
            let Some(parent_id) = child.metadata_str(PARENT_ID_KEY) else {
                warn!(child = %child.id, "child fragment without parent id");
                continue;
            };
            best.entry(parent_id.to_string())
                .and_modify(|(score, matched)| {
                    *score = score.max(child.score);
                    *matched += 1;
                })
                .or_insert((child.score, 1));
        }

        let mut docs: Vec<Document> = {
            let parents = self.parents.read();
            best.into_iter()
                .filter_map(|(parent_id, (score, matched))| {
                    let Some(entry) = parents.get(&parent_id) else {
                        debug!(parent = %parent_id, "skipping orphaned child fragments");
                        return None;
                    };
                    let mut doc = entry.document.clone();
                    doc.embedding = None;
                    doc.score = score;
                    doc.metadata
                        .insert(RETRIEVAL_TYPE_KEY.to_string(), "parent_doc".into());
                    doc.metadata
                        .insert(MATCHED_CHILDREN_KEY.to_string(), matched.into());
                    Some(doc)
                })
                .collect()
        };

        sort_by_score(&mut docs);
        let limit = match options.top_k {
            0 => self.config.parent_top_k,
            top_k => top_k.min(self.config.parent_top_k),
        };
        docs.truncate(limit);
        debug!(children = children.len(), parents = docs.len(), "parent document retrieval");
        Ok(docs)
    }
}

#[derive(Default)]
pub struct ParentDocumentRetrieverBuilder {
    store: Option<Arc<dyn VectorStore>>,
    embedder: Option<CachedEmbedder>,
    splitter: Option<Arc<dyn Splitter>>,
    config: ParentDocumentConfig,
}

impl ParentDocumentRetrieverBuilder {
    /// Store holding the child fragments. **Required.**
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// **Required.**
    pub fn embedder(mut self, embedder: CachedEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Splitter producing child fragments. Without one each parent is
    /// indexed as its own single child.
    pub fn splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    pub fn config(mut self, config: ParentDocumentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RagResult<ParentDocumentRetriever> {
        let store = self
            .store
            .ok_or_else(|| RagError::Config("parent document retriever requires a vector store".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::Config("parent document retriever requires an embedder".to_string()))?;
        Ok(ParentDocumentRetriever {
            parents: RwLock::new(HashMap::new()),
            store,
            embedder,
            splitter: self.splitter,
            config: self.config,
        })
    }
}
