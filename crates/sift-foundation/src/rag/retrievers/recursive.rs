//! Hierarchical retrieval over a node graph
//!
//! Seeds are found by vector search over the backing store; from each seed
//! the traversal walks down the [`NodeIndex`] towards leaf chunks, scoring
//! children against the query to decide where to descend.
//!
//! The graph may contain cycles and dangling child ids. Traversal keeps a
//! visited set and a depth bound, and looks children up by id through the
//! index, so every call terminates.

use crate::rag::embedding_cache::CachedEmbedder;
use crate::rag::fusion::rank_and_truncate;
use crate::rag::node_index::NodeIndex;
use crate::rag::similarity::cosine_similarity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sift_kernel::error::StageExt;
use sift_kernel::rag::{
    Document, Embedder, IndexNode, NodeType, PARENT_ID_KEY, RETRIEVAL_TYPE_KEY, RetrieveOptions,
    Retriever, VectorStore, with_cancel,
};
use sift_kernel::{RagError, RagResult};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const NODE_TYPE_KEY: &str = "node_type";
pub const DEPTH_KEY: &str = "depth";
pub const CHILD_COUNT_KEY: &str = "child_count";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecursiveConfig {
    /// Deepest level visited below a seed (seeds are depth 0)
    pub max_depth: usize,
    /// Return intermediate nodes as results in addition to descending
    pub include_intermediate: bool,
    /// Descend into every child instead of the best scoring ones
    pub expand_all: bool,
    /// Texts per upstream embedding call while indexing
    pub embed_batch_size: usize,
}

impl Default for RecursiveConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            include_intermediate: false,
            expand_all: false,
            embed_batch_size: 32,
        }
    }
}

pub struct RecursiveRetriever {
    index: Arc<NodeIndex>,
    store: Arc<dyn VectorStore>,
    embedder: CachedEmbedder,
    config: RecursiveConfig,
}

impl RecursiveRetriever {
    pub fn builder() -> RecursiveRetrieverBuilder {
        RecursiveRetrieverBuilder::default()
    }

    pub fn index(&self) -> &Arc<NodeIndex> {
        &self.index
    }

    pub fn config(&self) -> &RecursiveConfig {
        &self.config
    }

    /// Upsert nodes into the graph and the backing store.
    ///
    /// Nodes with content but no vector are embedded in batches of
    /// `embed_batch_size`, checking `cancel` between batches. The graph is
    /// only updated after the store write succeeds. Returns the number of
    /// nodes written.
    pub async fn index_nodes(
        &self,
        mut nodes: Vec<IndexNode>,
        cancel: &CancellationToken,
    ) -> RagResult<usize> {
        let pending: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.embedding.is_none() && !node.content.is_empty())
            .map(|(i, _)| i)
            .collect();

        for batch in pending.chunks(self.config.embed_batch_size.max(1)) {
            if cancel.is_cancelled() {
                return Err(RagError::Cancelled);
            }
            let texts: Vec<String> = batch.iter().map(|&i| nodes[i].content.clone()).collect();
            let vectors = with_cancel(cancel, self.embedder.embed(&texts))
                .await
                .stage("recursive.embed")?;
            for (&i, vector) in batch.iter().zip(vectors) {
                nodes[i].embedding = Some(vector);
            }
        }

        let documents: Vec<Document> = nodes.iter().map(node_to_stored_document).collect();
        let count = nodes.len();
        with_cancel(cancel, self.store.add(documents))
            .await
            .stage("recursive.store")?;
        self.index.add_all(nodes);
        info!(nodes = count, embedded = pending.len(), "indexed hierarchy nodes");
        Ok(count)
    }

    /// Remove a node from the graph and the store. Edges pointing at it
    /// become dangling and are skipped by later traversals.
    pub async fn remove_node(&self, id: &str) -> RagResult<bool> {
        let removed = self.index.delete(id).is_some();
        self.store
            .delete(&[id.to_string()])
            .await
            .stage("recursive.store")?;
        Ok(removed)
    }

    /// Depth-first descent from one seed, appending results.
    fn descend(
        &self,
        seed: IndexNode,
        query: &[f32],
        options: &RetrieveOptions,
        visited: &mut HashSet<String>,
        results: &mut Vec<(IndexNode, usize)>,
    ) {
        let mut stack = vec![(seed, 0usize)];

        while let Some((node, depth)) = stack.pop() {
            if depth > self.config.max_depth || !visited.insert(node.id.clone()) {
                continue;
            }

            if node.is_leaf() {
                results.push((node, depth));
                continue;
            }

            let mut children: Vec<IndexNode> = self
                .index
                .children_of(&node.id)
                .into_iter()
                .filter(|child| !visited.contains(&child.id))
                .map(|mut child| {
                    if let Some(embedding) = &child.embedding {
                        child.score = cosine_similarity(query, embedding);
                    }
                    child
                })
                .collect();

            if !self.config.expand_all {
                children.retain(|child| child.score >= options.min_score);
                children.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
                children.truncate(options.top_k);
            }

            if self.config.include_intermediate {
                results.push((node, depth));
            }

            // Reversed so the best child is popped first.
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }
    }
}

/// Document written to the backing store for a node.
fn node_to_stored_document(node: &IndexNode) -> Document {
    let mut doc = Document::new(node.id.clone(), node.content.clone());
    doc.embedding = node.embedding.clone();
    doc.metadata = node.metadata.clone();
    doc.metadata
        .insert(NODE_TYPE_KEY.to_string(), node.node_type.as_str().into());
    doc.metadata
        .insert(CHILD_COUNT_KEY.to_string(), node.child_ids.len().into());
    if let Some(parent_id) = &node.parent_id {
        doc.metadata
            .insert(PARENT_ID_KEY.to_string(), parent_id.clone().into());
    }
    doc
}

/// Result document for a node reached at `depth`.
fn node_to_result(node: IndexNode, depth: usize) -> Document {
    let mut doc = Document::new(node.id, node.content).with_score(node.score);
    doc.metadata = node.metadata;
    doc.metadata
        .insert(NODE_TYPE_KEY.to_string(), node.node_type.as_str().into());
    doc.metadata
        .insert(RETRIEVAL_TYPE_KEY.to_string(), "recursive".into());
    doc.metadata.insert(DEPTH_KEY.to_string(), depth.into());
    if let Some(parent_id) = node.parent_id {
        doc.metadata
            .insert(PARENT_ID_KEY.to_string(), parent_id.into());
    }
    doc
}

#[async_trait]
impl Retriever for RecursiveRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        let vector = with_cancel(&options.cancel, self.embedder.embed_one(query))
            .await
            .stage("recursive.embed")?;
        let search = options.search_options(options.top_k.saturating_mul(2));
        let seeds = with_cancel(&options.cancel, self.store.search(&vector, &search))
            .await
            .stage("recursive.search")?;

        let mut visited = HashSet::new();
        let mut results = Vec::new();
        for hit in &seeds {
            options.check_cancelled()?;
            let mut node = self.index.get(&hit.id).unwrap_or_else(|| {
                let mut synthetic = IndexNode::new(hit.id.clone(), NodeType::Chunk, hit.content.clone());
                synthetic.metadata = hit.metadata.clone();
                synthetic
            });
            node.score = hit.score;
            self.descend(node, &vector, options, &mut visited, &mut results);
        }

        debug!(
            seeds = seeds.len(),
            visited = visited.len(),
            results = results.len(),
            "recursive traversal"
        );
        let docs = results
            .into_iter()
            .map(|(node, depth)| node_to_result(node, depth))
            .collect();
        Ok(rank_and_truncate(docs, options.top_k))
    }
}

#[derive(Default)]
pub struct RecursiveRetrieverBuilder {
    index: Option<Arc<NodeIndex>>,
    store: Option<Arc<dyn VectorStore>>,
    embedder: Option<CachedEmbedder>,
    config: RecursiveConfig,
}

impl RecursiveRetrieverBuilder {
    /// Shared node graph. A fresh empty index is used when omitted.
    pub fn index(mut self, index: Arc<NodeIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// **Required.**
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// **Required.**
    pub fn embedder(mut self, embedder: CachedEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(mut self, config: RecursiveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn include_intermediate(mut self, include: bool) -> Self {
        self.config.include_intermediate = include;
        self
    }

    pub fn expand_all(mut self, expand_all: bool) -> Self {
        self.config.expand_all = expand_all;
        self
    }

    pub fn build(self) -> RagResult<RecursiveRetriever> {
        let store = self
            .store
            .ok_or_else(|| RagError::Config("recursive retriever requires a vector store".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::Config("recursive retriever requires an embedder".to_string()))?;
        Ok(RecursiveRetriever {
            index: self.index.unwrap_or_default(),
            store,
            embedder,
            config: self.config,
        })
    }
}
