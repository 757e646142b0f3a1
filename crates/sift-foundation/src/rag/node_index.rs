//! In-memory registry of hierarchical index nodes
//!
//! Nodes reference each other by id only, so the graph may contain cycles or
//! dangling child ids without any ownership problems; readers resolve ids
//! through the registry and skip what is missing.

use parking_lot::RwLock;
use sift_kernel::rag::IndexNode;
use std::collections::HashMap;

/// Registry owning every [`IndexNode`] of a session, keyed by id.
///
/// Reads run concurrently; writes are serialized. Share it as
/// `Arc<NodeIndex>` between the retriever and indexing code.
#[derive(Default)]
pub struct NodeIndex {
    nodes: RwLock<HashMap<String, IndexNode>>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub fn add(&self, node: IndexNode) {
        self.nodes.write().insert(node.id.clone(), node);
    }

    /// Insert or replace many nodes under one write lock.
    pub fn add_all(&self, nodes: impl IntoIterator<Item = IndexNode>) {
        let mut guard = self.nodes.write();
        for node in nodes {
            guard.insert(node.id.clone(), node);
        }
    }

    pub fn get(&self, id: &str) -> Option<IndexNode> {
        self.nodes.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.read().contains_key(id)
    }

    /// Remove a node. Children and parents referencing it keep their ids.
    pub fn delete(&self, id: &str) -> Option<IndexNode> {
        self.nodes.write().remove(id)
    }

    pub fn clear(&self) {
        self.nodes.write().clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    /// Nodes without children.
    pub fn leaves(&self) -> Vec<IndexNode> {
        self.nodes
            .read()
            .values()
            .filter(|node| node.is_leaf())
            .cloned()
            .collect()
    }

    /// Nodes without a parent.
    pub fn roots(&self) -> Vec<IndexNode> {
        self.nodes
            .read()
            .values()
            .filter(|node| node.parent_id.is_none())
            .cloned()
            .collect()
    }

    /// Resolved children of `id` in child-list order; missing ids are skipped.
    pub fn children_of(&self, id: &str) -> Vec<IndexNode> {
        let nodes = self.nodes.read();
        let Some(parent) = nodes.get(id) else {
            return Vec::new();
        };
        parent
            .child_ids
            .iter()
            .filter_map(|child_id| nodes.get(child_id).cloned())
            .collect()
    }
}
