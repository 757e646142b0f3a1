//! RAG core data types
//!
//! Documents are produced fresh by every retrieval call; index nodes are
//! created by upstream indexing code and only read or re-scored here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Arbitrary document metadata (unique keys, unordered).
pub type Metadata = HashMap<String, Value>;

/// Metadata key every retriever stamps on its results.
pub const RETRIEVAL_TYPE_KEY: &str = "retrieval_type";

/// Metadata key linking a child fragment to its parent document.
pub const PARENT_ID_KEY: &str = "parent_id";

/// A content fragment with an optional dense vector.
///
/// `score` is only meaningful on retrieval results (higher is more relevant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque identifier
    pub id: String,
    /// Text content
    pub content: String,
    /// Dense embedding vector, if one has been computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Relevance score (result-only)
    #[serde(default)]
    pub score: f32,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document without embedding or metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding: None,
            metadata: Metadata::new(),
            score: 0.0,
            created_at: Utc::now(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Look up a string-valued metadata entry.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Exact metadata-equality filter: every filter entry must be present
    /// with an equal value. An empty filter matches everything.
    pub fn matches_filter(&self, filter: &Metadata) -> bool {
        filter
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }
}

/// Kind of a node in a hierarchical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Leaf text chunk
    #[default]
    Chunk,
    /// Intermediate index node
    Index,
    Summary,
    Table,
    Image,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Chunk => "chunk",
            NodeType::Index => "index",
            NodeType::Summary => "summary",
            NodeType::Table => "table",
            NodeType::Image => "image",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a hierarchical index graph.
///
/// Children are referenced by id and may point at nodes that no longer
/// exist; traversal skips those. `parent_id` is a back-reference only, the
/// node registry owns every node. A node without children is a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexNode {
    pub id: String,
    #[serde(default)]
    pub node_type: NodeType,
    pub content: String,
    /// Ordered child ids
    #[serde(default)]
    pub child_ids: Vec<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Transient traversal score
    #[serde(skip)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl IndexNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            content: content.into(),
            child_ids: Vec::new(),
            parent_id: None,
            embedding: None,
            score: 0.0,
            metadata: Metadata::new(),
        }
    }

    /// Create a leaf chunk node.
    pub fn leaf(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, NodeType::Chunk, content)
    }

    pub fn with_children<I, S>(mut self, child_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.child_ids = child_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_creation() {
        let doc = Document::new("doc-1", "hello world")
            .with_embedding(vec![0.1, 0.2])
            .with_metadata("source", "test.txt")
            .with_metadata("page", 1);

        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.metadata_str("source"), Some("test.txt"));
        assert_eq!(doc.metadata.get("page"), Some(&json!(1)));
        assert_eq!(doc.embedding.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_filter_requires_exact_equality() {
        let doc = Document::new("d", "x")
            .with_metadata("lang", "en")
            .with_metadata("year", 2024);

        let mut filter = Metadata::new();
        assert!(doc.matches_filter(&filter));

        filter.insert("lang".to_string(), json!("en"));
        assert!(doc.matches_filter(&filter));

        filter.insert("year".to_string(), json!("2024"));
        assert!(!doc.matches_filter(&filter));
    }

    #[test]
    fn test_node_leaf_detection() {
        let leaf = IndexNode::leaf("n1", "text");
        assert!(leaf.is_leaf());

        let parent = IndexNode::new("n0", NodeType::Index, "summary").with_children(["n1", "n2"]);
        assert!(!parent.is_leaf());
        assert_eq!(parent.child_ids, vec!["n1", "n2"]);
    }

    #[test]
    fn test_node_type_serde() {
        let json = serde_json::to_string(&NodeType::Summary).unwrap();
        assert_eq!(json, "\"summary\"");
        assert_eq!(NodeType::Table.to_string(), "table");
    }
}
