//! Query analysis and retrieval strategy types

use crate::error::RagResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How demanding a query is; ordered from simplest to most complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Simple,
    Moderate,
    Complex,
}

impl QueryComplexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryComplexity::Simple => "simple",
            QueryComplexity::Moderate => "moderate",
            QueryComplexity::Complex => "complex",
        }
    }
}

impl fmt::Display for QueryComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of answer a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Factual,
    Analytical,
    Comparative,
    Aggregation,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Factual => "factual",
            QueryType::Analytical => "analytical",
            QueryType::Comparative => "comparative",
            QueryType::Aggregation => "aggregation",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub complexity: QueryComplexity,
    pub query_type: QueryType,
    pub keywords: Vec<String>,
    /// Classifier confidence in `[0, 1]`
    pub confidence: f32,
}

/// Immutable retrieval strategy.
///
/// Adjustments produce a new value; nothing mutates a strategy once it has
/// been handed to a retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStrategy {
    top_k: usize,
    min_score: f32,
    #[serde(default)]
    rerank: bool,
    #[serde(default)]
    multi_query: bool,
    /// Name of a registered retriever that overrides the default one
    #[serde(default)]
    retriever: Option<String>,
}

impl RetrievalStrategy {
    pub fn new(top_k: usize, min_score: f32) -> Self {
        Self {
            top_k,
            min_score,
            rerank: false,
            multi_query: false,
            retriever: None,
        }
    }

    pub fn with_top_k(self, top_k: usize) -> Self {
        Self { top_k, ..self }
    }

    pub fn with_min_score(self, min_score: f32) -> Self {
        Self { min_score, ..self }
    }

    pub fn with_rerank(self, rerank: bool) -> Self {
        Self { rerank, ..self }
    }

    pub fn with_multi_query(self, multi_query: bool) -> Self {
        Self {
            multi_query,
            ..self
        }
    }

    pub fn with_retriever(self, name: impl Into<String>) -> Self {
        Self {
            retriever: Some(name.into()),
            ..self
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn min_score(&self) -> f32 {
        self.min_score
    }

    pub fn rerank(&self) -> bool {
        self.rerank
    }

    pub fn multi_query(&self) -> bool {
        self.multi_query
    }

    pub fn retriever(&self) -> Option<&str> {
        self.retriever.as_deref()
    }
}

/// Maps a query to its complexity and type.
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> RagResult<QueryAnalysis>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_ordering() {
        assert!(QueryComplexity::Simple < QueryComplexity::Moderate);
        assert!(QueryComplexity::Moderate < QueryComplexity::Complex);
    }

    #[test]
    fn test_strategy_adjustments_produce_new_values() {
        let base = RetrievalStrategy::new(3, 0.7);
        let nudged = base.clone().with_top_k(8).with_rerank(true);

        assert_eq!(base.top_k(), 3);
        assert!(!base.rerank());
        assert_eq!(nudged.top_k(), 8);
        assert!(nudged.rerank());
        assert_eq!(nudged.min_score(), 0.7);
    }

    #[test]
    fn test_strategy_deserializes_with_defaults() {
        let strategy: RetrievalStrategy =
            serde_json::from_str(r#"{"top_k": 4, "min_score": 0.2, "retriever": "keyword"}"#).unwrap();
        assert_eq!(strategy.top_k(), 4);
        assert!(!strategy.multi_query());
        assert_eq!(strategy.retriever(), Some("keyword"));
    }
}
