//! Rule-based query classification

use crate::rag::bm25::tokenize;
use async_trait::async_trait;
use sift_kernel::RagResult;
use sift_kernel::rag::{QueryAnalysis, QueryClassifier, QueryComplexity, QueryType};
use std::collections::HashSet;

const REASONING_KEYWORDS: &[&str] = &[
    "why", "how", "explain", "analyze", "analyse", "compare", "difference", "relationship",
    "impact", "cause", "effect", "reason", "evaluate",
];

const COMPARATIVE_KEYWORDS: &[&str] = &[
    "compare",
    "comparison",
    "versus",
    "vs",
    "difference between",
    "differ",
    "better than",
    "pros and cons",
];

const AGGREGATION_KEYWORDS: &[&str] = &[
    "all", "list", "summarize", "summarise", "summary", "overview", "total", "every",
    "how many", "count",
];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "which", "who", "whom", "this", "that",
    "these", "those", "with", "from", "into", "about", "does", "did", "has", "have", "had",
    "can", "could", "should", "would", "will", "there", "their", "them", "they", "its", "you",
    "your", "our", "not", "but", "how", "why", "when", "where", "between",
];

/// Heuristic classifier scoring length, reasoning vocabulary and question
/// count.
///
/// Complexity score: `+0.4` for more than 50 characters (else `+0.2` for
/// more than 20), `+0.3` when a reasoning keyword is present, `+0.2` for
/// more than one question mark. At least `0.6` is complex, at least `0.3`
/// moderate.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous classification used by the trait impl.
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let lowered = query.to_lowercase();
        let tokens = tokenize(query);
        let token_set: HashSet<&str> = tokens.iter().map(String::as_str).collect();

        let mut score = 0.0f32;
        let length = query.chars().count();
        if length > 50 {
            score += 0.4;
        } else if length > 20 {
            score += 0.2;
        }
        if contains_any(&lowered, &token_set, REASONING_KEYWORDS) {
            score += 0.3;
        }
        if query.matches('?').count() > 1 {
            score += 0.2;
        }

        // Compared with a small epsilon so 0.4 + 0.2 lands on complex.
        let complexity = if score >= 0.6 - f32::EPSILON {
            QueryComplexity::Complex
        } else if score >= 0.3 - f32::EPSILON {
            QueryComplexity::Moderate
        } else {
            QueryComplexity::Simple
        };

        let (query_type, matched) = if contains_any(&lowered, &token_set, COMPARATIVE_KEYWORDS) {
            (QueryType::Comparative, true)
        } else if contains_any(&lowered, &token_set, AGGREGATION_KEYWORDS) {
            (QueryType::Aggregation, true)
        } else if complexity >= QueryComplexity::Moderate {
            (QueryType::Analytical, false)
        } else {
            (QueryType::Factual, false)
        };

        let mut seen = HashSet::new();
        let keywords = tokens
            .iter()
            .filter(|t| t.chars().count() > 2 && !STOPWORDS.contains(&t.as_str()))
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect();

        QueryAnalysis {
            complexity,
            query_type,
            keywords,
            confidence: if matched { 0.8 } else { 0.6 },
        }
    }
}

/// Single words match whole tokens; phrases match as substrings.
fn contains_any(lowered: &str, tokens: &HashSet<&str>, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| {
        if kw.contains(' ') {
            lowered.contains(kw)
        } else {
            tokens.contains(kw)
        }
    })
}

#[async_trait]
impl QueryClassifier for RuleBasedClassifier {
    async fn classify(&self, query: &str) -> RagResult<QueryAnalysis> {
        Ok(self.analyze(query))
    }
}
