//! Query-adaptive retrieval
//!
//! A classifier sorts each query by complexity and type, which selects a
//! [`RetrievalStrategy`]: how many results, how strict, whether to rerank,
//! whether to fan out over every source, and optionally which named
//! retriever to use.

use super::multi::MultiRetriever;
use crate::rag::classifier::RuleBasedClassifier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sift_kernel::rag::{
    Document, QueryAnalysis, QueryClassifier, QueryComplexity, QueryType, Reranker,
    RetrievalStrategy, RetrieveOptions, Retriever, with_cancel,
};
use sift_kernel::{RagError, RagResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const QUERY_COMPLEXITY_KEY: &str = "query_complexity";
pub const QUERY_TYPE_KEY: &str = "query_type";

/// Strategy per complexity level plus the one used when classification
/// fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub simple: RetrievalStrategy,
    pub moderate: RetrievalStrategy,
    pub complex: RetrievalStrategy,
    pub fallback: RetrievalStrategy,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            simple: RetrievalStrategy::new(3, 0.7),
            moderate: RetrievalStrategy::new(5, 0.5).with_rerank(true),
            complex: RetrievalStrategy::new(10, 0.3)
                .with_rerank(true)
                .with_multi_query(true),
            fallback: RetrievalStrategy::new(5, 0.5),
        }
    }
}

impl AdaptiveConfig {
    /// Base strategy for the complexity, adjusted for the query type.
    pub fn strategy_for(&self, analysis: &QueryAnalysis) -> RetrievalStrategy {
        let base = match analysis.complexity {
            QueryComplexity::Simple => self.simple.clone(),
            QueryComplexity::Moderate => self.moderate.clone(),
            QueryComplexity::Complex => self.complex.clone(),
        };

        match analysis.query_type {
            QueryType::Comparative => {
                let top_k = base.top_k().max(8);
                base.with_top_k(top_k).with_rerank(true)
            }
            QueryType::Aggregation => {
                let top_k = base.top_k().max(10);
                let min_score = base.min_score().min(0.3);
                base.with_top_k(top_k).with_min_score(min_score)
            }
            QueryType::Analytical => base.with_rerank(true),
            QueryType::Factual => base,
        }
    }
}

/// Outcome of classification for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPlan {
    /// `None` when the classifier failed and the fallback strategy applies
    pub analysis: Option<QueryAnalysis>,
    pub strategy: RetrievalStrategy,
}

pub struct AdaptiveRetriever {
    classifier: Arc<dyn QueryClassifier>,
    default_retriever: Option<Arc<dyn Retriever>>,
    named: BTreeMap<String, Arc<dyn Retriever>>,
    multi: Option<MultiRetriever>,
    reranker: Option<Arc<dyn Reranker>>,
    config: AdaptiveConfig,
}

impl AdaptiveRetriever {
    pub fn builder() -> AdaptiveRetrieverBuilder {
        AdaptiveRetrieverBuilder::default()
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Classify the query and pick a strategy without retrieving.
    ///
    /// Classifier errors fall back to the configured fallback strategy;
    /// only cancellation is returned as an error.
    pub async fn plan(&self, query: &str, options: &RetrieveOptions) -> RagResult<RetrievalPlan> {
        match with_cancel(&options.cancel, self.classifier.classify(query)).await {
            Ok(analysis) => {
                let strategy = self.config.strategy_for(&analysis);
                Ok(RetrievalPlan {
                    analysis: Some(analysis),
                    strategy,
                })
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(error = %e, "query classification failed, using fallback strategy");
                Ok(RetrievalPlan {
                    analysis: None,
                    strategy: self.config.fallback.clone(),
                })
            }
        }
    }

    /// A registered named override takes precedence over multi-query
    /// fan-out; an unknown name falls through to the remaining rules.
    fn select(&self, strategy: &RetrievalStrategy) -> Option<&dyn Retriever> {
        if let Some(name) = strategy.retriever() {
            match self.named.get(name) {
                Some(retriever) => return Some(retriever.as_ref()),
                None => warn!(retriever = name, "named retriever not registered, ignoring override"),
            }
        }
        if strategy.multi_query() {
            if let Some(multi) = &self.multi {
                return Some(multi as &dyn Retriever);
            }
        }
        self.default_retriever
            .as_deref()
            .or_else(|| self.named.values().next().map(|r| r.as_ref()))
    }
}

#[async_trait]
impl Retriever for AdaptiveRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        let plan = self.plan(query, options).await?;
        let strategy = &plan.strategy;

        let Some(retriever) = self.select(strategy) else {
            debug!("no retriever configured");
            return Ok(Vec::new());
        };

        let reranker = self.reranker.as_ref().filter(|_| strategy.rerank());
        let fetch_k = if reranker.is_some() {
            strategy.top_k().saturating_mul(2)
        } else {
            strategy.top_k()
        };
        let call_options = options
            .clone()
            .with_top_k(fetch_k)
            .with_min_score(strategy.min_score());

        let mut docs = retriever.retrieve(query, &call_options).await?;
        if let Some(reranker) = reranker {
            docs = with_cancel(&options.cancel, reranker.rerank(query, docs))
                .await
                .map_err(|e| RagError::at_stage("adaptive.rerank", e))?;
        }
        docs.truncate(strategy.top_k());

        if let Some(analysis) = &plan.analysis {
            for doc in &mut docs {
                doc.metadata.insert(
                    QUERY_COMPLEXITY_KEY.to_string(),
                    analysis.complexity.as_str().into(),
                );
                doc.metadata
                    .insert(QUERY_TYPE_KEY.to_string(), analysis.query_type.as_str().into());
            }
        }

        debug!(
            complexity = plan.analysis.as_ref().map(|a| a.complexity.as_str()),
            top_k = strategy.top_k(),
            rerank = reranker.is_some(),
            multi = strategy.multi_query(),
            hits = docs.len(),
            "adaptive retrieval"
        );
        Ok(docs)
    }
}

#[derive(Default)]
pub struct AdaptiveRetrieverBuilder {
    classifier: Option<Arc<dyn QueryClassifier>>,
    default_retriever: Option<Arc<dyn Retriever>>,
    named: BTreeMap<String, Arc<dyn Retriever>>,
    reranker: Option<Arc<dyn Reranker>>,
    config: AdaptiveConfig,
}

impl AdaptiveRetrieverBuilder {
    /// Defaults to [`RuleBasedClassifier`].
    pub fn classifier(mut self, classifier: Arc<dyn QueryClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.default_retriever = Some(retriever);
        self
    }

    /// Register a retriever that strategies can select by name.
    pub fn named_retriever(mut self, name: impl Into<String>, retriever: Arc<dyn Retriever>) -> Self {
        self.named.insert(name.into(), retriever);
        self
    }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(mut self, config: AdaptiveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> AdaptiveRetriever {
        let sources: Vec<Arc<dyn Retriever>> = self
            .default_retriever
            .iter()
            .chain(self.named.values())
            .cloned()
            .collect();
        let multi = if sources.len() > 1 {
            MultiRetriever::new(sources, true).ok()
        } else {
            None
        };

        AdaptiveRetriever {
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(RuleBasedClassifier::new())),
            default_retriever: self.default_retriever,
            named: self.named,
            multi,
            reranker: self.reranker,
            config: self.config,
        }
    }
}
