//! Vector + keyword retrieval fused with weighted RRF

use super::fan_out;
use crate::rag::fusion::{reciprocal_rank_fusion, tag_retrieval_type};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sift_kernel::rag::{Document, RetrieveOptions, Retriever};
use sift_kernel::{RagError, RagResult};
use std::sync::Arc;
use tracing::debug;

/// Per-source weights applied during rank fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub vector_weight: f64,
    pub keyword_weight: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.7,
            keyword_weight: 0.3,
        }
    }
}

/// Runs a dense and a lexical retriever concurrently and fuses their
/// rankings. Either branch failing fails the call.
pub struct HybridRetriever {
    branches: [Arc<dyn Retriever>; 2],
    config: HybridConfig,
}

impl HybridRetriever {
    pub fn new(vector: Arc<dyn Retriever>, keyword: Arc<dyn Retriever>) -> Self {
        Self::with_config(vector, keyword, HybridConfig::default())
    }

    pub fn with_config(
        vector: Arc<dyn Retriever>,
        keyword: Arc<dyn Retriever>,
        config: HybridConfig,
    ) -> Self {
        Self {
            branches: [vector, keyword],
            config,
        }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        let branch_options = options.clone().with_top_k(options.top_k.saturating_mul(2));
        let mut results = fan_out(&self.branches, query, &branch_options).await.into_iter();

        let vector = results
            .next()
            .unwrap_or_else(|| Err(RagError::Internal("missing vector branch".to_string())))
            .map_err(|e| RagError::at_stage("hybrid.vector", e))?;
        let keyword = results
            .next()
            .unwrap_or_else(|| Err(RagError::Internal("missing keyword branch".to_string())))
            .map_err(|e| RagError::at_stage("hybrid.keyword", e))?;
        options.check_cancelled()?;

        debug!(vector = vector.len(), keyword = keyword.len(), "fusing hybrid branches");
        let mut docs = reciprocal_rank_fusion(vec![
            (vector, self.config.vector_weight),
            (keyword, self.config.keyword_weight),
        ]);
        docs.truncate(options.top_k);
        tag_retrieval_type(&mut docs, "hybrid");
        Ok(docs)
    }
}
