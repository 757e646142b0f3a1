//! Retrieval configuration file
//!
//! Every component reads its own section; missing sections and fields keep
//! their defaults.
//!
//! # Example (sift.yml)
//!
//! ```yaml
//! cache:
//!   max_entries: 50000
//!
//! hybrid:
//!   vector_weight: 0.6
//!   keyword_weight: 0.4
//!
//! hyde:
//!   model: gpt-4o-mini
//!   num_hypothetical: 3
//!   merge: search_all
//!
//! parent_document:
//!   child_top_k: 40
//!
//! recursive:
//!   max_depth: 2
//!   include_intermediate: true
//!
//! adaptive:
//!   complex:
//!     top_k: 12
//!     min_score: 0.25
//!     rerank: true
//!     multi_query: true
//! ```

use crate::rag::embedding_cache::EmbeddingCacheConfig;
use crate::rag::retrievers::{
    AdaptiveConfig, HybridConfig, HydeConfig, ParentDocumentConfig, RecursiveConfig,
};
use serde::{Deserialize, Serialize};
use sift_kernel::config::{self, ConfigFormat, ConfigResult};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub cache: EmbeddingCacheConfig,
    pub hybrid: HybridConfig,
    pub hyde: HydeConfig,
    pub parent_document: ParentDocumentConfig,
    pub recursive: RecursiveConfig,
    pub adaptive: AdaptiveConfig,
}

impl RetrievalConfig {
    /// Load from a file, format picked by extension, with `SIFT_`
    /// environment overrides applied.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        config::load_config(path)
    }

    pub fn from_str(content: &str, format: ConfigFormat) -> ConfigResult<Self> {
        config::from_str(content, format)
    }
}
