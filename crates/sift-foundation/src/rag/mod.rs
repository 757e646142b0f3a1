//! RAG (Retrieval-Augmented Generation) implementations
//!
//! Concrete implementations of the retrieval contracts defined in
//! sift-kernel, along with the scoring and caching utilities they share.

pub mod bm25;
pub mod classifier;
pub mod embedding_cache;
pub mod fusion;
pub mod node_index;
pub mod retrievers;
pub mod score_reranker;
pub mod similarity;
pub mod splitter;
pub mod vector_store;

pub use bm25::bm25_score;
pub use classifier::RuleBasedClassifier;
pub use embedding_cache::{CacheStats, CachedEmbedder, EmbeddingCacheConfig};
pub use fusion::reciprocal_rank_fusion;
pub use node_index::NodeIndex;
pub use retrievers::*;
pub use score_reranker::ScoreReranker;
pub use similarity::{compute_similarity, cosine_similarity};
pub use splitter::FixedSizeSplitter;
pub use vector_store::InMemoryVectorStore;

// Re-export kernel types for convenience
pub use sift_kernel::rag::{
    Document, Embedder, IndexNode, NodeType, Reranker, RetrieveOptions, Retriever,
    SimilarityMetric, VectorStore,
};
