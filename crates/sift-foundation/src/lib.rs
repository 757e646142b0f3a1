//! Retrieval strategies and their building blocks
//!
//! Implements the contracts defined in `sift-kernel`: scoring primitives,
//! an LRU + request-coalescing embedding cache, an in-memory vector store
//! and node graph, and the retriever family from plain vector search up to
//! query-adaptive routing.

// config module - retrieval configuration file
pub mod config;

// RAG module - scoring, caching, retrievers
pub mod rag;

pub use config::RetrievalConfig;
pub use sift_kernel::{RagError, RagResult};
