//! RAG (Retrieval-Augmented Generation) traits and types
//!
//! Defines the data model and the collaborator contracts used by every
//! retrieval strategy. Concrete implementations live in sift-foundation.

pub mod completion;
pub mod embedding;
pub mod options;
pub mod retriever;
pub mod splitter;
pub mod strategy;
pub mod types;
pub mod vector_store;

pub use completion::{ChatMessage, CompletionModel, CompletionRequest};
pub use embedding::Embedder;
pub use options::{RetrieveOptions, SearchOptions, with_cancel};
pub use retriever::{Reranker, Retriever};
pub use splitter::Splitter;
pub use strategy::{QueryAnalysis, QueryClassifier, QueryComplexity, QueryType, RetrievalStrategy};
pub use types::{Document, IndexNode, Metadata, NodeType, PARENT_ID_KEY, RETRIEVAL_TYPE_KEY};
pub use vector_store::{SimilarityMetric, VectorStore};
