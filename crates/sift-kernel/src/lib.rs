//! Sift kernel
//!
//! Contracts shared by every retrieval component: the document and node data
//! model, the collaborator traits (embedding, vector search, completion,
//! splitting, reranking, classification) and the error taxonomy. Concrete
//! implementations live in `sift-foundation`.

// error module
pub mod error;
pub use error::{RagError, RagResult};

// rag module
pub mod rag;

// config module
#[cfg(feature = "config")]
pub mod config;
