//! Retrieval error types
//!
//! Hard failures surface as a `RagError`; soft failures (dangling edges,
//! orphaned fragments, classifier fallbacks) never reach this type.

use thiserror::Error;

/// Retrieval operation result type
pub type RagResult<T> = Result<T, RagError>;

/// Retrieval error type
///
/// `Clone` so that one coalesced upstream failure can be handed to every
/// waiter of the same in-flight call.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RagError {
    /// A required collaborator is missing or construction parameters are invalid
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Embedding generation failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Backend vector search failed
    #[error("Search failed: {0}")]
    Search(String),

    /// LLM completion failed
    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Rerank failed: {0}")]
    Rerank(String),

    #[error("Split failed: {0}")]
    Split(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    /// An upstream failure annotated with the retrieval stage it happened in
    #[error("{stage}: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<RagError>,
    },

    /// Every source of a partial-failure tolerant operation failed
    #[error("All sources failed: {0}")]
    AllSourcesFailed(String),

    /// The caller's cancellation token fired
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagError {
    /// Wrap an error with the stage it occurred in.
    ///
    /// Cancellation is passed through untouched so callers can match on it.
    pub fn at_stage(stage: impl Into<String>, source: RagError) -> Self {
        match source {
            RagError::Cancelled => RagError::Cancelled,
            other => RagError::Stage {
                stage: stage.into(),
                source: Box::new(other),
            },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RagError::Cancelled)
    }

    /// The innermost error, skipping stage annotations.
    pub fn root_cause(&self) -> &RagError {
        match self {
            RagError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Extension for annotating results with a stage name.
pub trait StageExt<T> {
    fn stage(self, stage: &str) -> RagResult<T>;
}

impl<T> StageExt<T> for RagResult<T> {
    fn stage(self, stage: &str) -> RagResult<T> {
        self.map_err(|e| RagError::at_stage(stage, e))
    }
}
