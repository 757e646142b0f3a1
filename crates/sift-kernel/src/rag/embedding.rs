//! Embedding generator contract

use crate::error::{RagError, RagResult};
use async_trait::async_trait;

/// Batch-capable dense embedding generator.
///
/// Implementations must return exactly one vector per input text, in input
/// order. An empty input yields an empty output, not an error.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> RagResult<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("embedder returned no vector".to_string()))
    }

    /// Dimension of the produced vectors.
    fn dimension(&self) -> usize;
}
