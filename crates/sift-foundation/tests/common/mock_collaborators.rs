//! Deterministic collaborators for integration tests.
//!
//! [`HashingEmbedder`] is a bag-of-words embedder: every token is hashed into
//! one of `dimension` buckets and the vector is L2-normalised, so texts that
//! share words have positive cosine similarity and texts that share nothing
//! are (barring bucket collisions) orthogonal.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sift_foundation::rag::bm25::tokenize;
use sift_kernel::rag::{CompletionModel, CompletionRequest, Embedder};
use sift_kernel::{RagError, RagResult};

pub struct HashingEmbedder {
    dimension: usize,
    delay: Option<Duration>,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            delay: None,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text sent upstream, in call order.
    pub fn texts_seen(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            // FNV-1a
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            v[(hash % self.dimension as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().extend(texts.iter().cloned());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedder that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Err(RagError::Embedding("embedding service unavailable".to_string()))
    }

    fn dimension(&self) -> usize {
        0
    }
}

/// Completion model that always fails and counts its calls.
#[derive(Default)]
pub struct FailingCompletion {
    calls: AtomicUsize,
}

impl FailingCompletion {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for FailingCompletion {
    async fn complete(&self, _request: CompletionRequest) -> RagResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::Completion("completion service unavailable".to_string()))
    }
}

/// Completion model answering every prompt with the same passage.
pub struct EchoCompletion(pub String);

#[async_trait]
impl CompletionModel for EchoCompletion {
    async fn complete(&self, _request: CompletionRequest) -> RagResult<String> {
        Ok(self.0.clone())
    }
}
