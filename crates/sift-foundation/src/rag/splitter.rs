//! Fixed-width text splitting
//!
//! Splits documents into character windows of a fixed size with optional
//! overlap. Mostly useful for tests and as the default splitter of the
//! parent-document retriever.

use async_trait::async_trait;
use sift_kernel::rag::{Document, Splitter};
use sift_kernel::{RagError, RagResult};

/// Metadata key carrying a fragment's position within its source document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// Splits by character count with overlap.
#[derive(Debug, Clone)]
pub struct FixedSizeSplitter {
    /// Maximum number of characters per fragment
    chunk_size: usize,
    /// Characters shared by consecutive fragments
    chunk_overlap: usize,
}

impl FixedSizeSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> RagResult<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split text into windows of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for FixedSizeSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
        }
    }
}

#[async_trait]
impl Splitter for FixedSizeSplitter {
    async fn split(&self, documents: Vec<Document>) -> RagResult<Vec<Document>> {
        let mut fragments = Vec::new();
        for doc in documents {
            for (index, text) in self.split_text(&doc.content).into_iter().enumerate() {
                let mut fragment = Document::new(format!("{}#{index}", doc.id), text);
                fragment.metadata = doc.metadata.clone();
                fragment
                    .metadata
                    .insert(CHUNK_INDEX_KEY.to_string(), index.into());
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }
}
