//! Hypothetical Document Embeddings (HyDE)
//!
//! Instead of embedding the raw query, an LLM writes one or more passages
//! that would answer it. Those passages are embedded and used to search the
//! store, which tends to land closer to real answers than the short query.
//!
//! Generation is best effort: if no passage could be generated the retriever
//! behaves exactly like a plain [`VectorRetriever`] on the raw query.

use super::vector::VectorRetriever;
use crate::rag::fusion::{dedupe_by_id, rank_and_truncate, tag_retrieval_type};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sift_kernel::rag::{
    ChatMessage, CompletionModel, CompletionRequest, Document, Embedder, RetrieveOptions,
    Retriever, with_cancel,
};
use sift_kernel::{RagError, RagResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Placeholder replaced with the user query in the prompt template.
pub const QUERY_PLACEHOLDER: &str = "{query}";

pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "Please write a passage to answer the question.\nQuestion: {query}\nPassage:";

/// How several hypothetical documents turn into results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Average the embeddings and search once
    #[default]
    Average,
    /// Search once per document and merge the result lists
    SearchAll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HydeConfig {
    pub model: String,
    pub prompt_template: String,
    pub num_hypothetical: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub merge: MergeStrategy,
}

impl Default for HydeConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            num_hypothetical: 1,
            temperature: 0.7,
            max_tokens: 256,
            merge: MergeStrategy::Average,
        }
    }
}

pub struct HydeRetriever {
    base: VectorRetriever,
    llm: Arc<dyn CompletionModel>,
    config: HydeConfig,
}

impl HydeRetriever {
    pub fn builder() -> HydeRetrieverBuilder {
        HydeRetrieverBuilder::default()
    }

    pub fn config(&self) -> &HydeConfig {
        &self.config
    }

    fn prompt(&self, query: &str) -> String {
        self.config.prompt_template.replace(QUERY_PLACEHOLDER, query)
    }

    /// Generate up to `num_hypothetical` passages. Failed or empty
    /// generations are skipped; only cancellation is an error.
    async fn generate(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<String>> {
        let prompt = self.prompt(query);
        let mut passages = Vec::with_capacity(self.config.num_hypothetical);

        for attempt in 0..self.config.num_hypothetical {
            options.check_cancelled()?;
            let request = CompletionRequest {
                model: self.config.model.clone(),
                messages: vec![ChatMessage::user(prompt.clone())],
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };
            match with_cancel(&options.cancel, self.llm.complete(request)).await {
                Ok(text) if !text.trim().is_empty() => passages.push(text),
                Ok(_) => warn!(attempt, "hypothetical document generation returned nothing"),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!(attempt, error = %e, "hypothetical document generation failed"),
            }
        }

        Ok(passages)
    }

    /// Embed each passage on its own so one failure does not sink the rest.
    async fn embed_passages(
        &self,
        passages: &[String],
        options: &RetrieveOptions,
    ) -> RagResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(passages.len());
        let mut last_error = None;

        for (index, passage) in passages.iter().enumerate() {
            options.check_cancelled()?;
            match with_cancel(&options.cancel, self.base.embedder().embed_one(passage)).await {
                Ok(vector) => vectors.push(vector),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(index, error = %e, "skipping hypothetical document embedding");
                    last_error = Some(e);
                }
            }
        }

        if vectors.is_empty() {
            let reason = last_error.map_or_else(|| "no passages".to_string(), |e| e.to_string());
            return Err(RagError::AllSourcesFailed(format!(
                "no hypothetical document could be embedded: {reason}"
            )));
        }
        Ok(vectors)
    }
}

/// Component-wise mean using the first vector's dimension; shorter vectors
/// contribute zero past their own length.
pub fn average_vectors(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0f64; first.len()];
    for vector in vectors {
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += f64::from(*value);
        }
    }
    let n = vectors.len() as f64;
    sum.into_iter().map(|v| (v / n) as f32).collect()
}

#[async_trait]
impl Retriever for HydeRetriever {
    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> RagResult<Vec<Document>> {
        let passages = self.generate(query, options).await?;
        if passages.is_empty() {
            warn!("no hypothetical documents generated, searching with the raw query");
            return self.base.retrieve(query, options).await;
        }

        let vectors = self.embed_passages(&passages, options).await?;
        debug!(
            passages = passages.len(),
            embedded = vectors.len(),
            merge = ?self.config.merge,
            "hyde search"
        );

        let mut docs = match self.config.merge {
            MergeStrategy::Average => {
                let averaged = average_vectors(&vectors);
                self.base.search_by_vector(&averaged, options).await?
            }
            MergeStrategy::SearchAll => {
                let mut collected = Vec::new();
                for vector in &vectors {
                    options.check_cancelled()?;
                    collected.extend(self.base.search_by_vector(vector, options).await?);
                }
                rank_and_truncate(dedupe_by_id(collected), options.top_k)
            }
        };
        tag_retrieval_type(&mut docs, "hyde");
        Ok(docs)
    }
}

#[derive(Default)]
pub struct HydeRetrieverBuilder {
    base: Option<VectorRetriever>,
    llm: Option<Arc<dyn CompletionModel>>,
    config: HydeConfig,
}

impl HydeRetrieverBuilder {
    /// Vector retriever used for embedding and search. **Required.**
    pub fn base(mut self, base: VectorRetriever) -> Self {
        self.base = Some(base);
        self
    }

    /// Completion model writing the hypothetical passages. **Required.**
    pub fn llm(mut self, llm: Arc<dyn CompletionModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn config(mut self, config: HydeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = template.into();
        self
    }

    pub fn num_hypothetical(mut self, n: usize) -> Self {
        self.config.num_hypothetical = n;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn merge(mut self, merge: MergeStrategy) -> Self {
        self.config.merge = merge;
        self
    }

    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the base retriever or the completion
    /// model was not supplied.
    pub fn build(self) -> RagResult<HydeRetriever> {
        let base = self
            .base
            .ok_or_else(|| RagError::Config("HyDE retriever requires a base vector retriever".to_string()))?;
        let llm = self
            .llm
            .ok_or_else(|| RagError::Config("HyDE retriever requires a completion model".to_string()))?;
        Ok(HydeRetriever {
            base,
            llm,
            config: self.config,
        })
    }
}
