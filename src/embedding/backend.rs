//! Seam between the embedding pipeline and the inference engine.
//!
//! The engine is an external artifact: a tokenizer plus a transformer
//! forward pass producing per-token hidden states. Everything above this
//! trait (pooling, normalization, profiles, scoring) is engine-agnostic,
//! and tests substitute a deterministic mock.

use async_trait::async_trait;

/// Errors surfaced by an inference backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),

    #[error("backend initialization failed: {0}")]
    Init(String),

    #[error("tokenization failed: {0}")]
    Tokenize(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("no hidden-state output among model outputs: {0:?}")]
    NoEmbeddingOutput(Vec<String>),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

/// One tokenized text, truncated and padded to the configured sequence
/// length. Batch size is always 1: the pipeline embeds one text per call
/// and fans out concurrency at the scoring layer instead.
#[derive(Clone, Debug)]
pub struct TokenizedInput {
    pub ids: Vec<i64>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<i64>,
    /// Present iff the model declares a `token_type_ids` input
    pub type_ids: Option<Vec<i64>>,
}

/// Hidden states of shape `[1, seq_len, hidden]`, flattened row-major.
#[derive(Clone, Debug)]
pub struct HiddenStates {
    pub data: Vec<f32>,
    pub seq_len: usize,
    pub hidden: usize,
}

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<TokenizedInput, BackendError>;

    async fn infer(&self, input: &TokenizedInput) -> Result<HiddenStates, BackendError>;
}
