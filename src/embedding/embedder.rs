//! Text → normalized embedding vector.
//!
//! `embed` is a best-effort primitive: any failure (engine unavailable,
//! empty text, tokenizer or inference error) yields `None`, never an error,
//! and the layers above treat `None` as "unscorable".

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::EmbeddingConfig;

use super::backend::{HiddenStates, InferenceBackend};
use super::ort::OrtBackend;

/// Norms below this are left unnormalized to avoid division blow-up.
pub const NORM_EPSILON: f32 = 1e-5;

/// Lazily-initialized embedding pipeline.
///
/// Engine initialization is a singleton async operation: concurrent callers
/// await the same in-flight load, and a failed load pins the engine as
/// unavailable for the rest of the session — scoring silently degrades
/// while filtering keeps working.
pub struct Embedder {
    config: EmbeddingConfig,
    engine: OnceCell<Option<Arc<dyn InferenceBackend>>>,
}

impl Embedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            engine: OnceCell::new(),
        }
    }

    /// Test and embedded-host constructor: skip loading and use the given
    /// backend directly.
    pub fn with_backend(backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            config: EmbeddingConfig::default(),
            engine: OnceCell::new_with(Some(Some(backend))),
        }
    }

    /// Run (or await) the one-time engine load. Returns readiness.
    pub async fn ensure_ready(&self) -> bool {
        self.engine
            .get_or_init(|| async {
                let model_path = PathBuf::from(&self.config.model_path);
                let tokenizer_path = PathBuf::from(&self.config.tokenizer_path);
                let max_len = self.config.max_sequence_length;

                let loaded = tokio::task::spawn_blocking(move || {
                    OrtBackend::load(&model_path, &tokenizer_path, max_len)
                })
                .await;

                match loaded {
                    Ok(Ok(backend)) => Some(Arc::new(backend) as Arc<dyn InferenceBackend>),
                    Ok(Err(error)) => {
                        log::error!("embedding engine initialization failed: {error}");
                        None
                    }
                    Err(error) => {
                        log::error!("embedding engine load task failed: {error}");
                        None
                    }
                }
            })
            .await
            .is_some()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.engine.get(), Some(Some(_)))
    }

    /// Embed one text. `None` when the engine is not ready, the text is
    /// blank, or tokenization/inference fails.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }
        let backend = self.engine.get()?.clone()?;

        let input = match backend.tokenize(text) {
            Ok(input) => input,
            Err(error) => {
                log::warn!("tokenization failed: {error}");
                return None;
            }
        };

        let hidden = match backend.infer(&input).await {
            Ok(hidden) => hidden,
            Err(error) => {
                log::warn!("inference failed: {error}");
                return None;
            }
        };

        let mut pooled = mean_pool(&hidden, &input.attention_mask);
        l2_normalize(&mut pooled);
        Some(pooled)
    }
}

/// Average hidden states over positions where the attention mask is 1.
/// Padding positions contribute nothing; zero valid positions yield a zero
/// vector.
pub(crate) fn mean_pool(hidden: &HiddenStates, attention_mask: &[i64]) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden.hidden];
    let mut token_count = 0usize;

    let positions = hidden.seq_len.min(attention_mask.len());
    for position in 0..positions {
        if attention_mask[position] != 1 {
            continue;
        }
        token_count += 1;
        let offset = position * hidden.hidden;
        for (k, value) in pooled.iter_mut().enumerate() {
            *value += hidden.data[offset + k];
        }
    }

    if token_count > 0 {
        for value in pooled.iter_mut() {
            *value /= token_count as f32;
        }
    } else {
        log::warn!("mean pooling found zero valid tokens");
    }

    pooled
}

/// L2-normalize in place, unless the norm is below `NORM_EPSILON`.
pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > NORM_EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Convenience used by tests and the profile builder.
pub(crate) fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}
