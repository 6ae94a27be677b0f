//! Local text-embedding infrastructure.
//!
//! - `backend`: the inference-engine seam (tokenize + forward pass)
//! - `ort`: ONNX Runtime + HuggingFace tokenizer backend
//! - `embedder`: tokenize → infer → mean-pool → normalize pipeline
//! - `profile`: interest profile built from keyword embeddings

pub mod backend;
mod embedder;
pub mod ort;
mod profile;

pub use backend::{BackendError, HiddenStates, InferenceBackend, TokenizedInput};
pub use embedder::{Embedder, NORM_EPSILON};
pub use ort::OrtBackend;
pub use profile::{build_profile, cosine_similarity};
