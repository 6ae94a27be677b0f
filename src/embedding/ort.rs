//! ONNX Runtime inference backend.
//!
//! Loads a sentence-transformer ONNX model and its HuggingFace tokenizer
//! from disk. The hidden-state output name is resolved once here, at load
//! time, against a list of names seen across exported encoders; a model
//! exposing none of them fails initialization loudly instead of being
//! probed on every call.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::{Session, SessionInputValue, SessionOutputs};
use tokenizers::{Tokenizer, TruncationParams};

use super::backend::{BackendError, HiddenStates, InferenceBackend, TokenizedInput};

/// Output names produced by common encoder exports, in preference order.
const OUTPUT_CANDIDATES: [&str; 3] = ["last_hidden_state", "output_0", "embeddings"];

pub struct OrtBackend {
    /// ort sessions need &mut to run
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    output_name: String,
    wants_type_ids: bool,
    max_len: usize,
}

impl OrtBackend {
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_len: usize,
    ) -> Result<Self, BackendError> {
        if !model_path.exists() {
            return Err(BackendError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }
        if !tokenizer_path.exists() {
            return Err(BackendError::ModelNotFound(
                tokenizer_path.display().to_string(),
            ));
        }

        let session = Session::builder()
            .map_err(|e| BackendError::Init(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| BackendError::Init(e.to_string()))?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| BackendError::Init(e.to_string()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| BackendError::Init(e.to_string()))?;

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let output_name = OUTPUT_CANDIDATES
            .iter()
            .find(|candidate| output_names.iter().any(|name| name == *candidate))
            .map(|candidate| candidate.to_string())
            .ok_or(BackendError::NoEmbeddingOutput(output_names))?;

        let wants_type_ids = session.inputs.iter().any(|i| i.name == "token_type_ids");

        log::info!(
            "embedding model loaded, hidden states bound to output {:?}",
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            output_name,
            wants_type_ids,
            max_len,
        })
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn wants_type_ids(&self) -> bool {
        self.wants_type_ids
    }
}

#[async_trait]
impl InferenceBackend for OrtBackend {
    fn tokenize(&self, text: &str) -> Result<TokenizedInput, BackendError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| BackendError::Tokenize(e.to_string()))?;

        // truncation is configured on the tokenizer; pad up to max_len here
        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|id| *id as i64).collect();
        ids.truncate(self.max_len);
        let mut attention_mask = vec![1i64; ids.len()];
        ids.resize(self.max_len, 0);
        attention_mask.resize(self.max_len, 0);

        let type_ids = self.wants_type_ids.then(|| vec![0i64; self.max_len]);

        Ok(TokenizedInput {
            ids,
            attention_mask,
            type_ids,
        })
    }

    async fn infer(&self, input: &TokenizedInput) -> Result<HiddenStates, BackendError> {
        let len = input.ids.len();
        let ids = Array2::from_shape_vec((1, len), input.ids.clone())
            .map_err(|e| BackendError::Inference(e.to_string()))?;
        let mask = Array2::from_shape_vec((1, len), input.attention_mask.clone())
            .map_err(|e| BackendError::Inference(e.to_string()))?;

        let mut inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = vec![
            (
                Cow::Borrowed("input_ids"),
                SessionInputValue::from(
                    ort::value::Value::from_array(ids)
                        .map_err(|e| BackendError::Inference(e.to_string()))?,
                ),
            ),
            (
                Cow::Borrowed("attention_mask"),
                SessionInputValue::from(
                    ort::value::Value::from_array(mask)
                        .map_err(|e| BackendError::Inference(e.to_string()))?,
                ),
            ),
        ];
        if let Some(type_ids) = &input.type_ids {
            let types = Array2::from_shape_vec((1, len), type_ids.clone())
                .map_err(|e| BackendError::Inference(e.to_string()))?;
            inputs.push((
                Cow::Borrowed("token_type_ids"),
                SessionInputValue::from(
                    ort::value::Value::from_array(types)
                        .map_err(|e| BackendError::Inference(e.to_string()))?,
                ),
            ));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|e| BackendError::Inference(format!("failed to lock session: {e}")))?;

        let outputs: SessionOutputs = session
            .run(inputs)
            .map_err(|e| BackendError::Inference(e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            BackendError::MalformedOutput(format!("output {:?} missing from run", self.output_name))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| BackendError::MalformedOutput(e.to_string()))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        if dims.len() != 3 || dims[0] != 1 {
            return Err(BackendError::MalformedOutput(format!(
                "expected hidden states of shape [1, seq, hidden], got {dims:?}"
            )));
        }

        Ok(HiddenStates {
            data: data.to_vec(),
            seq_len: dims[1] as usize,
            hidden: dims[2] as usize,
        })
    }
}
