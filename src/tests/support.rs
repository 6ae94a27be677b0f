//! Shared test fixtures: a deterministic inference backend and feed
//! builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::dom::{FeedTree, NodeId, BODY_TEXT_TEST_ID, ITEM_TEST_ID, TEST_ID_ATTR, USERNAME_TEST_ID};
use crate::embedding::{BackendError, HiddenStates, InferenceBackend, TokenizedInput};
use crate::pipeline::SharedTree;

/// Inference backend with a fixed text → vector table.
///
/// `tokenize` encodes the text's bytes as token ids so `infer` can map the
/// input back to its configured vector; texts without a vector fail
/// inference, exercising the unscorable path.
pub struct MockBackend {
    vectors: HashMap<String, Vec<f32>>,
    pub infer_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            infer_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: &[f32]) -> Self {
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }

    pub fn calls(&self) -> usize {
        self.infer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    fn tokenize(&self, text: &str) -> Result<TokenizedInput, BackendError> {
        let ids: Vec<i64> = text.bytes().map(|b| b as i64).collect();
        let attention_mask = vec![1i64; ids.len()];
        Ok(TokenizedInput {
            ids,
            attention_mask,
            type_ids: None,
        })
    }

    async fn infer(&self, input: &TokenizedInput) -> Result<HiddenStates, BackendError> {
        self.infer_calls.fetch_add(1, Ordering::SeqCst);
        let bytes: Vec<u8> = input.ids.iter().map(|id| *id as u8).collect();
        let text = String::from_utf8(bytes)
            .map_err(|e| BackendError::Inference(e.to_string()))?;
        let vector = self
            .vectors
            .get(&text)
            .ok_or_else(|| BackendError::Inference(format!("no vector for {text:?}")))?;
        Ok(HiddenStates {
            data: vector.clone(),
            seq_len: 1,
            hidden: vector.len(),
        })
    }
}

pub struct TestFeed {
    pub tree: FeedTree,
    pub container: NodeId,
    pub cells: Vec<NodeId>,
    pub items: Vec<NodeId>,
}

impl TestFeed {
    /// Append one (author, body) item cell to the container.
    pub fn push_item(&mut self, author: &str, body: &str) -> NodeId {
        let cell = self.tree.append_element(self.container, "div", &[]);
        let item = self
            .tree
            .append_element(cell, "article", &[(TEST_ID_ATTR, ITEM_TEST_ID)]);
        let username = self
            .tree
            .append_element(item, "div", &[(TEST_ID_ATTR, USERNAME_TEST_ID)]);
        let name_span = self.tree.append_element(username, "span", &[]);
        self.tree.append_text(name_span, author);
        let body_div = self
            .tree
            .append_element(item, "div", &[(TEST_ID_ATTR, BODY_TEXT_TEST_ID)]);
        self.tree.append_text(body_div, body);
        self.cells.push(cell);
        self.items.push(item);
        item
    }
}

/// A timeline container with one item cell per (author, body) entry.
pub fn build_feed(entries: &[(&str, &str)]) -> TestFeed {
    let mut tree = FeedTree::new();
    let root = tree.root();
    let container = tree.append_element(
        root,
        "div",
        &[("aria-label", "Timeline: Your Home Timeline")],
    );
    let mut feed = TestFeed {
        tree,
        container,
        cells: Vec::new(),
        items: Vec::new(),
    };
    for (author, body) in entries {
        feed.push_item(author, body);
    }
    feed
}

pub fn share(tree: FeedTree) -> SharedTree {
    Arc::new(Mutex::new(tree))
}
