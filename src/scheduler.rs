//! Change scheduler: coalesces mutation bursts into single pipeline passes.
//!
//! A single pending-pass slot holds at most one scheduled pass. `arm`
//! supersedes whatever is pending (debounce timers reset, never stack) by
//! bumping a generation counter; a sleeper that wakes up superseded simply
//! returns. A pass that already started is never cancelled — in-flight
//! scoring always runs to completion, and the pipeline mutex keeps
//! concurrent passes from interleaving.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::dom::NodeId;
use crate::pipeline::{SharedPipeline, SharedTree};

pub struct Scheduler {
    pipeline: SharedPipeline,
    tree: SharedTree,
    debounce: Duration,
    generation: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(pipeline: SharedPipeline, tree: SharedTree, debounce: Duration) -> Self {
        Self {
            pipeline,
            tree,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule a pass, replacing any pending one. `immediate` skips the
    /// quiescence window.
    pub fn arm(&self, immediate: bool) {
        let armed_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        let pipeline = self.pipeline.clone();
        let delay = (!immediate).then_some(self.debounce);

        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
                if generation.load(Ordering::SeqCst) != armed_generation {
                    // superseded while waiting
                    return;
                }
            }
            pipeline.lock().await.run_pass().await;
        });
    }

    /// Drop any pending (not yet started) pass.
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Structural-change notification from the host. Arms a debounced pass
    /// only when some added node plausibly introduced a new item.
    pub async fn notify_mutations(&self, added: &[NodeId]) {
        let relevant = {
            let tree = self.tree.lock().await;
            added.iter().any(|id| mutation_is_relevant(&tree, *id))
        };
        if relevant {
            self.arm(false);
        } else {
            log::trace!("ignoring mutation batch with no item-bearing nodes");
        }
    }
}

/// An added node is relevant when it is an item, wraps items, or is one of
/// the feed scaffolding containers items stream into.
fn mutation_is_relevant(tree: &crate::dom::FeedTree, id: NodeId) -> bool {
    if !tree.is_attached(id) {
        return false;
    }
    if tree.is_item(id) || tree.test_id(id) == Some("cellInnerDiv") {
        return true;
    }
    if matches!(tree.attr(id, "aria-label"), Some(label) if label.contains("Timeline")) {
        return true;
    }
    !tree.items_within(id).is_empty()
}
