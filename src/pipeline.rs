//! One pipeline pass: filter → mark-for-scoring → score → reorder.
//!
//! The pipeline lives behind a single async mutex, so passes serialize and
//! no two passes ever interleave tag mutations. The tree lock is released
//! during the embedding fan-out — the only suspension point — which lets
//! the host keep appending items while scoring is in flight.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::FeedSettings;
use crate::dom::FeedTree;
use crate::embedding::{build_profile, Embedder};
use crate::score::{self, Claim};
use crate::tracker::ItemTracker;
use crate::{filter, reorder};

pub type SharedTree = Arc<Mutex<FeedTree>>;
pub type SharedPipeline = Arc<Mutex<FeedPipeline>>;

pub struct FeedPipeline {
    pub(crate) tree: SharedTree,
    pub(crate) tracker: ItemTracker,
    pub(crate) settings: FeedSettings,
    pub(crate) embedder: Arc<Embedder>,
    pub(crate) profile: Option<Arc<Vec<f32>>>,
    pub(crate) scoring_concurrency: usize,
    passes: u64,
}

impl FeedPipeline {
    pub fn new(
        tree: SharedTree,
        settings: FeedSettings,
        embedder: Arc<Embedder>,
        scoring_concurrency: usize,
    ) -> Self {
        Self {
            tree,
            tracker: ItemTracker::new(),
            settings,
            embedder,
            profile: None,
            scoring_concurrency,
            passes: 0,
        }
    }

    pub fn tree(&self) -> SharedTree {
        self.tree.clone()
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &ItemTracker {
        &self.tracker
    }

    pub fn profile(&self) -> Option<&Arc<Vec<f32>>> {
        self.profile.as_ref()
    }

    /// Number of completed passes. Diagnostic only.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Replace the interest profile from the current keywords. Clears the
    /// profile when no keyword embeds (or reordering is disabled).
    pub async fn rebuild_profile(&mut self) {
        if !self.settings.enable_reordering {
            self.profile = None;
            return;
        }
        self.profile = build_profile(&self.embedder, &self.settings.interest_keywords)
            .await
            .map(Arc::new);
        match &self.profile {
            Some(profile) => {
                log::info!("interest profile rebuilt ({} dims)", profile.len())
            }
            None => log::warn!("no interest profile could be built"),
        }
    }

    /// Initialize the engine and profile if the settings ask for
    /// reordering. Engine init failure leaves reordering degraded and is
    /// not retried this session.
    pub async fn ensure_scoring_ready(&mut self) {
        if !self.settings.enable_reordering {
            return;
        }
        if self.embedder.ensure_ready().await && self.profile.is_none() {
            self.rebuild_profile().await;
        }
    }

    fn scoring_active(&self) -> bool {
        self.settings.enable_reordering && self.embedder.is_ready() && self.profile.is_some()
    }

    /// Run the filter stage alone, synchronously with respect to the tree.
    /// Used by the reconciler for immediate re-filtering.
    pub async fn run_filter_stage(&mut self) {
        let mut tree = self.tree.lock().await;
        let summary = filter::run(&mut tree, &mut self.tracker, &self.settings);
        if summary.evaluated > 0 {
            log::info!(
                "filter: {} evaluated, {} hidden, {} restored",
                summary.evaluated,
                summary.hidden,
                summary.restored
            );
        }
    }

    /// One full pass. Infallible by construction: every stage contains its
    /// own per-item failures, so a bad item can never stop future passes.
    pub async fn run_pass(&mut self) {
        self.passes += 1;
        log::debug!("pipeline pass #{} starting", self.passes);

        // synchronous section: sweep, filter, mark, claim
        let claims: Vec<Claim> = {
            let mut tree = self.tree.lock().await;
            self.tracker.sweep_detached(|id| tree.is_attached(id));

            let summary = filter::run(&mut tree, &mut self.tracker, &self.settings);
            if summary.hidden > 0 || summary.restored > 0 {
                log::info!(
                    "filter: {} evaluated, {} hidden, {} restored",
                    summary.evaluated,
                    summary.hidden,
                    summary.restored
                );
            }

            if self.scoring_active() {
                for item in tree.items() {
                    if tree.is_effectively_visible(item) {
                        self.tracker.mark_needs_scoring(item);
                    }
                }
                score::claim_batch(&tree, &mut self.tracker)
            } else {
                Vec::new()
            }
        };

        // concurrent section: embedding fan-out, fan-in before reorder
        let mut newly_scored = 0usize;
        if !claims.is_empty() {
            if let Some(profile) = self.profile.clone() {
                let results = score::score_batch(
                    claims,
                    self.embedder.clone(),
                    profile,
                    self.scoring_concurrency,
                )
                .await;
                for result in results {
                    if self.tracker.record_score(result.id, result.score) && result.embedded {
                        newly_scored += 1;
                    }
                }
            }
        }

        // reorder only when this pass produced new scores
        if newly_scored > 0 && self.scoring_active() {
            let mut tree = self.tree.lock().await;
            let outcome = reorder::run(&mut tree, &self.tracker);
            if outcome.moved > 0 {
                log::info!("reordered {} items", outcome.moved);
            }
        }

        log::debug!("pipeline pass #{} complete", self.passes);
    }
}
