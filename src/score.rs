//! Relevance scoring: embed each claimed item and compare it against the
//! interest profile.
//!
//! Claiming is a single synchronous sweep that also snapshots each item's
//! text, so the concurrent part of the step touches no shared tree or
//! tracker state. The fan-out is bounded and the step completes only when
//! every task has finished.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::dom::{FeedTree, NodeId, BODY_TEXT_TEST_ID};
use crate::embedding::{cosine_similarity, Embedder};
use crate::tracker::ItemTracker;

/// Score recorded when an item's text cannot be embedded: ranks below any
/// real similarity.
pub const UNSCORABLE_SCORE: f32 = -1.0;

/// One claimed item with its text snapshot.
pub struct Claim {
    pub id: NodeId,
    pub text: String,
}

/// One finished scoring task.
pub struct ScoredItem {
    pub id: NodeId,
    pub score: f32,
    /// Whether an embedding was actually computed
    pub embedded: bool,
}

/// Item body text used for scoring: the dedicated text subtree when
/// present, the whole item otherwise.
pub fn item_text(tree: &FeedTree, item: NodeId) -> String {
    match tree.find_test_id_within(item, BODY_TEXT_TEST_ID) {
        Some(body) => tree.text(body),
        None => {
            log::debug!("no body text subtree for {item:?}, using full item text");
            tree.text(item)
        }
    }
}

/// Claim every scorable queued item. Runs synchronously between the filter
/// stage and the fan-out; after this sweep no overlapping pass can pick up
/// the same items.
pub fn claim_batch(tree: &FeedTree, tracker: &mut ItemTracker) -> Vec<Claim> {
    let mut claims = Vec::new();
    for id in tracker.needs_scoring_ids() {
        if !tree.is_attached(id) || !tree.is_effectively_visible(id) {
            continue;
        }
        if tracker.claim_for_scoring(id) {
            claims.push(Claim {
                id,
                text: item_text(tree, id),
            });
        }
    }
    claims
}

/// Embed and score all claims concurrently (at most `concurrency` tasks in
/// flight), returning once every task is done.
pub async fn score_batch(
    claims: Vec<Claim>,
    embedder: Arc<Embedder>,
    profile: Arc<Vec<f32>>,
    concurrency: usize,
) -> Vec<ScoredItem> {
    let total = claims.len();
    let results: Vec<ScoredItem> = stream::iter(claims.into_iter().map(|claim| {
        let embedder = embedder.clone();
        let profile = profile.clone();
        async move {
            match embedder.embed(&claim.text).await {
                Some(embedding) => ScoredItem {
                    id: claim.id,
                    score: cosine_similarity(&profile, &embedding),
                    embedded: true,
                },
                None => ScoredItem {
                    id: claim.id,
                    score: UNSCORABLE_SCORE,
                    embedded: false,
                },
            }
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let embedded = results.iter().filter(|r| r.embedded).count();
    log::debug!("scored {embedded} / {total} items");
    results
}
