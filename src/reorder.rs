//! Deterministic re-ranking of scored items within their container.
//!
//! Only the wrappers the engine explicitly selected are moved; hidden
//! items, separators and anything unscored keep their relative positions.
//! The sort is stable and descending, so re-running on an already-sorted
//! set changes nothing.

use crate::dom::{FeedTree, NodeId};
use crate::tracker::ItemTracker;

/// Containers recognized as the reorderable feed, in priority order.
const TIMELINE_LABELS: [&str; 5] = [
    "Timeline: Your Home Timeline",
    "Timeline: Search results",
    "Timeline: List tweets",
    "Timeline: Profile",
    "Timeline",
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub moved: usize,
}

/// First container matching the prioritized label list.
pub fn find_timeline_container(tree: &FeedTree) -> Option<NodeId> {
    TIMELINE_LABELS
        .iter()
        .find_map(|label| tree.find_attr_contains("aria-label", label))
}

/// Direct children of `container` wrapping exactly one visible, scored
/// item, paired with that item's score.
fn scored_wrappers(tree: &FeedTree, container: NodeId, tracker: &ItemTracker) -> Vec<(NodeId, f32)> {
    tree.children(container)
        .iter()
        .filter_map(|cell| {
            let scored: Vec<f32> = tree
                .items_within(*cell)
                .into_iter()
                .filter(|item| tree.is_effectively_visible(*item))
                .filter_map(|item| tracker.score(item))
                .collect();
            match scored.as_slice() {
                [score] => Some((*cell, *score)),
                _ => None,
            }
        })
        .collect()
}

/// Sort scored wrappers by score, descending, and re-splice them into the
/// container in one batch. Fewer than two candidates is a no-op.
pub fn run(tree: &mut FeedTree, tracker: &ItemTracker) -> ReorderOutcome {
    let Some(container) = find_timeline_container(tree) else {
        log::debug!("no timeline container found, skipping reorder");
        return ReorderOutcome::default();
    };

    let mut wrappers = scored_wrappers(tree, container, tracker);
    if wrappers.len() < 2 {
        return ReorderOutcome::default();
    }

    // stable: ties keep their input order
    wrappers.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let ordered: Vec<NodeId> = wrappers.iter().map(|(cell, _)| *cell).collect();
    tree.reorder_children(container, &ordered);

    log::debug!("reordered {} wrappers", ordered.len());
    ReorderOutcome {
        moved: ordered.len(),
    }
}
