//! Out-of-band item state, keyed by node identity.
//!
//! Pipeline position of every observed item lives here rather than on the
//! tree itself. All transitions are idempotent, so a pass triggered by an
//! unrelated mutation never redoes finished work, and `claim_for_scoring`
//! moves an item out of `NeedsScoring` in one synchronous step so two
//! overlapping passes cannot both pick it up.

use std::collections::HashMap;
use std::fmt;

use crate::dom::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HiddenReason {
    Ad,
    BlockedFlag,
    BlockedWord,
}

impl fmt::Display for HiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HiddenReason::Ad => write!(f, "ad"),
            HiddenReason::BlockedFlag => write!(f, "blocked-flag"),
            HiddenReason::BlockedWord => write!(f, "blocked-word"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ItemState {
    /// Not yet evaluated by the filter stage
    Unprocessed,
    /// Hidden by the filter stage
    Hidden(HiddenReason),
    /// Passed the filter stage
    Visible,
    /// Eligible for scoring, not yet claimed
    NeedsScoring,
    /// Claimed by an in-flight scoring task
    Scoring,
    /// Scored against the current interest profile
    Scored(f32),
}

#[derive(Default)]
pub struct ItemTracker {
    states: HashMap<NodeId, ItemState>,
}

impl ItemTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: NodeId) -> ItemState {
        self.states
            .get(&id)
            .copied()
            .unwrap_or(ItemState::Unprocessed)
    }

    pub fn score(&self, id: NodeId) -> Option<f32> {
        match self.state(id) {
            ItemState::Scored(score) => Some(score),
            _ => None,
        }
    }

    pub fn mark_hidden(&mut self, id: NodeId, reason: HiddenReason) {
        self.states.insert(id, ItemState::Hidden(reason));
    }

    /// Record a filter pass. Scoring-related states are left alone; an item
    /// that already advanced past `Visible` stays where it is.
    pub fn mark_visible(&mut self, id: NodeId) {
        match self.state(id) {
            ItemState::Unprocessed | ItemState::Hidden(_) => {
                self.states.insert(id, ItemState::Visible);
            }
            _ => {}
        }
    }

    /// `Visible → NeedsScoring`. A no-op for items that are hidden, already
    /// queued, claimed, or scored.
    pub fn mark_needs_scoring(&mut self, id: NodeId) {
        if self.state(id) == ItemState::Visible {
            self.states.insert(id, ItemState::NeedsScoring);
        }
    }

    /// Force an item back into the scoring queue regardless of how far it
    /// had advanced. Used by the reconciler after a profile change; a claim
    /// already in flight loses to this (its `record_score` will not apply).
    pub fn rearm_for_scoring(&mut self, id: NodeId) {
        match self.state(id) {
            ItemState::Visible
            | ItemState::NeedsScoring
            | ItemState::Scoring
            | ItemState::Scored(_) => {
                self.states.insert(id, ItemState::NeedsScoring);
            }
            ItemState::Unprocessed | ItemState::Hidden(_) => {}
        }
    }

    /// `NeedsScoring → Scoring`. Returns false if the item was not claimable,
    /// which also covers an item already claimed by an overlapping pass.
    pub fn claim_for_scoring(&mut self, id: NodeId) -> bool {
        if self.state(id) == ItemState::NeedsScoring {
            self.states.insert(id, ItemState::Scoring);
            true
        } else {
            false
        }
    }

    /// `Scoring → Scored`. Returns false when the result is stale: the item
    /// was re-armed, re-filtered, or removed while the task was in flight,
    /// and the later marking wins.
    pub fn record_score(&mut self, id: NodeId, score: f32) -> bool {
        if self.state(id) == ItemState::Scoring {
            self.states.insert(id, ItemState::Scored(score));
            true
        } else {
            log::debug!("discarding stale score for {:?}", id);
            false
        }
    }

    /// All items currently queued for scoring.
    pub fn needs_scoring_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .states
            .iter()
            .filter(|(_, s)| **s == ItemState::NeedsScoring)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Filter-affecting configuration changed: every previously filtered
    /// item must be re-derived from scratch.
    pub fn invalidate_filtered(&mut self) {
        for state in self.states.values_mut() {
            *state = ItemState::Unprocessed;
        }
    }

    /// Reordering was disabled: strip scoring-related state but keep the
    /// filter verdicts.
    pub fn clear_scoring(&mut self) {
        for state in self.states.values_mut() {
            if matches!(
                state,
                ItemState::NeedsScoring | ItemState::Scoring | ItemState::Scored(_)
            ) {
                *state = ItemState::Visible;
            }
        }
    }

    /// Drop state for items no longer in the tree.
    pub fn sweep_detached(&mut self, mut is_attached: impl FnMut(NodeId) -> bool) {
        self.states.retain(|id, _| is_attached(*id));
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
