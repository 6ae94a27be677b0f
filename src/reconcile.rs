//! Configuration reconciliation.
//!
//! New settings arrive asynchronously from the settings surface. The
//! reconciler diffs them against the current snapshot, invalidates only the
//! affected item state, and decides how urgently the next pass must run.

use std::sync::Arc;

use crate::config::FeedSettings;
use crate::pipeline::{FeedPipeline, SharedPipeline};
use crate::scheduler::Scheduler;

/// Classification of a settings change.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SettingsDelta {
    pub filter_changed: bool,
    pub reordering_toggled: bool,
    pub keywords_changed: bool,
}

impl SettingsDelta {
    pub fn between(old: &FeedSettings, new: &FeedSettings) -> Self {
        Self {
            filter_changed: old.filter_ads != new.filter_ads
                || old.flags_to_hide != new.flags_to_hide
                || old.words_to_hide != new.words_to_hide,
            reordering_toggled: old.enable_reordering != new.enable_reordering,
            keywords_changed: old.interest_keywords != new.interest_keywords,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.filter_changed && !self.reordering_toggled && !self.keywords_changed
    }
}

/// How the scheduler should follow up on an applied change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassRequest {
    None,
    Debounced,
    Immediate,
}

/// Install new settings and reconcile pipeline state with them.
///
/// Filter-affecting changes re-run the filter stage right here, ahead of
/// any scheduled pass, so stale hides never outlive the settings that
/// caused them. Returns the urgency of the follow-up pass; arming it is the
/// caller's concern (the [`Reconciler`] wires this to a scheduler, the CLI
/// runs the pass inline).
pub async fn apply_settings(pipeline: &mut FeedPipeline, new: FeedSettings) -> PassRequest {
    let delta = SettingsDelta::between(&pipeline.settings, &new);
    pipeline.settings = new;

    if delta.is_empty() {
        return PassRequest::None;
    }
    log::info!(
        "settings updated (filter: {}, reorder toggle: {}, keywords: {})",
        delta.filter_changed,
        delta.reordering_toggled,
        delta.keywords_changed
    );

    if delta.filter_changed {
        pipeline.tracker.invalidate_filtered();
        pipeline.run_filter_stage().await;
    }

    let reordering_on = pipeline.settings.enable_reordering;
    if reordering_on && (delta.reordering_toggled || delta.keywords_changed) {
        pipeline.embedder.ensure_ready().await;
        if !pipeline.embedder.is_ready() {
            log::warn!("reordering requested but embedding engine is unavailable");
            return if delta.filter_changed {
                PassRequest::Debounced
            } else {
                PassRequest::None
            };
        }

        pipeline.rebuild_profile().await;
        if pipeline.profile.is_some() {
            // every currently visible item gets rescored against the new
            // profile; in-flight scores against the old one become stale
            let tree = pipeline.tree.clone();
            let tree = tree.lock().await;
            for item in tree.items() {
                if tree.is_effectively_visible(item) {
                    pipeline.tracker.rearm_for_scoring(item);
                }
            }
        }
        return PassRequest::Immediate;
    }

    if delta.reordering_toggled {
        // reordering switched off: drop the profile and scoring state but
        // leave the current order in place (restoring the original feed
        // order is intentionally not attempted)
        pipeline.profile = None;
        pipeline.tracker.clear_scoring();
    }

    if delta.filter_changed {
        PassRequest::Debounced
    } else {
        PassRequest::None
    }
}

/// External-facing reconciler: applies a settings push and arms the
/// scheduler accordingly.
pub struct Reconciler {
    pipeline: SharedPipeline,
    scheduler: Arc<Scheduler>,
}

impl Reconciler {
    pub fn new(pipeline: SharedPipeline, scheduler: Arc<Scheduler>) -> Self {
        Self {
            pipeline,
            scheduler,
        }
    }

    pub async fn apply(&self, new: FeedSettings) {
        let request = {
            let mut pipeline = self.pipeline.lock().await;
            apply_settings(&mut pipeline, new).await
        };
        match request {
            PassRequest::None => {}
            PassRequest::Debounced => self.scheduler.arm(false),
            PassRequest::Immediate => self.scheduler.arm(true),
        }
    }
}
