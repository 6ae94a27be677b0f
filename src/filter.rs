//! Synchronous, rule-based accept/reject per item.
//!
//! Evaluated in order, short-circuiting on the first match:
//! 1. promoted-content detection (explicit markers, then exact "Ad" /
//!    "Promoted" label spans)
//! 2. blocked flags and words against the display name
//!
//! Verdicts are fully re-derivable from the current settings: the stage
//! only looks at `Unprocessed` items, and the reconciler resets items to
//! `Unprocessed` when filter-affecting settings change, so an item hidden
//! under an old configuration is restored rather than left stuck.

use regex::Regex;

use crate::config::FeedSettings;
use crate::dom::{FeedTree, NodeId, USERNAME_TEST_ID};
use crate::tracker::{HiddenReason, ItemState, ItemTracker};

/// Labels that identify promoted content when they are the entire visible
/// text of a span. Exact match only; "Adaptive" must not trigger.
const AD_LABELS: [&str; 2] = ["Ad", "Promoted"];

const PROMOTED_HREF_FRAGMENT: &str = "/i/promoted/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOutcome {
    Hide(HiddenReason),
    Pass,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub evaluated: usize,
    pub hidden: usize,
    pub restored: usize,
}

/// Match one configured block entry against a display name.
///
/// Entries of the form `r/…/` are regular expressions; anything else is
/// case-insensitive substring containment. A malformed pattern is skipped
/// with a warning so one bad entry cannot fail the pass.
fn entry_matches(entry: &str, name: &str) -> bool {
    if entry.starts_with("r/") && entry.ends_with('/') && entry.len() > 3 {
        let mut pattern_chars = entry.chars();

        // remove prefix and postfix
        pattern_chars.next();
        pattern_chars.next();
        pattern_chars.next_back();

        match Regex::new(pattern_chars.as_str()) {
            Ok(regex) => regex.is_match(name),
            Err(error) => {
                log::warn!("skipping malformed block pattern {entry:?}: {error}");
                false
            }
        }
    } else {
        name.contains(&entry.to_lowercase())
    }
}

/// Lower-cased display name of an item: the first span under the username
/// subtree, falling back to the whole subtree's text.
fn display_name(tree: &FeedTree, item: NodeId) -> Option<String> {
    let username = tree.find_test_id_within(item, USERNAME_TEST_ID)?;
    let name = tree
        .descendants(username)
        .into_iter()
        .find(|d| tree.tag(*d) == Some("span"))
        .map(|span| tree.text(span))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| tree.text(username));
    Some(name.to_lowercase())
}

fn is_promoted(tree: &FeedTree, item: NodeId) -> bool {
    for node in tree.descendants(item) {
        match tree.test_id(node) {
            Some("promotedIndicator") => return true,
            Some("socialContext") => {
                let text = tree.text(node);
                if text.contains("Promoted") || text == "Ad" {
                    return true;
                }
            }
            _ => {}
        }
        if tree.tag(node) == Some("a")
            && matches!(tree.attr(node, "href"), Some(href) if href.contains(PROMOTED_HREF_FRAGMENT))
        {
            return true;
        }
    }
    // no explicit marker; look for an exact-match label span
    tree.descendants(item).into_iter().any(|node| {
        tree.tag(node) == Some("span") && AD_LABELS.contains(&tree.text(node).as_str())
    })
}

/// Evaluate one item against the current settings.
pub fn evaluate(tree: &FeedTree, item: NodeId, settings: &FeedSettings) -> FilterOutcome {
    if settings.filter_ads && is_promoted(tree, item) {
        return FilterOutcome::Hide(HiddenReason::Ad);
    }

    if !settings.flags_to_hide.is_empty() || !settings.words_to_hide.is_empty() {
        if let Some(name) = display_name(tree, item) {
            if settings
                .flags_to_hide
                .iter()
                .any(|flag| !flag.is_empty() && entry_matches(flag, &name))
            {
                return FilterOutcome::Hide(HiddenReason::BlockedFlag);
            }
            if settings
                .words_to_hide
                .iter()
                .any(|word| !word.is_empty() && entry_matches(word, &name))
            {
                return FilterOutcome::Hide(HiddenReason::BlockedWord);
            }
        }
    }

    FilterOutcome::Pass
}

/// Run the filter stage over every unprocessed item, applying visibility
/// and recording the verdict. Items hidden here lose any scoring state;
/// items that pass are unhidden (restoring ones hidden under a previous
/// configuration).
pub fn run(tree: &mut FeedTree, tracker: &mut ItemTracker, settings: &FeedSettings) -> FilterSummary {
    let mut summary = FilterSummary::default();

    for item in tree.items() {
        if tracker.state(item) != ItemState::Unprocessed {
            continue;
        }
        summary.evaluated += 1;

        match evaluate(tree, item, settings) {
            FilterOutcome::Hide(reason) => {
                tree.set_hidden(item, true);
                tracker.mark_hidden(item, reason);
                summary.hidden += 1;
                log::debug!("hiding item {item:?}: {reason}");
            }
            FilterOutcome::Pass => {
                if tree.is_hidden(item) {
                    summary.restored += 1;
                    log::debug!("restoring item {item:?}");
                }
                tree.set_hidden(item, false);
                tracker.mark_visible(item);
            }
        }
    }

    summary
}
