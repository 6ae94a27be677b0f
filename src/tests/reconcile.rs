//! Settings reconciliation: minimal invalidation and immediate filtering.

use std::sync::Arc;

use crate::config::{EmbeddingConfig, FeedSettings};
use crate::dom::NodeId;
use crate::embedding::Embedder;
use crate::pipeline::{FeedPipeline, SharedTree};
use crate::reconcile::{apply_settings, PassRequest};
use crate::tests::support::{build_feed, share, MockBackend};
use crate::tracker::{HiddenReason, ItemState};

fn backend() -> Arc<MockBackend> {
    Arc::new(
        MockBackend::new()
            .with_vector("rust", &[1.0, 0.0])
            .with_vector("alpha body", &[0.9, 0.435_89])
            .with_vector("beta body", &[0.1, 0.994_987_4]),
    )
}

fn pipeline_with(
    settings: FeedSettings,
    backend: Arc<MockBackend>,
) -> (FeedPipeline, SharedTree, Vec<NodeId>, Vec<NodeId>) {
    let feed = build_feed(&[("Alice", "alpha body"), ("Bob", "beta body")]);
    let cells = feed.cells.clone();
    let items = feed.items.clone();
    let tree = share(feed.tree);
    let embedder = Arc::new(Embedder::with_backend(backend));
    let pipeline = FeedPipeline::new(tree.clone(), settings, embedder, 4);
    (pipeline, tree, cells, items)
}

#[tokio::test]
async fn test_removing_blocked_word_restores_item() {
    let mut settings = FeedSettings::default();
    settings.words_to_hide = vec!["bob".to_string()];
    let (mut pipeline, tree, _, items) = pipeline_with(settings.clone(), backend());

    pipeline.run_pass().await;
    assert!(tree.lock().await.is_hidden(items[1]));

    settings.words_to_hide.clear();
    let request = apply_settings(&mut pipeline, settings).await;

    // the filter re-ran immediately, no scheduled pass needed for visibility
    assert_eq!(request, PassRequest::Debounced);
    assert!(!tree.lock().await.is_hidden(items[1]));
    assert_eq!(pipeline.tracker().state(items[1]), ItemState::Visible);
}

#[tokio::test]
async fn test_reordering_only_change_keeps_filter_state() {
    let mut settings = FeedSettings::default();
    settings.words_to_hide = vec!["bob".to_string()];
    let (mut pipeline, tree, _, items) = pipeline_with(settings.clone(), backend());
    pipeline.run_pass().await;
    assert_eq!(
        pipeline.tracker().state(items[1]),
        ItemState::Hidden(HiddenReason::BlockedWord)
    );

    settings.enable_reordering = true;
    settings.interest_keywords = vec!["rust".to_string()];
    let request = apply_settings(&mut pipeline, settings).await;
    assert_eq!(request, PassRequest::Immediate);

    // the hidden item survived the reordering-only change untouched
    assert_eq!(
        pipeline.tracker().state(items[1]),
        ItemState::Hidden(HiddenReason::BlockedWord)
    );
    assert!(tree.lock().await.is_hidden(items[1]));
    // the visible item was queued for scoring
    assert_eq!(pipeline.tracker().state(items[0]), ItemState::NeedsScoring);
}

#[tokio::test]
async fn test_disable_reordering_strips_scores_and_keeps_order() {
    let settings = FeedSettings {
        enable_reordering: true,
        interest_keywords: vec!["rust".to_string()],
        ..FeedSettings::default()
    };
    let (mut pipeline, tree, cells, items) = pipeline_with(settings.clone(), backend());
    pipeline.ensure_scoring_ready().await;
    pipeline.run_pass().await;

    let sorted_order: Vec<_> = {
        let tree = tree.lock().await;
        let container = crate::reorder::find_timeline_container(&tree).unwrap();
        tree.children(container).to_vec()
    };
    assert_eq!(sorted_order, vec![cells[0], cells[1]]);
    assert!(pipeline.tracker().score(items[0]).is_some());

    let mut disabled = settings.clone();
    disabled.enable_reordering = false;
    let request = apply_settings(&mut pipeline, disabled).await;
    assert_eq!(request, PassRequest::None);

    assert!(pipeline.profile().is_none());
    assert_eq!(pipeline.tracker().state(items[0]), ItemState::Visible);
    assert_eq!(pipeline.tracker().state(items[1]), ItemState::Visible);

    // order is intentionally left as-is
    let tree = tree.lock().await;
    let container = crate::reorder::find_timeline_container(&tree).unwrap();
    assert_eq!(tree.children(container), sorted_order.as_slice());
}

#[tokio::test]
async fn test_reenable_triggers_full_rescore() {
    let backend = backend();
    let settings = FeedSettings {
        enable_reordering: true,
        interest_keywords: vec!["rust".to_string()],
        ..FeedSettings::default()
    };
    let (mut pipeline, _tree, _, items) = pipeline_with(settings.clone(), backend.clone());
    pipeline.ensure_scoring_ready().await;
    pipeline.run_pass().await;
    let calls_after_first = backend.calls();

    let mut disabled = settings.clone();
    disabled.enable_reordering = false;
    apply_settings(&mut pipeline, disabled).await;

    // re-enable with the same keywords: stale scores must not be reused
    let request = apply_settings(&mut pipeline, settings).await;
    assert_eq!(request, PassRequest::Immediate);
    assert_eq!(pipeline.tracker().state(items[0]), ItemState::NeedsScoring);

    pipeline.run_pass().await;
    assert!(backend.calls() > calls_after_first);
    assert!(pipeline.tracker().score(items[0]).is_some());
}

#[tokio::test]
async fn test_keyword_change_rearms_scored_items() {
    let backend = Arc::new(
        MockBackend::new()
            .with_vector("rust", &[1.0, 0.0])
            .with_vector("cooking", &[0.0, 1.0])
            .with_vector("alpha body", &[0.9, 0.435_89])
            .with_vector("beta body", &[0.1, 0.994_987_4]),
    );
    let settings = FeedSettings {
        enable_reordering: true,
        interest_keywords: vec!["rust".to_string()],
        ..FeedSettings::default()
    };
    let (mut pipeline, tree, cells, items) = pipeline_with(settings.clone(), backend.clone());
    pipeline.ensure_scoring_ready().await;
    pipeline.run_pass().await;

    let first_score = pipeline.tracker().score(items[0]).unwrap();
    assert!(first_score > 0.8);

    let mut retargeted = settings.clone();
    retargeted.interest_keywords = vec!["cooking".to_string()];
    let request = apply_settings(&mut pipeline, retargeted).await;
    assert_eq!(request, PassRequest::Immediate);

    pipeline.run_pass().await;
    // against the cooking profile, beta outranks alpha
    let alpha = pipeline.tracker().score(items[0]).unwrap();
    let beta = pipeline.tracker().score(items[1]).unwrap();
    assert!(beta > alpha);
    let tree = tree.lock().await;
    let container = crate::reorder::find_timeline_container(&tree).unwrap();
    assert_eq!(tree.children(container), &[cells[1], cells[0]]);
}

#[tokio::test]
async fn test_unavailable_engine_degrades_gracefully() {
    let feed = build_feed(&[("Alice", "alpha body")]);
    let items = feed.items.clone();
    let tree = share(feed.tree);
    // a real embedder pointed at nothing: init fails and stays failed
    let embedder = Arc::new(Embedder::new(EmbeddingConfig {
        model_path: "/nonexistent/model.onnx".to_string(),
        tokenizer_path: "/nonexistent/tokenizer.json".to_string(),
        max_sequence_length: 128,
    }));
    let mut pipeline =
        FeedPipeline::new(tree.clone(), FeedSettings::default(), embedder, 4);
    pipeline.run_pass().await;

    let enabled = FeedSettings {
        enable_reordering: true,
        interest_keywords: vec!["rust".to_string()],
        ..FeedSettings::default()
    };
    let request = apply_settings(&mut pipeline, enabled).await;
    assert_eq!(request, PassRequest::None);
    assert!(pipeline.profile().is_none());

    // filtering still works after the failed enable
    pipeline.run_pass().await;
    assert_eq!(pipeline.tracker().state(items[0]), ItemState::Visible);
}
