//! Embedding pipeline and interest profile behavior over a mock backend.

use std::sync::Arc;

use crate::embedding::{build_profile, cosine_similarity, Embedder, NORM_EPSILON};
use crate::tests::support::MockBackend;

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

#[tokio::test]
async fn test_embeddings_are_normalized() {
    let backend = Arc::new(MockBackend::new().with_vector("hello", &[3.0, 4.0, 0.0]));
    let embedder = Embedder::with_backend(backend);

    let vector = embedder.embed("hello").await.unwrap();
    assert!((norm(&vector) - 1.0).abs() < 1e-5);
    assert!((vector[0] - 0.6).abs() < 1e-5);
    assert!((vector[1] - 0.8).abs() < 1e-5);
}

#[tokio::test]
async fn test_blank_text_embeds_to_none() {
    let backend = Arc::new(MockBackend::new().with_vector("", &[1.0, 0.0]));
    let embedder = Embedder::with_backend(backend);
    assert!(embedder.embed("").await.is_none());
    assert!(embedder.embed("   \n\t").await.is_none());
}

#[tokio::test]
async fn test_inference_failure_embeds_to_none() {
    let backend = Arc::new(MockBackend::new());
    let embedder = Embedder::with_backend(backend);
    assert!(embedder.embed("unknown text").await.is_none());
}

#[tokio::test]
async fn test_profile_is_normalized_mean() {
    let backend = Arc::new(
        MockBackend::new()
            .with_vector("a", &[1.0, 0.0, 0.0])
            .with_vector("b", &[0.0, 1.0, 0.0]),
    );
    let embedder = Embedder::with_backend(backend);

    let profile = build_profile(&embedder, &["a".to_string(), "b".to_string()])
        .await
        .unwrap();

    // normalized average of the two unit vectors
    let expected = 1.0 / 2f32.sqrt();
    assert!((profile[0] - expected).abs() < 1e-5);
    assert!((profile[1] - expected).abs() < 1e-5);
    assert!(profile[2].abs() < 1e-5);
    assert!((norm(&profile) - 1.0).abs() < NORM_EPSILON);
}

#[tokio::test]
async fn test_profile_skips_blank_and_failed_keywords() {
    let backend = Arc::new(MockBackend::new().with_vector("rust", &[0.0, 1.0]));
    let embedder = Embedder::with_backend(backend);

    let keywords = vec![
        "  ".to_string(),
        "rust".to_string(),
        "unembeddable".to_string(),
    ];
    let profile = build_profile(&embedder, &keywords).await.unwrap();
    assert_eq!(profile, vec![0.0, 1.0]);
}

#[tokio::test]
async fn test_profile_skips_dimension_mismatch() {
    let backend = Arc::new(
        MockBackend::new()
            .with_vector("first", &[1.0, 0.0, 0.0])
            .with_vector("odd", &[1.0, 0.0]),
    );
    let embedder = Embedder::with_backend(backend);

    let profile = build_profile(&embedder, &["first".to_string(), "odd".to_string()])
        .await
        .unwrap();
    assert_eq!(profile.len(), 3);
    assert!((profile[0] - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_profile_none_when_nothing_embeds() {
    let backend = Arc::new(MockBackend::new());
    let embedder = Embedder::with_backend(backend);

    assert!(build_profile(&embedder, &[]).await.is_none());
    assert!(build_profile(&embedder, &["nope".to_string()])
        .await
        .is_none());
}

#[tokio::test]
async fn test_rebuild_does_not_mutate_previous_profile() {
    let backend = Arc::new(
        MockBackend::new()
            .with_vector("a", &[1.0, 0.0])
            .with_vector("b", &[0.0, 1.0]),
    );
    let embedder = Embedder::with_backend(backend);

    let first = build_profile(&embedder, &["a".to_string()]).await.unwrap();
    let snapshot = first.clone();
    let second = build_profile(&embedder, &["b".to_string()]).await.unwrap();

    assert_eq!(first, snapshot);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_scores_follow_similarity() {
    let backend = Arc::new(
        MockBackend::new()
            .with_vector("profile", &[1.0, 0.0])
            .with_vector("close", &[0.9, 0.43589])
            .with_vector("far", &[-1.0, 0.0]),
    );
    let embedder = Embedder::with_backend(backend);

    let profile = build_profile(&embedder, &["profile".to_string()])
        .await
        .unwrap();
    let close = embedder.embed("close").await.unwrap();
    let far = embedder.embed("far").await.unwrap();

    let close_score = cosine_similarity(&profile, &close);
    let far_score = cosine_similarity(&profile, &far);
    assert!(close_score > 0.8);
    assert!((far_score + 1.0).abs() < 1e-5);
}
