//! Interest profile: the normalized mean embedding of the configured
//! keywords.

use super::embedder::{l2_norm, l2_normalize, Embedder, NORM_EPSILON};

/// Build a profile vector from keywords.
///
/// Each non-blank keyword is embedded independently; the first success
/// fixes the expected dimensionality and later mismatches are skipped with
/// a warning. Returns `None` when no keyword embeds. The returned vector is
/// freshly allocated every call — holders of a previous profile are never
/// affected by a rebuild.
pub async fn build_profile(embedder: &Embedder, keywords: &[String]) -> Option<Vec<f32>> {
    let mut accumulated: Option<Vec<f32>> = None;
    let mut successes = 0usize;

    for keyword in keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }

        let Some(embedding) = embedder.embed(keyword).await else {
            log::warn!("failed embedding for keyword {keyword:?}");
            continue;
        };

        match &mut accumulated {
            None => {
                accumulated = Some(embedding);
                successes = 1;
            }
            Some(sum) => {
                if embedding.len() != sum.len() {
                    log::warn!(
                        "keyword {keyword:?} embedding dimension mismatch: {} != {}",
                        embedding.len(),
                        sum.len()
                    );
                    continue;
                }
                for (accumulated_value, value) in sum.iter_mut().zip(embedding.iter()) {
                    *accumulated_value += value;
                }
                successes += 1;
            }
        }
    }

    let mut profile = accumulated?;
    for value in profile.iter_mut() {
        *value /= successes as f32;
    }
    if l2_norm(&profile) <= NORM_EPSILON {
        log::warn!("interest profile norm near zero");
    }
    l2_normalize(&mut profile);
    Some(profile)
}

/// Cosine similarity clamped to [-1, 1]. Mismatched or zero-norm inputs
/// score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a <= NORM_EPSILON || norm_b <= NORM_EPSILON {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
