use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;

use crate::error::AppResult;
use crate::models::{FeedbackLabel, UserProfile};
use crate::providers::VectorStore;

/// Rebuilds a user's taste profile from its feedback sets
///
/// Every update recomputes `taste_vector` from scratch as the mean of the
/// currently-liked embeddings. Full recomputation over incremental drift is
/// deliberate: the resulting vector is independent of the order feedback
/// arrived in.
#[derive(Clone)]
pub struct ProfileBuilder {
    store: Arc<dyn VectorStore>,
    brand_min_count: usize,
}

impl ProfileBuilder {
    pub fn new(store: Arc<dyn VectorStore>, brand_min_count: usize) -> Self {
        Self {
            store,
            brand_min_count,
        }
    }

    /// Applies one feedback label and rebuilds the derived fields
    ///
    /// An item whose embedding cannot be looked up still lands in the
    /// like/dislike set; it just sits out of the taste vector until a later
    /// rebuild finds it.
    pub async fn apply_feedback(
        &self,
        mut profile: UserProfile,
        item_id: &str,
        label: FeedbackLabel,
    ) -> AppResult<UserProfile> {
        profile.record(item_id, label);
        self.rebuild(&mut profile).await;
        profile.updated_at = Utc::now();
        Ok(profile)
    }

    /// Recomputes `taste_vector` and `preferred_brands` from `liked_ids`
    async fn rebuild(&self, profile: &mut UserProfile) {
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(profile.liked_ids.len());
        let mut brand_counts: BTreeMap<String, usize> = BTreeMap::new();

        for id in &profile.liked_ids {
            match self.store.get_item(id).await {
                Ok(Some(item)) => {
                    *brand_counts.entry(item.brand).or_default() += 1;
                    if item.embedding.is_empty() {
                        tracing::warn!(item_id = %id, "liked item has no embedding, skipping");
                    } else {
                        embeddings.push(item.embedding);
                    }
                }
                Ok(None) => {
                    tracing::warn!(item_id = %id, "liked item not found in store, skipping");
                }
                Err(e) => {
                    tracing::warn!(item_id = %id, error = %e, "embedding lookup failed, skipping");
                }
            }
        }

        profile.taste_vector = mean_embedding(&embeddings);
        profile.preferred_brands =
            preferred_brands(&brand_counts, profile.liked_ids.len(), self.brand_min_count);
    }
}

/// Elementwise mean of the given embeddings
///
/// Vectors that disagree with the first one's dimension are skipped; mixing
/// dimensions would silently corrupt the centroid.
fn mean_embedding(embeddings: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = embeddings.first()?.len();
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;

    for embedding in embeddings {
        if embedding.len() != dim {
            tracing::warn!(
                expected = dim,
                actual = embedding.len(),
                "embedding dimension mismatch, skipping"
            );
            continue;
        }
        for (acc, value) in sum.iter_mut().zip(embedding) {
            *acc += value;
        }
        count += 1;
    }

    Some(sum.into_iter().map(|acc| acc / count as f32).collect())
}

/// Brands a user has shown repeated affinity for
///
/// A brand qualifies with `min_count` occurrences among liked items. A user
/// with only one liked item has no chance of repeats, so their single most
/// frequent brand qualifies instead (ties to the lexicographically smallest).
fn preferred_brands(
    counts: &BTreeMap<String, usize>,
    liked_count: usize,
    min_count: usize,
) -> BTreeSet<String> {
    if liked_count == 0 {
        return BTreeSet::new();
    }

    if liked_count < 2 {
        let mut best: Option<(&String, usize)> = None;
        for (brand, count) in counts {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((brand, *count));
            }
        }
        return best.map(|(brand, _)| brand.clone()).into_iter().collect();
    }

    counts
        .iter()
        .filter(|(_, count)| **count >= min_count)
        .map(|(brand, _)| brand.clone())
        .collect()
}
