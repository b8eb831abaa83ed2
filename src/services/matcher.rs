use crate::models::{Item, ScoredItem, UserProfile};

/// Cosine similarity between two vectors
///
/// Zero-length, mismatched, or all-zero vectors score 0.0 rather than NaN,
/// which would poison every downstream comparison.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Scores and ranks candidate items against a taste profile
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    /// Additive bonus for items whose brand the user already favors.
    /// A soft boost, never a filter: strong matches from unknown brands
    /// still surface.
    brand_boost: f32,
}

impl Matcher {
    pub fn new(brand_boost: f32) -> Self {
        Self { brand_boost }
    }

    /// Ranks `candidates` for the given profile, best match first
    ///
    /// Disliked items are dropped outright when `exclude_seen` is set. A
    /// cold-start profile (no taste vector) falls back to recency ordering
    /// instead of failing. Ties break on item id ascending so equal scores
    /// rank deterministically.
    pub fn rank(
        &self,
        profile: &UserProfile,
        candidates: &[Item],
        exclude_seen: bool,
        top_k: usize,
    ) -> Vec<ScoredItem> {
        let eligible = candidates
            .iter()
            .filter(|item| !(exclude_seen && profile.disliked_ids.contains(&item.id)));

        let mut ranked: Vec<ScoredItem> = match &profile.taste_vector {
            Some(taste) => eligible
                .map(|item| {
                    let mut score = cosine_similarity(taste, &item.embedding);
                    if profile.preferred_brands.contains(&item.brand) {
                        score += self.brand_boost;
                    }
                    ScoredItem {
                        item: item.clone(),
                        score,
                    }
                })
                .collect(),
            // Cold start: no positive feedback yet, so similarity is
            // undefined. Newest items first.
            None => {
                let mut items: Vec<&Item> = eligible.collect();
                items.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then_with(|| a.id.cmp(&b.id))
                });
                items.truncate(top_k);
                return items
                    .into_iter()
                    .map(|item| ScoredItem {
                        item: item.clone(),
                        score: 0.0,
                    })
                    .collect();
            }
        };

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        ranked.truncate(top_k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedbackLabel;
    use chrono::{Duration, Utc};

    fn item(id: &str, brand: &str, embedding: Vec<f32>, age_secs: i64) -> Item {
        Item {
            id: id.to_string(),
            text: format!("item {}", id),
            brand: brand.to_string(),
            embedding,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    fn profile_with_taste(taste: Vec<f32>) -> UserProfile {
        let mut profile = UserProfile::new("ada@example.com");
        profile.liked_ids.insert("seed".to_string());
        profile.taste_vector = Some(taste);
        profile
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_by_similarity() {
        let matcher = Matcher::new(0.1);
        let profile = profile_with_taste(vec![1.0, 0.0]);
        let candidates = vec![
            item("far", "Acme", vec![0.0, 1.0], 0),
            item("near", "Acme", vec![1.0, 0.1], 0),
        ];

        let ranked = matcher.rank(&profile, &candidates, true, 10);
        let ids: Vec<&str> = ranked.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
    }

    #[test]
    fn test_brand_boost_reorders_close_scores() {
        // Pre-boost: Nike 0.9, Adidas 0.85. The 0.1 boost lifts Adidas to
        // 0.95, ahead of Nike.
        let matcher = Matcher::new(0.1);
        let mut profile = profile_with_taste(vec![1.0, 0.0]);
        profile.preferred_brands.insert("Adidas".to_string());

        let candidates = vec![
            item("p1", "Nike", vec![0.9, 0.435_89], 0),
            item("p2", "Adidas", vec![0.85, 0.526_78], 0),
        ];

        let ranked = matcher.rank(&profile, &candidates, true, 10);
        assert_eq!(ranked[0].item.id, "p2");
        assert!((ranked[0].score - 0.95).abs() < 1e-3);
        assert_eq!(ranked[1].item.id, "p1");
        assert!((ranked[1].score - 0.9).abs() < 1e-3);
    }

    #[test]
    fn test_boost_is_soft_not_a_filter() {
        let matcher = Matcher::new(0.1);
        let mut profile = profile_with_taste(vec![1.0, 0.0]);
        profile.preferred_brands.insert("Adidas".to_string());

        // A much better match from an unlisted brand still wins.
        let candidates = vec![
            item("great", "Nike", vec![1.0, 0.0], 0),
            item("weak", "Adidas", vec![0.1, 0.99], 0),
        ];

        let ranked = matcher.rank(&profile, &candidates, true, 10);
        assert_eq!(ranked[0].item.id, "great");
    }

    #[test]
    fn test_disliked_items_never_surface() {
        let matcher = Matcher::new(0.1);
        let mut profile = profile_with_taste(vec![1.0, 0.0]);
        profile.record("perfect", FeedbackLabel::Dislike);

        // Disliked item has the highest raw similarity and is still dropped.
        let candidates = vec![
            item("perfect", "Acme", vec![1.0, 0.0], 0),
            item("other", "Acme", vec![0.5, 0.5], 0),
        ];

        let ranked = matcher.rank(&profile, &candidates, true, 10);
        let ids: Vec<&str> = ranked.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["other"]);
    }

    #[test]
    fn test_exclude_seen_false_keeps_disliked() {
        let matcher = Matcher::new(0.1);
        let mut profile = profile_with_taste(vec![1.0, 0.0]);
        profile.record("perfect", FeedbackLabel::Dislike);

        let candidates = vec![item("perfect", "Acme", vec![1.0, 0.0], 0)];
        let ranked = matcher.rank(&profile, &candidates, false, 10);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_cold_start_falls_back_to_recency() {
        let matcher = Matcher::new(0.1);
        let profile = UserProfile::new("fresh@example.com");

        let candidates = vec![
            item("oldest", "Acme", vec![1.0, 0.0], 600),
            item("newest", "Acme", vec![0.0, 1.0], 0),
            item("middle", "Acme", vec![0.5, 0.5], 300),
        ];

        let ranked = matcher.rank(&profile, &candidates, true, 10);
        let ids: Vec<&str> = ranked.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
        assert!(ranked.iter().all(|s| s.score == 0.0));
    }

    #[test]
    fn test_equal_scores_break_ties_by_id() {
        let matcher = Matcher::new(0.1);
        let profile = profile_with_taste(vec![1.0, 0.0]);

        let candidates = vec![
            item("b", "Acme", vec![1.0, 0.0], 0),
            item("a", "Acme", vec![1.0, 0.0], 0),
        ];

        let ranked = matcher.rank(&profile, &candidates, true, 10);
        let ids: Vec<&str> = ranked.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_top_k_truncates() {
        let matcher = Matcher::new(0.1);
        let profile = profile_with_taste(vec![1.0, 0.0]);

        let candidates: Vec<Item> = (0..5)
            .map(|i| item(&format!("c{}", i), "Acme", vec![1.0, i as f32], 0))
            .collect();

        assert_eq!(matcher.rank(&profile, &candidates, true, 2).len(), 2);
    }

    #[test]
    fn test_empty_candidates_is_empty_result() {
        let matcher = Matcher::new(0.1);
        let profile = profile_with_taste(vec![1.0, 0.0]);
        assert!(matcher.rank(&profile, &[], true, 10).is_empty());
    }

    #[test]
    fn test_all_candidates_disliked_is_empty_result() {
        let matcher = Matcher::new(0.1);
        let mut profile = profile_with_taste(vec![1.0, 0.0]);
        profile.record("x", FeedbackLabel::Dislike);
        profile.record("y", FeedbackLabel::Dislike);

        let candidates = vec![
            item("x", "Acme", vec![1.0, 0.0], 0),
            item("y", "Acme", vec![0.5, 0.5], 0),
        ];
        assert!(matcher.rank(&profile, &candidates, true, 10).is_empty());
    }
}
