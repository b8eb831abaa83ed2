use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FeedbackLabel, Frequency};

/// A user's taste profile, rebuilt from accept/reject feedback
///
/// `liked_ids` and `disliked_ids` are disjoint: labeling an item moves it
/// between the sets. `taste_vector` is always the full mean of the liked
/// embeddings that resolved at rebuild time, never an incremental update; it
/// stays `None` while no liked item has an embedding available.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub liked_ids: BTreeSet<String>,
    pub disliked_ids: BTreeSet<String>,
    /// Derived from the brands of liked items
    pub preferred_brands: BTreeSet<String>,
    pub taste_vector: Option<Vec<f32>>,
    pub frequency: Frequency,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Creates an empty profile for a new user
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            liked_ids: BTreeSet::new(),
            disliked_ids: BTreeSet::new(),
            preferred_brands: BTreeSet::new(),
            taste_vector: None,
            frequency: Frequency::default(),
            updated_at: Utc::now(),
        }
    }

    /// Applies a feedback label to the liked/disliked sets
    ///
    /// Idempotent: re-applying the same label is a no-op. Does not touch the
    /// derived fields; callers rebuild those afterwards.
    pub fn record(&mut self, item_id: &str, label: FeedbackLabel) {
        match label {
            FeedbackLabel::Like => {
                self.disliked_ids.remove(item_id);
                self.liked_ids.insert(item_id.to_string());
            }
            FeedbackLabel::Dislike => {
                self.liked_ids.remove(item_id);
                self.disliked_ids.insert(item_id.to_string());
            }
            FeedbackLabel::Undo => {
                self.liked_ids.remove(item_id);
                self.disliked_ids.remove(item_id);
            }
        }
    }

    /// True if the user has no positive feedback yet
    pub fn is_cold_start(&self) -> bool {
        self.taste_vector.is_none()
    }
}
