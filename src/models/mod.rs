use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod profile;

pub use profile::UserProfile;

/// A catalog item with its embedding
///
/// Items are immutable once embedded; re-ingesting the same id with new text
/// replaces the stored item wholesale (last-write-wins).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Stable identifier
    pub id: String,
    /// Name and description joined, the text that was embedded
    pub text: String,
    /// Brand the item belongs to
    pub brand: String,
    /// Embedding vector, dimension fixed per deployment
    pub embedding: Vec<f32>,
    /// When the item entered the catalog
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Builds the text an item is embedded under from its name and description
    pub fn embedding_text(name: &str, description: &str) -> String {
        let mut parts = Vec::new();
        if !name.is_empty() {
            parts.push(name);
        }
        if !description.is_empty() {
            parts.push(description);
        }
        if parts.is_empty() {
            "item".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// An item paired with its final match score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredItem {
    pub item: Item,
    pub score: f32,
}

/// How often a user wants to be notified of new matches
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    #[default]
    Weekly,
    Realtime,
}

/// A feedback label attached to an item by a user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLabel {
    Like,
    Dislike,
    /// Withdraw any previous label for the item
    Undo,
}
