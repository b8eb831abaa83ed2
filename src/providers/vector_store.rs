use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::models::{Item, UserProfile};
use crate::services::matcher::cosine_similarity;

/// Storage collaborator holding items and profiles, with similarity search
///
/// The engine only depends on this contract; the backing medium (process
/// memory, Redis, a vector database) is the implementation's concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Stores or replaces an item (last-write-wins on id)
    async fn upsert_item(&self, item: Item) -> AppResult<()>;

    async fn get_item(&self, id: &str) -> AppResult<Option<Item>>;

    /// Items ordered newest-first, ties by id ascending
    async fn recent_items(&self, limit: usize) -> AppResult<Vec<Item>>;

    /// Ids scored by cosine similarity against `vector`, best first
    async fn search(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<(String, f32)>>;

    async fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>>;

    async fn upsert_profile(&self, profile: UserProfile) -> AppResult<()>;

    /// Monotonically increasing counter, bumped on every item upsert
    ///
    /// Feeds pipeline fingerprints so cached match runs go stale as soon as
    /// the catalog changes.
    async fn catalog_version(&self) -> AppResult<u64>;
}

/// Process-local store, the default for tests and standalone runs
pub struct InMemoryVectorStore {
    items: RwLock<HashMap<String, Item>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
    version: AtomicU64,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_item(&self, item: Item) -> AppResult<()> {
        self.items.write().await.insert(item.id.clone(), item);
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_item(&self, id: &str) -> AppResult<Option<Item>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn recent_items(&self, limit: usize) -> AppResult<Vec<Item>> {
        let mut items: Vec<Item> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        items.truncate(limit);
        Ok(items)
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<(String, f32)>> {
        let items = self.items.read().await;
        let mut scored: Vec<(String, f32)> = items
            .values()
            .map(|item| (item.id.clone(), cosine_similarity(vector, &item.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: UserProfile) -> AppResult<()> {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn catalog_version(&self) -> AppResult<u64> {
        Ok(self.version.load(Ordering::SeqCst))
    }
}
