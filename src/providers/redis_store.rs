use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};

use crate::error::{AppError, AppResult};
use crate::models::{Item, UserProfile};
use crate::providers::vector_store::VectorStore;
use crate::services::matcher::cosine_similarity;

const ITEM_KEY_PREFIX: &str = "fitradar:item:";
const ITEM_INDEX_KEY: &str = "fitradar:items";
const PROFILE_KEY_PREFIX: &str = "fitradar:profile:";
const VERSION_KEY: &str = "fitradar:catalog_version";

fn item_key(id: &str) -> String {
    format!("{}{}", ITEM_KEY_PREFIX, id)
}

fn profile_key(user_id: &str) -> String {
    format!("{}{}", PROFILE_KEY_PREFIX, user_id)
}

/// Redis-backed [`VectorStore`]
///
/// Items and profiles round-trip through JSON values; an index set tracks
/// item ids. Similarity search scans every stored embedding, which is fine
/// at catalog sizes where a brute-force pass beats maintaining an ANN index.
pub struct RedisVectorStore {
    client: Client,
}

impl RedisVectorStore {
    pub fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> AppResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn load_all_items(&self) -> AppResult<Vec<Item>> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn.smembers(ITEM_INDEX_KEY).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| item_key(id)).collect();
        let values: Vec<Option<String>> = conn.mget(&keys).await?;

        let mut items = Vec::with_capacity(values.len());
        for json in values.into_iter().flatten() {
            match serde_json::from_str::<Item>(&json) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable stored item"),
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl VectorStore for RedisVectorStore {
    async fn upsert_item(&self, item: Item) -> AppResult<()> {
        let json = serde_json::to_string(&item)
            .map_err(|e| AppError::Internal(format!("Store serialization error: {}", e)))?;

        let mut conn = self.conn().await?;
        let _: () = conn.set(item_key(&item.id), json).await?;
        let _: () = conn.sadd(ITEM_INDEX_KEY, &item.id).await?;
        let _: u64 = conn.incr(VERSION_KEY, 1u64).await?;

        tracing::debug!(item_id = %item.id, "item stored");
        Ok(())
    }

    async fn get_item(&self, id: &str) -> AppResult<Option<Item>> {
        let mut conn = self.conn().await?;
        let json: Option<String> = conn.get(item_key(id)).await?;
        match json {
            Some(json) => {
                let item = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Store deserialization error: {}", e))
                })?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    async fn recent_items(&self, limit: usize) -> AppResult<Vec<Item>> {
        let mut items = self.load_all_items().await?;
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        items.truncate(limit);
        Ok(items)
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<(String, f32)>> {
        let items = self.load_all_items().await?;
        let mut scored: Vec<(String, f32)> = items
            .into_iter()
            .map(|item| {
                let score = cosine_similarity(vector, &item.embedding);
                (item.id, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let mut conn = self.conn().await?;
        let json: Option<String> = conn.get(profile_key(user_id)).await?;
        match json {
            Some(json) => {
                let profile = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Store deserialization error: {}", e))
                })?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    async fn upsert_profile(&self, profile: UserProfile) -> AppResult<()> {
        let json = serde_json::to_string(&profile)
            .map_err(|e| AppError::Internal(format!("Store serialization error: {}", e)))?;

        let mut conn = self.conn().await?;
        let _: () = conn.set(profile_key(&profile.user_id), json).await?;

        tracing::debug!(user_id = %profile.user_id, "profile stored");
        Ok(())
    }

    async fn catalog_version(&self) -> AppResult<u64> {
        let mut conn = self.conn().await?;
        let version: Option<u64> = conn.get(VERSION_KEY).await?;
        Ok(version.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_layout() {
        assert_eq!(item_key("p1"), "fitradar:item:p1");
    }

    #[test]
    fn test_profile_key_layout() {
        assert_eq!(profile_key("ada@example.com"), "fitradar:profile:ada@example.com");
    }
}
