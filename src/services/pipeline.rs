use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cache::{DedupCache, Fingerprint, SweeperHandle};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{FeedbackLabel, Frequency, Item, ScoredItem, UserProfile};
use crate::providers::{EmbeddingProvider, VectorStore};
use crate::services::{Matcher, ProfileBuilder};

/// How many items each batch-ingest wave embeds concurrently
const INGEST_CHUNK: usize = 10;

/// Raw catalog item as supplied by an upstream feed, before embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub brand: String,
}

/// Sequences profile, matching, and ingest work through the dedup caches
///
/// Owns every collaborator explicitly; nothing here reaches for process-wide
/// state. Cloning is cheap and shares the underlying caches and stores.
#[derive(Clone)]
pub struct MatchPipeline {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    profile_builder: ProfileBuilder,
    matcher: Matcher,
    match_cache: DedupCache<Vec<ScoredItem>>,
    embed_cache: DedupCache<Vec<f32>>,
    match_ttl: Duration,
    embed_ttl: Duration,
    candidate_limit: usize,
}

impl MatchPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: &Config,
    ) -> Self {
        let compute_timeout = Duration::from_secs(config.compute_timeout_secs);
        Self {
            profile_builder: ProfileBuilder::new(Arc::clone(&store), config.brand_min_count),
            matcher: Matcher::new(config.brand_boost),
            match_cache: DedupCache::new(compute_timeout),
            embed_cache: DedupCache::new(compute_timeout),
            match_ttl: Duration::from_secs(config.match_ttl_secs),
            embed_ttl: Duration::from_secs(config.embed_ttl_secs),
            candidate_limit: config.candidate_limit,
            store,
            embeddings,
        }
    }

    /// Starts the expiry sweepers for both caches
    pub fn spawn_sweepers(&self, every: Duration) -> Vec<SweeperHandle> {
        vec![
            self.match_cache.spawn_sweeper(every),
            self.embed_cache.spawn_sweeper(every),
        ]
    }

    /// Embeds and stores one catalog item
    ///
    /// The embedding call is deduplicated on a fingerprint of the item text,
    /// so re-ingesting unchanged text (common with polling feeds) costs
    /// nothing. Re-ingesting the same id with new text replaces the item.
    pub async fn ingest_item(
        &self,
        id: &str,
        name: &str,
        description: &str,
        brand: &str,
    ) -> AppResult<Item> {
        if id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "item id must not be empty".to_string(),
            ));
        }

        let text = Item::embedding_text(name, description);
        let fingerprint = Fingerprint::digest(&[b"embed", text.as_bytes()]);

        let provider = Arc::clone(&self.embeddings);
        let embed_text = text.clone();
        let embedding = self
            .embed_cache
            .get_or_compute(&fingerprint, self.embed_ttl, || async move {
                Ok(provider.embed(&embed_text).await?)
            })
            .await?;

        let item = Item {
            id: id.to_string(),
            text,
            brand: brand.to_string(),
            embedding,
            created_at: Utc::now(),
        };
        self.store.upsert_item(item.clone()).await?;

        tracing::debug!(item_id = %id, brand = %brand, "item ingested");
        Ok(item)
    }

    /// Ingests a batch of items, embedding a chunk at a time
    ///
    /// Returns how many items were stored. Individual failures are logged
    /// and skipped so one bad item cannot sink a whole feed poll.
    pub async fn ingest_batch(&self, specs: Vec<ItemSpec>) -> AppResult<usize> {
        let total = specs.len();
        let mut stored = 0usize;

        for chunk in specs.chunks(INGEST_CHUNK) {
            let mut tasks = Vec::with_capacity(chunk.len());
            for spec in chunk {
                let pipeline = self.clone();
                let spec = spec.clone();
                tasks.push(tokio::spawn(async move {
                    pipeline
                        .ingest_item(&spec.id, &spec.name, &spec.description, &spec.brand)
                        .await
                }));
            }

            for task in tasks {
                match task.await {
                    Ok(Ok(_)) => stored += 1,
                    Ok(Err(e)) => tracing::warn!(error = %e, "item ingest failed, skipping"),
                    Err(e) => tracing::warn!(error = %e, "ingest task panicked"),
                }
            }
        }

        tracing::info!(stored, total, "batch ingest finished");
        Ok(stored)
    }

    /// Ranks recent catalog items for a user, deduplicating identical runs
    ///
    /// The fingerprint covers the user, the catalog version, the TTL window,
    /// and the requested depth: concurrent identical requests share one
    /// computation, and the cached run goes stale as soon as the catalog
    /// changes or the window rolls over.
    pub async fn run_match_pipeline(
        &self,
        user_id: &str,
        top_k: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "user id must not be empty".to_string(),
            ));
        }

        let version = self.store.catalog_version().await?;
        let window = Utc::now().timestamp() as u64 / self.match_ttl.as_secs().max(1);
        let fingerprint = Fingerprint::digest(&[
            b"match",
            user_id.as_bytes(),
            &version.to_be_bytes(),
            &window.to_be_bytes(),
            &(top_k as u64).to_be_bytes(),
        ]);

        let store = Arc::clone(&self.store);
        let matcher = self.matcher;
        let candidate_limit = self.candidate_limit;
        let user = user_id.to_string();

        self.match_cache
            .get_or_compute(&fingerprint, self.match_ttl, || async move {
                let profile = store
                    .get_profile(&user)
                    .await?
                    .unwrap_or_else(|| UserProfile::new(&user));
                let candidates = store.recent_items(candidate_limit).await?;
                Ok(matcher.rank(&profile, &candidates, true, top_k))
            })
            .await
    }

    /// Records one feedback label and persists the rebuilt profile
    pub async fn record_feedback(
        &self,
        user_id: &str,
        item_id: &str,
        label: FeedbackLabel,
    ) -> AppResult<UserProfile> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "user id must not be empty".to_string(),
            ));
        }
        if item_id.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "item id must not be empty (user {})",
                user_id
            )));
        }

        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id));

        let updated = self
            .profile_builder
            .apply_feedback(profile, item_id, label)
            .await?;
        self.store.upsert_profile(updated.clone()).await?;

        tracing::info!(
            user_id = %user_id,
            item_id = %item_id,
            label = ?label,
            liked = updated.liked_ids.len(),
            disliked = updated.disliked_ids.len(),
            "feedback recorded"
        );
        Ok(updated)
    }

    /// Creates or updates a user's subscription frequency
    pub async fn subscribe(&self, user_id: &str, frequency: Frequency) -> AppResult<UserProfile> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "user id must not be empty".to_string(),
            ));
        }

        let mut profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id));
        profile.frequency = frequency;
        profile.updated_at = Utc::now();
        self.store.upsert_profile(profile.clone()).await?;

        tracing::info!(user_id = %user_id, frequency = ?frequency, "user subscribed");
        Ok(profile)
    }

    /// Loads a user's profile, erroring if they were never seen
    pub async fn get_profile(&self, user_id: &str) -> AppResult<UserProfile> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no profile for user {}", user_id)))
    }

    /// Lists the newest catalog items
    pub async fn recent_items(&self, limit: usize) -> AppResult<Vec<Item>> {
        self.store.recent_items(limit).await
    }

    /// Items most similar to a given catalog item, the item itself excluded
    pub async fn similar_items(&self, item_id: &str, top_k: usize) -> AppResult<Vec<(String, f32)>> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no item with id {}", item_id)))?;

        // Over-fetch by one since the item matches itself perfectly.
        let mut hits = self.store.search(&item.embedding, top_k + 1).await?;
        hits.retain(|(id, _)| id != item_id);
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{InMemoryVectorStore, MockEmbeddingProvider, MockVectorStore};

    fn test_config() -> Config {
        Config {
            redis_url: None,
            embedding_api_key: "test-key".to_string(),
            embedding_api_url: "http://localhost:9".to_string(),
            embedding_model: "test-model".to_string(),
            embedding_dimension: 2,
            match_ttl_secs: 1800,
            embed_ttl_secs: 604800,
            compute_timeout_secs: 5,
            brand_boost: 0.1,
            brand_min_count: 2,
            candidate_limit: 50,
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }

    fn spec(id: &str, name: &str, brand: &str) -> ItemSpec {
        ItemSpec {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            brand: brand.to_string(),
        }
    }

    #[tokio::test]
    async fn test_identical_text_embeds_once() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mut embeddings = MockEmbeddingProvider::new();
        embeddings
            .expect_embed()
            .times(1)
            .returning(|_| Ok(vec![1.0, 0.0]));

        let pipeline = MatchPipeline::new(store, Arc::new(embeddings), &test_config());

        // Same text under two ids: one embedding call, both items stored.
        pipeline
            .ingest_item("a", "runner", "", "Acme")
            .await
            .unwrap();
        pipeline
            .ingest_item("b", "runner", "", "Acme")
            .await
            .unwrap();

        assert_eq!(pipeline.recent_items(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_ingest_skips_failing_items() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mut embeddings = MockEmbeddingProvider::new();
        embeddings.expect_embed().returning(|text| {
            if text.contains("bad") {
                Err(crate::error::EmbedError::Unavailable(
                    "provider down".to_string(),
                ))
            } else {
                Ok(vec![1.0, 0.0])
            }
        });

        let pipeline = MatchPipeline::new(store, Arc::new(embeddings), &test_config());
        let stored = pipeline
            .ingest_batch(vec![
                spec("a", "good one", "Acme"),
                spec("b", "bad one", "Acme"),
                spec("c", "good two", "Acme"),
            ])
            .await
            .unwrap();

        assert_eq!(stored, 2);
    }

    #[tokio::test]
    async fn test_repeated_match_requests_hit_the_cache() {
        let mut store = MockVectorStore::new();
        // The fingerprint check runs per request; the expensive body once.
        store.expect_catalog_version().times(2).returning(|| Ok(1));
        store.expect_get_profile().times(1).returning(|_| Ok(None));
        store
            .expect_recent_items()
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let pipeline = MatchPipeline::new(
            Arc::new(store),
            Arc::new(MockEmbeddingProvider::new()),
            &test_config(),
        );

        let first = pipeline.run_match_pipeline("ada", 10).await.unwrap();
        let second = pipeline.run_match_pipeline("ada", 10).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_catalog_change_invalidates_cached_match() {
        let mut store = MockVectorStore::new();
        let mut version = 0u64;
        store.expect_catalog_version().returning(move || {
            version += 1;
            Ok(version)
        });
        store.expect_get_profile().times(2).returning(|_| Ok(None));
        store
            .expect_recent_items()
            .times(2)
            .returning(|_| Ok(Vec::new()));

        let pipeline = MatchPipeline::new(
            Arc::new(store),
            Arc::new(MockEmbeddingProvider::new()),
            &test_config(),
        );

        pipeline.run_match_pipeline("ada", 10).await.unwrap();
        pipeline.run_match_pipeline("ada", 10).await.unwrap();
    }

    #[tokio::test]
    async fn test_feedback_requires_identifiers() {
        let pipeline = MatchPipeline::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(MockEmbeddingProvider::new()),
            &test_config(),
        );

        assert!(matches!(
            pipeline
                .record_feedback("", "p1", FeedbackLabel::Like)
                .await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            pipeline
                .record_feedback("ada", " ", FeedbackLabel::Like)
                .await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_feedback_persists_the_profile() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mut embeddings = MockEmbeddingProvider::new();
        embeddings.expect_embed().returning(|_| Ok(vec![1.0, 0.0]));

        let pipeline = MatchPipeline::new(
            Arc::clone(&store) as Arc<dyn VectorStore>,
            Arc::new(embeddings),
            &test_config(),
        );

        pipeline
            .ingest_item("p1", "runner", "", "Adidas")
            .await
            .unwrap();
        pipeline
            .record_feedback("ada", "p1", FeedbackLabel::Like)
            .await
            .unwrap();

        let persisted = store.get_profile("ada").await.unwrap().unwrap();
        assert!(persisted.liked_ids.contains("p1"));
        assert_eq!(persisted.taste_vector, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_similar_items_excludes_the_anchor() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mut embeddings = MockEmbeddingProvider::new();
        let mut vectors = vec![vec![0.0, 1.0], vec![0.9, 0.1], vec![1.0, 0.0]];
        embeddings
            .expect_embed()
            .returning(move |_| Ok(vectors.pop().unwrap()));

        let pipeline = MatchPipeline::new(store, Arc::new(embeddings), &test_config());
        pipeline
            .ingest_item("anchor", "anchor item", "", "Acme")
            .await
            .unwrap();
        pipeline
            .ingest_item("close", "close item", "", "Acme")
            .await
            .unwrap();
        pipeline
            .ingest_item("far", "far item", "", "Acme")
            .await
            .unwrap();

        let hits = pipeline.similar_items("anchor", 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["close", "far"]);

        assert!(matches!(
            pipeline.similar_items("ghost", 2).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_sets_frequency() {
        let pipeline = MatchPipeline::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(MockEmbeddingProvider::new()),
            &test_config(),
        );

        let profile = pipeline.subscribe("ada", Frequency::Daily).await.unwrap();
        assert_eq!(profile.frequency, Frequency::Daily);

        let loaded = pipeline.get_profile("ada").await.unwrap();
        assert_eq!(loaded.frequency, Frequency::Daily);

        assert!(matches!(
            pipeline.get_profile("nobody").await,
            Err(AppError::NotFound(_))
        ));
    }
}
