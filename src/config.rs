use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Redis connection URL; if unset, the in-memory vector store is used
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Embedding provider API key
    pub embedding_api_key: String,

    /// Embedding provider base URL
    #[serde(default = "default_embedding_api_url")]
    pub embedding_api_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding vector dimension, fixed per deployment
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// TTL for cached match-pipeline runs, in seconds
    #[serde(default = "default_match_ttl_secs")]
    pub match_ttl_secs: u64,

    /// TTL for cached item embeddings, in seconds
    #[serde(default = "default_embed_ttl_secs")]
    pub embed_ttl_secs: u64,

    /// Upper bound on a single cached computation, in seconds
    #[serde(default = "default_compute_timeout_secs")]
    pub compute_timeout_secs: u64,

    /// Additive score bonus for items from a preferred brand
    #[serde(default = "default_brand_boost")]
    pub brand_boost: f32,

    /// Minimum occurrences among liked items for a brand to count as preferred
    #[serde(default = "default_brand_min_count")]
    pub brand_min_count: usize,

    /// How many recent catalog items feed a match run
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_embedding_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_match_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_embed_ttl_secs() -> u64 {
    604800 // 1 week; item text rarely changes
}

fn default_compute_timeout_secs() -> u64 {
    30
}

fn default_brand_boost() -> f32 {
    0.1
}

fn default_brand_min_count() -> usize {
    2
}

fn default_candidate_limit() -> usize {
    50
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
