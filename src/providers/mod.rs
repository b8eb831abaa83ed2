pub mod embedding;
pub mod redis_store;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use embedding::OpenAiEmbeddings;
pub use redis_store::RedisVectorStore;
pub use vector_store::InMemoryVectorStore;
pub use vector_store::VectorStore;

#[cfg(test)]
pub use embedding::MockEmbeddingProvider;
#[cfg(test)]
pub use vector_store::MockVectorStore;
