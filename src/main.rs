use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use fitradar::api::{create_router, AppState};
use fitradar::config::Config;
use fitradar::providers::{
    InMemoryVectorStore, OpenAiEmbeddings, RedisVectorStore, VectorStore,
};
use fitradar::services::MatchPipeline;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn VectorStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!("using redis-backed vector store");
            Arc::new(RedisVectorStore::connect(url)?)
        }
        None => {
            tracing::info!("using in-memory vector store");
            Arc::new(InMemoryVectorStore::new())
        }
    };

    let embeddings = Arc::new(OpenAiEmbeddings::new(
        config.embedding_api_key.clone(),
        config.embedding_api_url.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
    ));

    let pipeline = MatchPipeline::new(store, embeddings, &config);
    let sweepers = pipeline.spawn_sweepers(SWEEP_INTERVAL);

    let app = create_router(AppState::new(pipeline));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for sweeper in sweepers {
        sweeper.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
