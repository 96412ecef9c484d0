use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentforge::config::Config;
use agentforge::embeddings::EmbeddingClient;
use agentforge::knowledge::KnowledgeStoreManager;
use agentforge::llm::{TextGenerator, LLM};
use agentforge::storage::ObjectStorage;
use agentforge::utils::retry::RetryPolicy;
use agentforge::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentforge=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // Connect to database
    let pool = agentforge::db::create_pool(&config.database).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    // External capabilities, constructed once and injected everywhere
    let retry = RetryPolicy::from_config(&config.retry);
    let generator: Arc<dyn TextGenerator> = Arc::new(LLM::from_config(&config.llm, retry)?);
    let embedder = Arc::new(EmbeddingClient::from_config(&config.embedding, retry));
    let storage = Arc::new(ObjectStorage::from_config(&config.storage)?);
    let knowledge = KnowledgeStoreManager::new(pool.clone());

    // Create shared state
    let state = AppState {
        pool,
        config: config.clone(),
        generator,
        embedder,
        knowledge,
        storage,
    };

    // Create router
    let app = agentforge::create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
