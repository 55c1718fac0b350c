mod config;
mod counseling;
mod db;
mod errors;
mod llm_client;
mod models;
mod planning;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::counseling::repository::CounselingRepository;
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::planning::inflight::InFlight;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{
    DocumentStore, MemoryDocumentStore, PgDocumentStore, RedisDocumentStore, TieredStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting counsel API v{}", env!("CARGO_PKG_VERSION"));

    // Primary tier: PostgreSQL, connected lazily
    let pool = create_pool(&config.database_url)?;
    ensure_schema(&pool).await;
    let primary: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));

    // Fallback tier: Redis when configured, otherwise process memory
    let fallback: Arc<dyn DocumentStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Fallback store: Redis");
            Arc::new(RedisDocumentStore::new(client))
        }
        None => {
            info!("Fallback store: in-memory (REDIS_URL not set)");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.llm_timeout_secs)?;
    if llm.has_credential() {
        info!("LLM client initialized (timeout {}s)", config.llm_timeout_secs);
    } else {
        info!("ANTHROPIC_API_KEY not set; AI endpoints will serve demo responses");
    }

    let state = AppState {
        repo: CounselingRepository::new(TieredStore::new(primary, fallback)),
        llm: Arc::new(llm),
        config: config.clone(),
        in_flight: InFlight::default(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
