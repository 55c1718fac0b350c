use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

const DOCUMENTS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
)
"#;

/// Creates a PostgreSQL connection pool without connecting.
///
/// Connections are opened on first use so the service can start while the
/// database is down; requests are then served from the fallback tier.
pub fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)?;

    info!("PostgreSQL connection pool configured");
    Ok(pool)
}

/// Creates the document table if needed. A failure here is logged, not fatal.
pub async fn ensure_schema(pool: &PgPool) {
    match sqlx::query(DOCUMENTS_DDL).execute(pool).await {
        Ok(_) => info!("PostgreSQL document table ready"),
        Err(e) => warn!("PostgreSQL unavailable at startup, running on the fallback store: {e}"),
    }
}
