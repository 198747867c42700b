use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use admin::{
    config::AdminConfig, repositories::PgDatabase, routes, service::RoleService,
    state::AppState,
};
use common::{
    cache::{RedisConfig, RedisPool},
    database::{self, DatabaseConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting admin service");

    let config = AdminConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let db = PgDatabase::new(pool);
    db.migrate().await?;

    // Initialize Redis connection pool
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    match redis_pool.health_check().await {
        Ok(true) => info!("Redis connection successful"),
        Ok(false) | Err(_) => {
            warn!("Redis is unreachable, cache invalidation will fail until it recovers")
        }
    }

    let role_service = RoleService::new(db, Arc::new(redis_pool), &config.user_cache_prefix);
    let app = routes::create_router(AppState::new(role_service));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Admin service listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
