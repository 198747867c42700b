//! Common library for the admin backend
//!
//! This crate provides shared functionality used across services: PostgreSQL
//! connectivity, the Redis cache client and the error types both raise.
//!
//! ```rust,no_run
//! use common::cache::{RedisConfig, RedisPool};
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!
//!     let redis = RedisPool::new(&RedisConfig::from_env()?).await?;
//!     redis.delete_prefix("fba:user:1").await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
