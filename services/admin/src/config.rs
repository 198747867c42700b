//! Admin service configuration

use anyhow::Result;
use std::net::SocketAddr;

/// Admin service configuration
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Namespace of the per-user cache keys written by the auth layer
    pub user_cache_prefix: String,
}

impl AdminConfig {
    /// Create a new AdminConfig from environment variables
    ///
    /// # Environment Variables
    /// - `ADMIN_BIND_ADDR`: Listen address (default: "0.0.0.0:3002")
    /// - `JWT_USER_REDIS_PREFIX`: Per-user cache namespace (default: "fba:user")
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("ADMIN_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3002".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid ADMIN_BIND_ADDR: {}", e))?;

        let user_cache_prefix = std::env::var("JWT_USER_REDIS_PREFIX")
            .unwrap_or_else(|_| "fba:user".to_string())
            .trim_end_matches(':')
            .to_string();

        if user_cache_prefix.is_empty() {
            anyhow::bail!("JWT_USER_REDIS_PREFIX must not be empty");
        }

        Ok(AdminConfig {
            bind_addr,
            user_cache_prefix,
        })
    }
}
