//! Invalidation of cached per-user authorization state

use std::sync::Arc;

use async_trait::async_trait;
use common::cache::RedisPool;
use common::error::{CacheError, CacheResult};
use tokio::sync::Mutex;

/// Removes cached entries so the next request rebuilds them
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Delete a single key
    async fn delete_key(&self, key: &str) -> CacheResult<()>;

    /// Delete `prefix` itself and every key nested under `prefix:`
    async fn delete_prefix(&self, prefix: &str) -> CacheResult<()>;
}

#[async_trait]
impl CacheInvalidator for RedisPool {
    async fn delete_key(&self, key: &str) -> CacheResult<()> {
        self.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<()> {
        RedisPool::delete_prefix(self, prefix).await.map(|_| ())
    }
}

/// Cache call observed by [`RecordingCache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCall {
    DeleteKey(String),
    DeletePrefix(String),
}

/// Invalidator that only records the calls it receives
///
/// Test double for [`RedisPool`]. It can be switched into a failing mode to
/// exercise error handling.
#[derive(Debug, Clone, Default)]
pub struct RecordingCache {
    calls: Arc<Mutex<Vec<CacheCall>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (after being recorded)
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.lock().await = failing;
    }

    /// Calls received so far, in order
    pub async fn calls(&self) -> Vec<CacheCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: CacheCall) -> CacheResult<()> {
        self.calls.lock().await.push(call);
        if *self.failing.lock().await {
            return Err(CacheError::Configuration("cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCache {
    async fn delete_key(&self, key: &str) -> CacheResult<()> {
        self.record(CacheCall::DeleteKey(key.to_string())).await
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<()> {
        self.record(CacheCall::DeletePrefix(prefix.to_string())).await
    }
}
