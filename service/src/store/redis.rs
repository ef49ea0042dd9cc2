// ## src/store/redis.rs

//! Redis-backed key-value store for multi-process deployments.
//!
//! Same contract as `MemoryStore`: JSON values, per-key TTLs, atomic
//! set-if-absent via `SET NX EX`. Redis owns expiry, so the lazy-expiry
//! bookkeeping of the in-process map disappears here.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::info;

use crate::error::ServiceError;
use crate::store::KeyValueStore;

pub struct RedisStore {
    conn: ConnectionManager,
}

fn store_err(err: redis::RedisError) -> ServiceError {
    ServiceError::Internal(format!("redis: {err}"))
}

/// SETEX rejects a zero expiry; clamp sub-second TTLs up to one second.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

impl RedisStore {
    /// Connect and ping once so a bad endpoint fails at startup, not on the
    /// first request.
    pub async fn connect(redis_url: &str) -> Result<Self, ServiceError> {
        let client = Client::open(redis_url).map_err(store_err)?;
        let mut conn = ConnectionManager::new(client).await.map_err(store_err)?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(store_err)?;
        info!(%redis_url, "connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(store_err)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl_secs(ttl)).await.map_err(store_err)
    }

    async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(store_err)?;
        Ok(removed > 0)
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, ServiceError> {
        let mut conn = self.conn.clone();
        let claimed: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(claimed.is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, ServiceError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");

        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(&pattern).await.map_err(store_err)?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            let mut conn = self.conn.clone();
            // A key can expire between SCAN and GET; skip the hole.
            if let Some(value) = conn.get::<_, Option<String>>(&key).await.map_err(store_err)? {
                pairs.push((key, value));
            }
        }
        Ok(pairs)
    }
}
