//! Remote (L2) store client
//!
//! A narrow subset of a key/value store contract (§6): `GET`, `SET ... PX
//! ttl`, `DEL`, `EXISTS`, a cursor-based key scan, and a ping. `RemoteClient`
//! is the seam the two-tier engine programs against, so tests can swap in an
//! in-memory fake instead of a real Redis connection, and so the security
//! adapter (`security.rs`) can hand back a differently-constructed client
//! without the engine knowing the difference.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;

use crate::errors::{CacheError, CacheResult};

/// Bounded per-call scan budget, so pattern invalidation against a large
/// keyspace can never block other operations indefinitely (spec §4.7).
const SCAN_COUNT_HINT: usize = 250;
const SCAN_MAX_ITERATIONS: usize = 1000;

#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn ping(&self) -> CacheResult<()>;
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;
    async fn delete(&self, key: &str) -> CacheResult<bool>;
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Cursor-based scan for keys matching a glob `pattern`, bounded to at
    /// most `SCAN_MAX_ITERATIONS` round trips. Returns `(keys, exhausted)`;
    /// `exhausted=false` means the budget ran out before the cursor reached
    /// zero and the caller should treat the result as partial.
    async fn scan(&self, pattern: &str) -> CacheResult<(Vec<String>, bool)>;

    /// Remaining time-to-live, if the store tracks one. Used to carry a
    /// promoted L2 entry's residual TTL into L1 rather than resetting it.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;
}

/// Redis-backed implementation over a `deadpool-redis` connection pool.
pub struct RedisRemoteClient {
    pool: Pool,
}

impl RedisRemoteClient {
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let pool = PoolConfig::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let client = Self { pool };
        client.ping().await?;
        Ok(client)
    }
}

#[async_trait]
impl RemoteClient for RedisRemoteClient {
    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Connection(e.to_string()))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::from)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Connection(e.to_string()))?;
        conn.get(key).await.map_err(CacheError::from)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Connection(e.to_string()))?;
        let ttl_ms = ttl.as_millis().max(1) as usize;
        let _: () = conn.pset_ex(key, value, ttl_ms as u64).await.map_err(CacheError::from)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Connection(e.to_string()))?;
        let deleted: u64 = conn.del(key).await.map_err(CacheError::from)?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Connection(e.to_string()))?;
        conn.exists(key).await.map_err(CacheError::from)
    }

    async fn scan(&self, pattern: &str) -> CacheResult<(Vec<String>, bool)> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Connection(e.to_string()))?;

        let mut cursor: u64 = 0;
        let mut found = Vec::new();
        let mut iterations = 0usize;

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT_HINT)
                .query_async(&mut conn)
                .await
                .map_err(CacheError::from)?;

            found.extend(batch);
            cursor = next_cursor;
            iterations += 1;

            if cursor == 0 {
                return Ok((found, true));
            }
            if iterations >= SCAN_MAX_ITERATIONS {
                return Ok((found, false));
            }
        }
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Connection(e.to_string()))?;
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await.map_err(CacheError::from)?;
        Ok(if millis > 0 { Some(Duration::from_millis(millis as u64)) } else { None })
    }
}
