//! Revocation Store
//! Mission: Remember logged-out tokens until they would have expired anyway
//!
//! Two backends sit behind one narrow trait:
//! - `MemoryRevocationStore`: process-local map, for tests and single-instance runs
//! - `RedisRevocationStore`: shared across every server instance

use crate::auth::clock::Clock;
use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime, Timeouts};
use parking_lot::Mutex;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Marker value stored against a revoked token
pub const REVOKED_MARKER: &str = "blacklisted";

/// Key-value capability the revocation gate needs.
///
/// Both operations must be atomic with respect to each other. Writing the same
/// key twice is harmless; the second write only refreshes the TTL.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
}

struct MemoryEntry {
    value: String,
    expires_at: i64,
}

/// In-process store. Entries expire against the injected clock.
pub struct MemoryRevocationStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries (call from a background task).
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let ttl = i64::try_from(ttl_secs).context("TTL out of range")?;
        let expires_at = self.clock.now().saturating_add(ttl);

        self.entries.lock().insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }
}

/// Redis-backed store; Redis enforces the TTL itself.
pub struct RedisRevocationStore {
    pool: Pool,
}

impl RedisRevocationStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from a URL and prove it can hand out a connection.
    pub async fn connect(url: &str, pool_size: usize, timeout: Duration) -> Result<Self> {
        let pool = build_pool(url, pool_size, timeout)?;

        pool.get()
            .await
            .context("Failed to connect to Redis revocation store")?;

        info!("🔗 Connected to Redis revocation store");
        Ok(Self { pool })
    }
}

/// `Config::from_url` leaves `pool` unset, so the sizing and timeouts are
/// spelled out here. Every wait on Redis is bounded by `timeout`.
fn build_pool(url: &str, pool_size: usize, timeout: Duration) -> Result<Pool> {
    let mut config = deadpool_redis::Config::from_url(url);
    config.pool = Some(PoolConfig {
        max_size: pool_size,
        timeouts: Timeouts {
            wait: Some(timeout),
            create: Some(timeout),
            recycle: Some(timeout),
        },
        ..Default::default()
    });

    config
        .create_pool(Some(Runtime::Tokio1))
        .context("Failed to create Redis pool")
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get Redis connection")?;

        let value: Option<String> = conn.get(key).await.context("Redis GET failed")?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get Redis connection")?;

        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .context("Redis SETEX failed")?;

        debug!(ttl_secs, "Revocation entry written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    fn store_at(ts: i64) -> (MemoryRevocationStore, ManualClock) {
        let clock = ManualClock::new(ts);
        (MemoryRevocationStore::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_entry_visible_until_ttl() {
        let (store, clock) = store_at(1_000);

        store.set_with_ttl("tok", REVOKED_MARKER, 60).await.unwrap();
        assert_eq!(store.get("tok").await.unwrap().as_deref(), Some(REVOKED_MARKER));
        assert_eq!(store.len(), 1);

        clock.advance(59);
        assert!(store.get("tok").await.unwrap().is_some());

        clock.advance(1);
        assert!(store.get("tok").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_key_is_none() {
        let (store, _clock) = store_at(1_000);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rewrite_is_idempotent() {
        let (store, _clock) = store_at(1_000);

        store.set_with_ttl("tok", REVOKED_MARKER, 60).await.unwrap();
        store.set_with_ttl("tok", REVOKED_MARKER, 60).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_at(1_000);

        store.set_with_ttl("short", REVOKED_MARKER, 10).await.unwrap();
        store.set_with_ttl("long", REVOKED_MARKER, 100).await.unwrap();

        clock.advance(50);
        assert_eq!(store.purge_expired(), 1);
        assert!(store.get("long").await.unwrap().is_some());
        assert!(store.get("short").await.unwrap().is_none());
    }

    #[test]
    fn test_redis_pool_uses_configured_size_and_timeouts() {
        let timeout = Duration::from_millis(250);
        let pool = build_pool("redis://127.0.0.1:6379", 3, timeout).unwrap();

        assert_eq!(pool.status().max_size, 3);
        let timeouts = pool.timeouts();
        assert_eq!(timeouts.wait, Some(timeout));
        assert_eq!(timeouts.create, Some(timeout));
        assert_eq!(timeouts.recycle, Some(timeout));
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_within_timeout() {
        // Non-routable address: the connect attempt hangs unless bounded.
        let attempt = tokio::time::timeout(
            Duration::from_secs(5),
            RedisRevocationStore::connect("redis://10.255.255.1:6379", 2, Duration::from_millis(200)),
        )
        .await;

        let inner = attempt.expect("connect was not bounded by the pool timeout");
        assert!(inner.is_err());
    }
}
