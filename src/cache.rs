use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

/// Key/value store with TTL semantics, used for webhook idempotency markers,
/// rate-limit counters and the signals cache.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;
    /// Atomic set-if-not-exists with TTL. Returns true when the key was set.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<bool>;
    /// Atomic increment; the TTL is applied when the key is created.
    async fn incr_ex(&self, key: &str, ttl_secs: u64) -> anyhow::Result<i64>;
    async fn del(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        // SET NX EX replies OK when set, nil when the key already exists.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn incr_ex(&self, key: &str, ttl_secs: u64) -> anyhow::Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(key, 1_i64).await?;
        if count == 1 {
            conn.expire::<_, ()>(key, ttl_secs as i64).await?;
        }
        Ok(count)
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// In-memory implementation backing `AppState::fake()` and unit tests.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(entries: &HashMap<String, (String, Instant)>, key: &str) -> Option<String> {
        entries
            .get(key)
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(v, _)| v.clone())
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(Self::live_value(&entries, key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        if Self::live_value(&entries, key).is_some() {
            return Ok(false);
        }
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        entries.insert(key.to_string(), (value.to_string(), deadline));
        Ok(true)
    }

    async fn incr_ex(&self, key: &str, ttl_secs: u64) -> anyhow::Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        let next = match Self::live_value(&entries, key) {
            Some(current) => current.parse::<i64>().unwrap_or(0) + 1,
            None => 1,
        };
        let deadline = match entries.get(key) {
            Some((_, d)) if next > 1 => *d,
            _ => Instant::now() + Duration::from_secs(ttl_secs),
        };
        entries.insert(key.to_string(), (next.to_string(), deadline));
        Ok(next)
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get_roundtrip() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_nx_is_atomic_first_writer_wins() {
        let cache = MemoryCache::new();
        assert!(cache.set_nx_ex("k", "first", 60).await.unwrap());
        assert!(!cache.set_nx_ex("k", "second", 60).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn incr_counts_up_from_one() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr_ex("c", 60).await.unwrap(), 1);
        assert_eq!(cache.incr_ex("c", 60).await.unwrap(), 2);
        assert_eq!(cache.incr_ex("c", 60).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn del_removes_entry() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", 60).await.unwrap();
        cache.del("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entry_reads_as_missing() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        // and set-nx can claim the key again
        assert!(cache.set_nx_ex("k", "v2", 60).await.unwrap());
    }
}
