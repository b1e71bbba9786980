use std::sync::Arc;

use crate::cache::CacheClient;

/// Attempts allowed per client key within one window.
pub const DEFAULT_LIMIT: u32 = 5;
/// Fixed window length; resets via TTL expiry on the counter key.
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Fixed-window counter keyed by client address, applied to the
/// unauthenticated endpoints (signup, login). Bursts across a window
/// boundary can briefly reach twice the limit; accepted tradeoff.
#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn CacheClient>,
    limit: u32,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn CacheClient>, limit: u32, window_secs: u64) -> Self {
        Self {
            cache,
            limit,
            window_secs,
        }
    }

    pub fn for_auth_endpoints(cache: Arc<dyn CacheClient>) -> Self {
        Self::new(cache, DEFAULT_LIMIT, DEFAULT_WINDOW_SECS)
    }

    /// Returns true when the request is allowed. The increment is atomic so
    /// concurrent bursts from one client cannot undercount.
    pub async fn admit(&self, client_key: &str) -> anyhow::Result<bool> {
        let key = format!("ratelimit:{client_key}");
        let count = self.cache.incr_ex(&key, self.window_secs).await?;
        Ok(count <= i64::from(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::time::Duration;

    #[tokio::test]
    async fn sixth_attempt_in_window_is_rejected() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()), 5, 60);
        for _ in 0..5 {
            assert!(limiter.admit("10.0.0.1").await.unwrap());
        }
        assert!(!limiter.admit("10.0.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()), 1, 60);
        assert!(limiter.admit("10.0.0.1").await.unwrap());
        assert!(!limiter.admit("10.0.0.1").await.unwrap());
        assert!(limiter.admit("10.0.0.2").await.unwrap());
    }

    #[tokio::test]
    async fn fresh_window_admits_again() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()), 1, 1);
        assert!(limiter.admit("10.0.0.1").await.unwrap());
        assert!(!limiter.admit("10.0.0.1").await.unwrap());
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.admit("10.0.0.1").await.unwrap());
    }
}
