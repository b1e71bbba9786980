use std::sync::Arc;

use crate::cache::CacheClient;

/// Retention window for processed-event markers.
pub const EVENT_TTL_SECS: u64 = 86_400;

/// Ensures a payment-completion event is applied at most once. The marker is
/// claimed atomically (set-if-not-exists) before side effects run, so two
/// concurrent deliveries of the same event cannot both pass the check.
pub struct IdempotencyGate {
    cache: Arc<dyn CacheClient>,
    ttl_secs: u64,
}

impl IdempotencyGate {
    pub fn new(cache: Arc<dyn CacheClient>) -> Self {
        Self {
            cache,
            ttl_secs: EVENT_TTL_SECS,
        }
    }

    fn key(event_id: &str) -> String {
        format!("webhook:{event_id}")
    }

    /// Claims the event. Returns false for a duplicate delivery.
    pub async fn admit(&self, event_id: &str) -> anyhow::Result<bool> {
        self.cache
            .set_nx_ex(&Self::key(event_id), "processed", self.ttl_secs)
            .await
    }

    /// Drops the marker after a failed side effect, so the processor's
    /// redelivery gets a fresh attempt instead of a false duplicate.
    pub async fn release(&self, event_id: &str) -> anyhow::Result<()> {
        self.cache.del(&Self::key(event_id)).await
    }
}
