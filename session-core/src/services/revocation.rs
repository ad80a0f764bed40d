//! Revocation ledger - blacklisted and already-rotated token identifiers.

use std::sync::Arc;

use crate::services::KeyValueStore;

const REVOKED_PREFIX: &str = "revoked:";
const USED_PREFIX: &str = "used:";

/// Tracks jti markers with TTLs equal to the remaining lifetime of the token
/// they mark, so an entry survives every possible replay of its token and no
/// longer. All writes are idempotent.
#[derive(Clone)]
pub struct RevocationLedger {
    store: Arc<dyn KeyValueStore>,
}

impl RevocationLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Blacklist a token identifier.
    pub async fn mark_revoked(&self, jti: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let key = format!("{}{}", REVOKED_PREFIX, jti);
        self.store.set(&key, "revoked", ttl_seconds.max(1)).await
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, anyhow::Error> {
        let key = format!("{}{}", REVOKED_PREFIX, jti);
        self.store.exists(&key).await
    }

    /// Record a refresh jti as consumed by rotation. Presenting it again is a
    /// reuse signal.
    pub async fn mark_used(&self, refresh_jti: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let key = format!("{}{}", USED_PREFIX, refresh_jti);
        self.store.set(&key, "rotated", ttl_seconds.max(1)).await
    }

    pub async fn is_used(&self, refresh_jti: &str) -> Result<bool, anyhow::Error> {
        let key = format!("{}{}", USED_PREFIX, refresh_jti);
        self.store.exists(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryKvStore;

    fn ledger() -> RevocationLedger {
        RevocationLedger::new(Arc::new(InMemoryKvStore::new()))
    }

    #[tokio::test]
    async fn test_mark_revoked_is_idempotent() {
        let ledger = ledger();
        assert!(!ledger.is_revoked("jti-1").await.unwrap());

        ledger.mark_revoked("jti-1", 600).await.unwrap();
        assert!(ledger.is_revoked("jti-1").await.unwrap());

        // Marking twice is a no-op, not an error
        ledger.mark_revoked("jti-1", 600).await.unwrap();
        assert!(ledger.is_revoked("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_used_and_revoked_are_separate_sets() {
        let ledger = ledger();
        ledger.mark_used("jti-2", 600).await.unwrap();

        assert!(ledger.is_used("jti-2").await.unwrap());
        assert!(!ledger.is_revoked("jti-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_positive_ttl_is_clamped() {
        let ledger = ledger();
        // A marker for an already-expired token must still land
        ledger.mark_revoked("jti-3", 0).await.unwrap();
        assert!(ledger.is_revoked("jti-3").await.unwrap());
    }
}
