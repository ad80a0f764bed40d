//! Test helper module for session-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use service_core::config::Environment;
use session_core::config::{
    CoreConfig, JwtConfig, PermissionCacheConfig, RedisConfig, SigningAlgorithm,
    StoreTimeoutConfig,
};
use session_core::db::{InMemoryPolicyStore, InMemoryRoleDirectory, InMemorySessionStore};
use session_core::models::Principal;
use session_core::services::{InMemoryKvStore, KeyValueStore};
use session_core::SessionCore;

pub const TEST_HMAC_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const TEST_ISSUER: &str = "https://auth.test.example.com";
pub const TEST_AUDIENCE: &str = "test-platform";

/// Fully wired core plus handles to the in-memory stores for seeding and
/// assertions.
pub struct TestCore {
    pub core: SessionCore,
    pub sessions: Arc<InMemorySessionStore>,
    pub roles: Arc<InMemoryRoleDirectory>,
    pub policies: Arc<InMemoryPolicyStore>,
    pub kv: Arc<InMemoryKvStore>,
}

pub fn test_config() -> CoreConfig {
    CoreConfig {
        environment: Environment::Dev,
        service_name: "session-core-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "debug".to_string(),
        jwt: JwtConfig {
            algorithm: SigningAlgorithm::Hs256,
            hmac_secret: Some(TEST_HMAC_SECRET.to_string()),
            private_key_path: None,
            public_key_path: None,
            issuer: TEST_ISSUER.to_string(),
            audience: TEST_AUDIENCE.to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        redis: RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        },
        permissions: PermissionCacheConfig { ttl_seconds: 300 },
        stores: StoreTimeoutConfig { timeout_ms: 2000 },
    }
}

pub fn build_core() -> TestCore {
    build_core_with_config(test_config())
}

pub fn build_core_with_config(config: CoreConfig) -> TestCore {
    let sessions = Arc::new(InMemorySessionStore::new());
    let roles = Arc::new(InMemoryRoleDirectory::new());
    let policies = Arc::new(InMemoryPolicyStore::new());
    let kv = Arc::new(InMemoryKvStore::new());

    let core = SessionCore::new(
        config,
        sessions.clone(),
        roles.clone(),
        policies.clone(),
        kv.clone(),
    )
    .expect("Failed to build session core");

    TestCore {
        core,
        sessions,
        roles,
        policies,
        kv,
    }
}

pub fn test_principal(id: &str) -> Principal {
    Principal::new(id, "tenant_1", format!("{}@example.com", id))
}

/// Key-value store whose every operation fails, for fail-closed tests.
pub struct FailingKvStore;

#[async_trait]
impl KeyValueStore for FailingKvStore {
    async fn set(&self, _key: &str, _value: &str, _expiry_seconds: i64) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("store is down"))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, anyhow::Error> {
        Err(anyhow::anyhow!("store is down"))
    }

    async fn delete(&self, _key: &str) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("store is down"))
    }

    async fn exists(&self, _key: &str) -> Result<bool, anyhow::Error> {
        Err(anyhow::anyhow!("store is down"))
    }

    async fn incr(&self, _key: &str) -> Result<i64, anyhow::Error> {
        Err(anyhow::anyhow!("store is down"))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("store is down"))
    }
}
