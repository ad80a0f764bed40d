//! session-core: token lifecycle and session security core.
//!
//! JWT access/refresh issuance, refresh rotation with reuse detection,
//! revocation, and RBAC permission evaluation. Transport layers (HTTP, gRPC)
//! live in other services and reach this crate through [`SessionCore`].

pub mod config;
pub mod db;
pub mod models;
pub mod services;

use std::sync::Arc;

use service_core::error::AppError;

use crate::config::CoreConfig;
use crate::db::{PolicyStore, RoleDirectory, SessionStore};
use crate::services::{
    Jwks, KeyStore, KeyValueStore, PermissionEngine, RevocationLedger, TokenCodec, TokenService,
};

/// Top-level service object, constructed once at process start and handed to
/// request handlers by reference. All collaborators are injected, so tests
/// swap in the in-memory stores from [`db`].
#[derive(Clone)]
pub struct SessionCore {
    config: CoreConfig,
    keys: Arc<KeyStore>,
    tokens: TokenService,
    permissions: PermissionEngine,
    kv: Arc<dyn KeyValueStore>,
}

impl SessionCore {
    /// Wire the core. Fails when the configured key material is unusable;
    /// the process must not come up without a signing key.
    pub fn new(
        config: CoreConfig,
        sessions: Arc<dyn SessionStore>,
        roles: Arc<dyn RoleDirectory>,
        policies: Arc<dyn PolicyStore>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Result<Self, AppError> {
        let keys = Arc::new(KeyStore::from_config(&config.jwt).map_err(AppError::ConfigError)?);
        let codec = TokenCodec::new(&config.jwt, keys.clone());
        let ledger = RevocationLedger::new(kv.clone());
        let tokens = TokenService::new(
            codec,
            ledger,
            sessions,
            kv.clone(),
            config.stores.timeout_ms,
        );
        let permissions = PermissionEngine::new(
            roles,
            policies,
            kv.clone(),
            config.permissions.ttl_seconds,
        );

        Ok(Self {
            config,
            keys,
            tokens,
            permissions,
            kv,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn permissions(&self) -> &PermissionEngine {
        &self.permissions
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// JWKS document for the well-known endpoint.
    pub fn public_keys(&self) -> Result<Jwks, AppError> {
        self.keys.jwks().map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.kv.health_check().await.map_err(AppError::InternalError)
    }
}
