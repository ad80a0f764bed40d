//! Store traits consumed by the token and permission services.
//!
//! The durable backends (SQL, managed caches) live in other services; this
//! crate only speaks these interfaces. The in-memory implementations back the
//! test suites and single-process deployments.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Policy, Role, Session};
use crate::services::AuthError;

/// Field updates applied to a session when its refresh token rotates.
#[derive(Debug, Clone)]
pub struct SessionRotation {
    pub access_jti: String,
    pub refresh_jti: String,
    pub refresh_token_hash: String,
    pub access_expires_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Durable session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_session(&self, session: &Session) -> Result<(), AuthError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AuthError>;

    async fn get_session_by_refresh_jti(
        &self,
        refresh_jti: &str,
    ) -> Result<Option<Session>, AuthError>;

    /// Conditional rotation: the update applies only while the row's
    /// `refresh_jti` still equals `expected_refresh_jti` and the session is
    /// not revoked (`UPDATE ... WHERE refresh_jti = :old` semantics). Returns
    /// false when another caller rotated or revoked first.
    async fn update_session_jtis(
        &self,
        session_id: &str,
        expected_refresh_jti: &str,
        rotation: &SessionRotation,
    ) -> Result<bool, AuthError>;

    /// Set `revoked_at` once; later calls with other reasons are no-ops.
    async fn mark_session_revoked(&self, session_id: &str, reason: &str) -> Result<(), AuthError>;

    async fn find_sessions_by_family(&self, family: &str) -> Result<Vec<Session>, AuthError>;

    async fn find_sessions_by_principal(
        &self,
        principal_id: &str,
    ) -> Result<Vec<Session>, AuthError>;
}

/// Role-assignment lookup.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn get_role(&self, principal_id: &str, org_id: &str) -> Result<Option<Role>, AuthError>;

    async fn is_super_admin(&self, principal_id: &str) -> Result<bool, AuthError>;
}

/// Read-only policy lookup for permission evaluation.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Live policies for an org matching the requested permission string.
    async fn find_active_policies(
        &self,
        org_id: &str,
        permission: &str,
    ) -> Result<Vec<Policy>, AuthError>;
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> AuthError {
    AuthError::Internal(anyhow::anyhow!("Store mutex poisoned: {}", e))
}

/// In-memory session store keyed by session id.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_session(&self, session: &Session) -> Result<(), AuthError> {
        self.sessions
            .lock()
            .map_err(poisoned)?
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AuthError> {
        Ok(self.sessions.lock().map_err(poisoned)?.get(session_id).cloned())
    }

    async fn get_session_by_refresh_jti(
        &self,
        refresh_jti: &str,
    ) -> Result<Option<Session>, AuthError> {
        Ok(self
            .sessions
            .lock()
            .map_err(poisoned)?
            .values()
            .find(|s| s.refresh_jti == refresh_jti)
            .cloned())
    }

    async fn update_session_jtis(
        &self,
        session_id: &str,
        expected_refresh_jti: &str,
        rotation: &SessionRotation,
    ) -> Result<bool, AuthError> {
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        match sessions.get_mut(session_id) {
            Some(session)
                if session.refresh_jti == expected_refresh_jti && !session.is_revoked() =>
            {
                session.access_jti = rotation.access_jti.clone();
                session.refresh_jti = rotation.refresh_jti.clone();
                session.refresh_token_hash = rotation.refresh_token_hash.clone();
                session.access_expires_at = rotation.access_expires_at;
                session.expires_at = rotation.expires_at;
                session.refreshed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_session_revoked(&self, session_id: &str, reason: &str) -> Result<(), AuthError> {
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        if let Some(session) = sessions.get_mut(session_id) {
            if session.revoked_at.is_none() {
                session.revoked_at = Some(Utc::now());
                session.revoked_reason = Some(reason.to_string());
            }
        }
        Ok(())
    }

    async fn find_sessions_by_family(&self, family: &str) -> Result<Vec<Session>, AuthError> {
        Ok(self
            .sessions
            .lock()
            .map_err(poisoned)?
            .values()
            .filter(|s| s.family == family)
            .cloned()
            .collect())
    }

    async fn find_sessions_by_principal(
        &self,
        principal_id: &str,
    ) -> Result<Vec<Session>, AuthError> {
        Ok(self
            .sessions
            .lock()
            .map_err(poisoned)?
            .values()
            .filter(|s| s.principal_id == principal_id)
            .cloned()
            .collect())
    }
}

/// In-memory role assignments, writable for test setup.
pub struct InMemoryRoleDirectory {
    roles: Mutex<HashMap<(String, String), Role>>,
    super_admins: Mutex<HashSet<String>>,
}

impl Default for InMemoryRoleDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoleDirectory {
    pub fn new() -> Self {
        Self {
            roles: Mutex::new(HashMap::new()),
            super_admins: Mutex::new(HashSet::new()),
        }
    }

    pub fn assign_role(&self, principal_id: &str, org_id: &str, role: Role) {
        if let Ok(mut roles) = self.roles.lock() {
            roles.insert((principal_id.to_string(), org_id.to_string()), role);
        }
    }

    pub fn remove_role(&self, principal_id: &str, org_id: &str) {
        if let Ok(mut roles) = self.roles.lock() {
            roles.remove(&(principal_id.to_string(), org_id.to_string()));
        }
    }

    pub fn add_super_admin(&self, principal_id: &str) {
        if let Ok(mut admins) = self.super_admins.lock() {
            admins.insert(principal_id.to_string());
        }
    }
}

#[async_trait]
impl RoleDirectory for InMemoryRoleDirectory {
    async fn get_role(&self, principal_id: &str, org_id: &str) -> Result<Option<Role>, AuthError> {
        Ok(self
            .roles
            .lock()
            .map_err(poisoned)?
            .get(&(principal_id.to_string(), org_id.to_string()))
            .copied())
    }

    async fn is_super_admin(&self, principal_id: &str) -> Result<bool, AuthError> {
        Ok(self.super_admins.lock().map_err(poisoned)?.contains(principal_id))
    }
}

/// In-memory policy store, writable for test setup.
pub struct InMemoryPolicyStore {
    policies: Mutex<Vec<Policy>>,
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self {
            policies: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, policy: Policy) {
        if let Ok(mut policies) = self.policies.lock() {
            policies.push(policy);
        }
    }

    pub fn deactivate(&self, policy_id: &str) {
        if let Ok(mut policies) = self.policies.lock() {
            if let Some(policy) = policies.iter_mut().find(|p| p.policy_id == policy_id) {
                policy.deactivate();
            }
        }
    }

    pub fn soft_delete(&self, policy_id: &str) {
        if let Ok(mut policies) = self.policies.lock() {
            if let Some(policy) = policies.iter_mut().find(|p| p.policy_id == policy_id) {
                policy.soft_delete();
            }
        }
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn find_active_policies(
        &self,
        org_id: &str,
        permission: &str,
    ) -> Result<Vec<Policy>, AuthError> {
        Ok(self
            .policies
            .lock()
            .map_err(poisoned)?
            .iter()
            .filter(|p| p.org_id == org_id && p.permission == permission && p.is_live())
            .cloned()
            .collect())
    }
}
