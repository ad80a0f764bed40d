//! Session model - durable record of one login and its token pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::TokenClaims;

/// Persisted link between a principal and the jti pair minted at login.
///
/// The row is rewritten at every refresh (jti fields move forward) and
/// terminated by setting `revoked_at`. `family` joins all sessions descended
/// from one login, which is what reuse detection revokes as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub principal_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub org_id: Option<String>,
    pub family: String,
    pub access_jti: String,
    pub refresh_jti: String,
    /// SHA-256 of the refresh JWT; the raw token is never stored
    pub refresh_token_hash: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub access_expires_at: DateTime<Utc>,
    /// Refresh expiry; also the session's own lifetime
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub refreshed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_reason: Option<String>,
}

impl Session {
    /// Create a session for a freshly minted token pair.
    pub fn new(
        access: &TokenClaims,
        refresh: &TokenClaims,
        family: String,
        refresh_token_hash: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            principal_id: access.sub.clone(),
            tenant_id: access.tenant_id.clone(),
            org_id: access.org_id.clone(),
            family,
            access_jti: access.jti.clone(),
            refresh_jti: refresh.jti.clone(),
            refresh_token_hash,
            ip_address,
            user_agent,
            access_expires_at: access.expires_at(),
            expires_at: refresh.expires_at(),
            created_at: Utc::now(),
            refreshed_at: None,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    /// Hash a refresh token with SHA-256 for at-rest storage.
    pub fn hash_refresh_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Constant-time comparison of a presented refresh token against the
    /// stored hash.
    pub fn matches_refresh_token(&self, token: &str) -> bool {
        let presented = Self::hash_refresh_token(token);
        presented
            .as_bytes()
            .ct_eq(self.refresh_token_hash.as_bytes())
            .into()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Not revoked and not expired.
    pub fn is_active(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }
}

/// Session view for listing endpoints.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<&Session> for SessionInfo {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.session_id.clone(),
            created_at: s.created_at,
            expires_at: s.expires_at,
            refreshed_at: s.refreshed_at,
            ip_address: s.ip_address.clone(),
            user_agent: s.user_agent.clone(),
        }
    }
}
