//! Token service - session issuance, verification, rotation, revocation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::timeout;

use crate::db::{SessionRotation, SessionStore};
use crate::models::{Principal, Session, SessionInfo, TokenClaims, TokenType};
use crate::services::{AuthError, KeyValueStore, RevocationLedger, TokenCodec};

const SESSION_CACHE_PREFIX: &str = "session:";

/// Token response returned to the client
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// RFC 7662-shaped introspection result.
#[derive(Debug, Serialize)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl IntrospectResponse {
    fn inactive() -> Self {
        Self {
            active: false,
            sub: None,
            tenant_id: None,
            org_id: None,
            exp: None,
            iat: None,
            jti: None,
        }
    }

    fn active(claims: TokenClaims) -> Self {
        Self {
            active: true,
            sub: Some(claims.sub),
            tenant_id: Some(claims.tenant_id),
            org_id: claims.org_id,
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            jti: Some(claims.jti),
        }
    }
}

/// Orchestrates the token lifecycle: issuance, the verify hot path, refresh
/// rotation with reuse detection, and revocation.
#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    ledger: RevocationLedger,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<dyn KeyValueStore>,
    store_timeout: Duration,
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        ledger: RevocationLedger,
        sessions: Arc<dyn SessionStore>,
        cache: Arc<dyn KeyValueStore>,
        store_timeout_ms: u64,
    ) -> Self {
        Self {
            codec,
            ledger,
            sessions,
            cache,
            store_timeout: Duration::from_millis(store_timeout_ms),
        }
    }

    /// Open a session: mint an access/refresh pair under a fresh family and
    /// persist the session record.
    pub async fn create_session(
        &self,
        principal: &Principal,
        org_id: Option<&str>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(TokenResponse, Session), AuthError> {
        if !principal.is_active() {
            return Err(AuthError::PrincipalInactive);
        }

        let family = uuid::Uuid::new_v4().to_string();

        let access = self.codec.issue(
            &principal.id,
            &principal.tenant_id,
            org_id,
            TokenType::Access,
            None,
        )?;
        let refresh = self.codec.issue(
            &principal.id,
            &principal.tenant_id,
            org_id,
            TokenType::Refresh,
            Some(family.clone()),
        )?;

        let session = Session::new(
            &access.claims,
            &refresh.claims,
            family,
            Session::hash_refresh_token(&refresh.token),
            ip_address,
            user_agent,
        );

        self.sessions.save_session(&session).await?;
        self.cache_session(&session).await;

        tracing::info!(
            principal_id = %principal.id,
            session_id = %session.session_id,
            "Session created"
        );

        Ok((
            TokenResponse {
                access_token: access.token,
                refresh_token: refresh.token,
                token_type: "Bearer".to_string(),
                expires_in: self.codec.access_token_expiry_seconds(),
            },
            session,
        ))
    }

    /// Verify a presented token. This is the hot path: one decode plus one
    /// ledger read, with the ledger consulted under a bounded timeout that
    /// fails closed.
    pub async fn verify(
        &self,
        token: &str,
        expected_type: TokenType,
    ) -> Result<TokenClaims, AuthError> {
        let claims = self.codec.decode(token, expected_type, true)?;

        if self.bounded_check(self.ledger.is_revoked(&claims.jti)).await? {
            return Err(AuthError::TokenRevoked);
        }

        Ok(claims)
    }

    /// Rotate a refresh token.
    ///
    /// Presenting an already-rotated token, a token whose session is gone, or
    /// losing the conditional update race are all treated as theft signals:
    /// the whole family is revoked before the error is returned.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let claims = self.verify(refresh_token, TokenType::Refresh).await?;
        let family = match claims.family.clone() {
            Some(family) => family,
            None => return Err(AuthError::MalformedToken),
        };

        if self.bounded_check(self.ledger.is_used(&claims.jti)).await? {
            tracing::warn!(family = %family, "Refresh token reuse detected");
            self.revoke_family(&family).await?;
            return Err(AuthError::RefreshReuseDetected);
        }

        let session = match self.sessions.get_session_by_refresh_jti(&claims.jti).await? {
            Some(session) if session.is_active() => session,
            _ => {
                tracing::warn!(family = %family, "Refresh token without live session, revoking family");
                self.revoke_family(&family).await?;
                return Err(AuthError::RefreshReuseDetected);
            }
        };

        if !session.matches_refresh_token(refresh_token) {
            tracing::warn!(session_id = %session.session_id, "Refresh token hash mismatch");
            return Err(AuthError::MalformedToken);
        }

        let access = self.codec.issue(
            &claims.sub,
            &claims.tenant_id,
            claims.org_id.as_deref(),
            TokenType::Access,
            None,
        )?;
        let new_refresh = self.codec.issue(
            &claims.sub,
            &claims.tenant_id,
            claims.org_id.as_deref(),
            TokenType::Refresh,
            Some(family.clone()),
        )?;

        let rotation = SessionRotation {
            access_jti: access.claims.jti.clone(),
            refresh_jti: new_refresh.claims.jti.clone(),
            refresh_token_hash: Session::hash_refresh_token(&new_refresh.token),
            access_expires_at: access.claims.expires_at(),
            expires_at: new_refresh.claims.expires_at(),
        };

        let rotated = self
            .sessions
            .update_session_jtis(&session.session_id, &claims.jti, &rotation)
            .await?;
        if !rotated {
            // A concurrent refresh with the same token won the row update;
            // this caller is holding a stale token.
            tracing::warn!(family = %family, "Concurrent refresh with a stale token");
            self.revoke_family(&family).await?;
            return Err(AuthError::RefreshReuseDetected);
        }

        self.bounded_write(self.ledger.mark_used(&claims.jti, claims.remaining_ttl_seconds()))
            .await?;

        if let Ok(Some(updated)) = self.sessions.get_session(&session.session_id).await {
            self.cache_session(&updated).await;
        }

        tracing::info!(
            principal_id = %claims.sub,
            session_id = %session.session_id,
            "Refresh token rotated"
        );

        Ok(TokenResponse {
            access_token: access.token,
            refresh_token: new_refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.codec.access_token_expiry_seconds(),
        })
    }

    /// Revoke every session sharing a refresh-token family and blacklist
    /// their jtis for the remainder of each token's lifetime.
    pub async fn revoke_family(&self, family: &str) -> Result<(), AuthError> {
        let sessions = self.sessions.find_sessions_by_family(family).await?;
        let mut failed = false;

        for session in &sessions {
            if session.revoked_at.is_none() {
                self.sessions
                    .mark_session_revoked(&session.session_id, "family_revoked")
                    .await?;
            }
            failed |= self.blacklist_session_jtis(session).await.is_err();
            self.drop_cached_session(&session.session_id).await;
        }

        tracing::warn!(family = %family, sessions = sessions.len(), "Token family revoked");

        if failed {
            return Err(AuthError::ServiceUnavailable);
        }
        Ok(())
    }

    /// Terminate one session. Returns false (a no-op) when the session does
    /// not exist or belongs to another principal.
    pub async fn logout(&self, session_id: &str, principal_id: &str) -> Result<bool, AuthError> {
        let session = match self.sessions.get_session(session_id).await? {
            Some(session) => session,
            None => return Ok(false),
        };
        if session.principal_id != principal_id {
            return Ok(false);
        }

        if session.revoked_at.is_none() {
            self.sessions.mark_session_revoked(session_id, "logout").await?;
        }
        self.blacklist_session_jtis(&session).await?;
        self.drop_cached_session(session_id).await;

        tracing::info!(principal_id = %principal_id, session_id = %session_id, "Session logged out");
        Ok(true)
    }

    /// Revoke every active session of a principal (password reset, account
    /// suspension). Returns how many sessions were terminated.
    pub async fn revoke_principal_sessions(&self, principal_id: &str) -> Result<usize, AuthError> {
        let sessions = self.sessions.find_sessions_by_principal(principal_id).await?;
        let mut revoked = 0;

        for session in sessions.iter().filter(|s| s.is_active()) {
            self.sessions
                .mark_session_revoked(&session.session_id, "principal_revoked")
                .await?;
            self.blacklist_session_jtis(session).await?;
            self.drop_cached_session(&session.session_id).await;
            revoked += 1;
        }

        if revoked > 0 {
            tracing::info!(principal_id = %principal_id, sessions = revoked, "Principal sessions revoked");
        }
        Ok(revoked)
    }

    /// Active sessions of a principal, for self-service listing.
    pub async fn list_sessions(&self, principal_id: &str) -> Result<Vec<SessionInfo>, AuthError> {
        let sessions = self.sessions.find_sessions_by_principal(principal_id).await?;
        Ok(sessions
            .iter()
            .filter(|s| s.is_active())
            .map(SessionInfo::from)
            .collect())
    }

    /// Introspect an access token. Any verification failure reads as
    /// inactive; no detail is exposed.
    pub async fn introspect(&self, token: &str) -> IntrospectResponse {
        match self.verify(token, TokenType::Access).await {
            Ok(claims) => IntrospectResponse::active(claims),
            Err(_) => IntrospectResponse::inactive(),
        }
    }

    async fn blacklist_session_jtis(&self, session: &Session) -> Result<(), AuthError> {
        self.bounded_write(
            self.ledger
                .mark_revoked(&session.access_jti, remaining_seconds(session.access_expires_at)),
        )
        .await?;
        self.bounded_write(
            self.ledger
                .mark_revoked(&session.refresh_jti, remaining_seconds(session.expires_at)),
        )
        .await
    }

    /// Ledger read with a bounded timeout. Failures deny (fail closed): an
    /// unreachable revocation store must not let revoked tokens through.
    async fn bounded_check<F>(&self, fut: F) -> Result<bool, AuthError>
    where
        F: Future<Output = Result<bool, anyhow::Error>>,
    {
        match timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Revocation ledger check failed");
                Err(AuthError::ServiceUnavailable)
            }
            Err(_) => {
                tracing::error!("Revocation ledger check timed out");
                Err(AuthError::ServiceUnavailable)
            }
        }
    }

    async fn bounded_write<F>(&self, fut: F) -> Result<(), AuthError>
    where
        F: Future<Output = Result<(), anyhow::Error>>,
    {
        match timeout(self.store_timeout, fut).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Revocation ledger write failed");
                Err(AuthError::ServiceUnavailable)
            }
            Err(_) => {
                tracing::error!("Revocation ledger write timed out");
                Err(AuthError::ServiceUnavailable)
            }
        }
    }

    /// Best-effort fast-lookup mirror of the session row.
    async fn cache_session(&self, session: &Session) {
        let key = format!("{}{}", SESSION_CACHE_PREFIX, session.session_id);
        let payload = match serde_json::to_string(session) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize session for cache");
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set(&key, &payload, remaining_seconds(session.expires_at))
            .await
        {
            tracing::warn!(error = %e, "Failed to cache session");
        }
    }

    async fn drop_cached_session(&self, session_id: &str) {
        let key = format!("{}{}", SESSION_CACHE_PREFIX, session_id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(error = %e, "Failed to drop cached session");
        }
    }
}

fn remaining_seconds(at: DateTime<Utc>) -> i64 {
    (at - Utc::now()).num_seconds().max(1)
}
