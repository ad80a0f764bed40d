use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Token kind carried in the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

/// Claims carried by both access and refresh tokens.
///
/// `jti` is generated at issuance and is unique per token; `family` is only
/// present on refresh tokens and stays stable across a rotation chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (principal ID)
    pub sub: String,
    /// Tenant the principal belongs to
    pub tenant_id: String,
    /// Organization scope, when the session was opened against one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Token identifier (for revocation tracking)
    pub jti: String,
    /// Token kind
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Refresh-token family, shared by every token descended from one login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }

    /// Seconds until expiry, clamped to at least one second so a revocation
    /// entry keyed on this token always outlives it.
    pub fn remaining_ttl_seconds(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(1)
    }
}
