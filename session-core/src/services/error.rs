use service_core::error::AppError;
use thiserror::Error;

use crate::models::TokenType;

/// Domain errors for the token and permission core.
///
/// "Deny" outcomes (expected, common) and faults (unexpected, rare) are kept
/// as distinct variants so callers never have to guess which one they hit.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Token audience or issuer mismatch")]
    WrongAudienceOrIssuer,

    #[error("Token type mismatch: expected {expected}, got {actual}")]
    TokenTypeMismatch {
        expected: TokenType,
        actual: TokenType,
    },

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Refresh token reuse detected")]
    RefreshReuseDetected,

    #[error("Principal is not active")]
    PrincipalInactive,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Principal has no role in the organization")]
    NotAMember,

    #[error("Backing store unavailable")]
    ServiceUnavailable,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// True for every failure that should be answered with the uniform
    /// "invalid credentials or token" message.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::ExpiredToken
                | AuthError::WrongAudienceOrIssuer
                | AuthError::TokenTypeMismatch { .. }
                | AuthError::TokenRevoked
                | AuthError::RefreshReuseDetected
                | AuthError::PrincipalInactive
        )
    }

    /// Message safe to show to an end user. Authentication failures all read
    /// the same and authorization failures never confirm whether the target
    /// exists.
    pub fn public_message(&self) -> &'static str {
        match self {
            _ if self.is_authentication_failure() => "Invalid credentials or token",
            AuthError::PermissionDenied | AuthError::NotAMember => "Permission denied",
            AuthError::ServiceUnavailable => "Service temporarily unavailable",
            _ => "Internal server error",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            e if e.is_authentication_failure() => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials or token"))
            }
            AuthError::PermissionDenied | AuthError::NotAMember => {
                AppError::Forbidden(anyhow::anyhow!("Permission denied"))
            }
            AuthError::ServiceUnavailable => AppError::ServiceUnavailable,
            AuthError::Redis(e) => AppError::RedisError(e),
            AuthError::Store(e) => AppError::DatabaseError(e),
            AuthError::Internal(e) => AppError::InternalError(e),
            // is_authentication_failure covers the remaining variants
            _ => AppError::InternalError(anyhow::anyhow!("Unhandled auth error")),
        }
    }
}
