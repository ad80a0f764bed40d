use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Authentication error: {0}")]
    AuthError(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

/// Transport-agnostic outcome class. The routing layer (out of scope here)
/// maps these onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    ServiceUnavailable,
    Internal,
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::BadRequest(_) => ErrorCode::BadRequest,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Unauthorized(_) | AppError::AuthError(_) | AppError::InvalidToken(_) => {
                ErrorCode::Unauthorized
            }
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::ServiceUnavailable => ErrorCode::ServiceUnavailable,
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::RedisError(_)
            | AppError::ConfigError(_) => ErrorCode::Internal,
        }
    }

    /// Message safe to show to an end user. Authentication failures collapse
    /// to one uniform string so callers cannot probe which check failed, and
    /// internal errors never leak their cause.
    pub fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(e) => e.to_string(),
            AppError::NotFound(e) => e.to_string(),
            AppError::Conflict(e) => e.to_string(),
            AppError::Unauthorized(_) | AppError::AuthError(_) | AppError::InvalidToken(_) => {
                "Invalid credentials or token".to_string()
            }
            AppError::Forbidden(_) => "Permission denied".to_string(),
            AppError::ServiceUnavailable => "Service temporarily unavailable".to_string(),
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::RedisError(_)
            | AppError::ConfigError(_) => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_share_one_public_message() {
        let unauthorized = AppError::Unauthorized(anyhow::anyhow!("jti was blacklisted"));
        let auth = AppError::AuthError(anyhow::anyhow!("password mismatch for bob@example.com"));

        assert_eq!(unauthorized.public_message(), auth.public_message());
        assert!(!auth.public_message().contains("bob@example.com"));
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = AppError::DatabaseError(anyhow::anyhow!("connection refused to 10.0.0.5:5432"));
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(err.public_message(), "Internal server error");
    }
}
