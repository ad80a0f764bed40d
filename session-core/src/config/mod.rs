use serde::Deserialize;
use service_core::config::{get_env, load_dotenv, Environment};
use service_core::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub jwt: JwtConfig,
    pub redis: RedisConfig,
    pub permissions: PermissionCacheConfig,
    pub stores: StoreTimeoutConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SigningAlgorithm {
    Hs256,
    Rs256,
}

impl std::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningAlgorithm::Hs256 => f.write_str("HS256"),
            SigningAlgorithm::Rs256 => f.write_str("RS256"),
        }
    }
}

impl std::str::FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "RS256" => Ok(SigningAlgorithm::Rs256),
            _ => Err(format!("Invalid signing algorithm: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub algorithm: SigningAlgorithm,
    /// HS256 only
    pub hmac_secret: Option<String>,
    /// RS256 only
    pub private_key_path: Option<String>,
    /// RS256 only
    pub public_key_path: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionCacheConfig {
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreTimeoutConfig {
    pub timeout_ms: u64,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, AppError> {
        load_dotenv();

        let env_str = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let algorithm: SigningAlgorithm = get_env("JWT_ALGORITHM", Some("HS256"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let (hmac_secret, private_key_path, public_key_path) = match algorithm {
            SigningAlgorithm::Hs256 => {
                let secret = get_env(
                    "JWT_HMAC_SECRET",
                    Some("insecure-dev-secret-0123456789abcdef"),
                    is_prod,
                )?;
                (Some(secret), None, None)
            }
            SigningAlgorithm::Rs256 => (
                None,
                Some(get_env("JWT_PRIVATE_KEY_PATH", None, is_prod)?),
                Some(get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?),
            ),
        };

        let config = CoreConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("session-core"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            jwt: JwtConfig {
                algorithm,
                hmac_secret,
                private_key_path,
                public_key_path,
                issuer: get_env("JWT_ISSUER", Some("session-core"), is_prod)?,
                audience: get_env("JWT_AUDIENCE", Some("session-platform"), is_prod)?,
                access_token_expiry_minutes: parse_env(get_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("15"),
                    is_prod,
                )?)?,
                refresh_token_expiry_days: parse_env(get_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_DAYS",
                    Some("7"),
                    is_prod,
                )?)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", Some("redis://127.0.0.1:6379"), is_prod)?,
            },
            permissions: PermissionCacheConfig {
                ttl_seconds: parse_env(get_env(
                    "PERMISSION_CACHE_TTL_SECONDS",
                    Some("300"),
                    is_prod,
                )?)?,
            },
            stores: StoreTimeoutConfig {
                timeout_ms: parse_env(get_env("STORE_TIMEOUT_MS", Some("2000"), is_prod)?)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.permissions.ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PERMISSION_CACHE_TTL_SECONDS must be positive"
            )));
        }

        if self.stores.timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORE_TIMEOUT_MS must be positive"
            )));
        }

        match self.jwt.algorithm {
            SigningAlgorithm::Hs256 => {
                if self.jwt.hmac_secret.as_deref().map_or(true, |s| s.is_empty()) {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "JWT_HMAC_SECRET is required for HS256"
                    )));
                }
            }
            SigningAlgorithm::Rs256 => {
                if self.jwt.private_key_path.is_none() || self.jwt.public_key_path.is_none() {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "JWT_PRIVATE_KEY_PATH and JWT_PUBLIC_KEY_PATH are required for RS256"
                    )));
                }
            }
        }

        if self.environment == Environment::Prod {
            if let Some(secret) = &self.jwt.hmac_secret {
                if secret.starts_with("insecure-") {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "Dev HMAC secret not allowed in production"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn parse_env<T>(value: String) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> CoreConfig {
        CoreConfig {
            environment: Environment::Dev,
            service_name: "session-core".to_string(),
            service_version: "2.0.0".to_string(),
            log_level: "info".to_string(),
            jwt: JwtConfig {
                algorithm: SigningAlgorithm::Hs256,
                hmac_secret: Some("config-test-secret-0123456789abcdef".to_string()),
                private_key_path: None,
                public_key_path: None,
                issuer: "session-core".to_string(),
                audience: "session-platform".to_string(),
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

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_non_positive_ttls_are_rejected() {
        let mut config = base_config();
        config.jwt.access_token_expiry_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.jwt.refresh_token_expiry_days = -1;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.permissions.ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hs256_requires_secret() {
        let mut config = base_config();
        config.jwt.hmac_secret = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rs256_requires_key_paths() {
        let mut config = base_config();
        config.jwt.algorithm = SigningAlgorithm::Rs256;
        config.jwt.hmac_secret = None;
        assert!(config.validate().is_err());

        config.jwt.private_key_path = Some("/etc/keys/private.pem".to_string());
        config.jwt.public_key_path = Some("/etc/keys/public.pem".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prod_rejects_dev_secret() {
        let mut config = base_config();
        config.environment = Environment::Prod;
        config.jwt.hmac_secret = Some("insecure-dev-secret-0123456789abcdef".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("hs256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::Hs256);
        assert_eq!("RS256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::Rs256);
        assert!("ES256".parse::<SigningAlgorithm>().is_err());
    }
}
