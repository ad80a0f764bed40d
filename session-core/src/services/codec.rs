//! Token codec - signed claims encoding and decoding.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Header, Validation};
use rand::RngCore;

use crate::config::JwtConfig;
use crate::models::{TokenClaims, TokenType};
use crate::services::{AuthError, KeyStore};

/// A freshly minted token together with the claims embedded in it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Encodes and decodes signed token claims. Key material is owned by the
/// shared [`KeyStore`], so nothing here regenerates keys per call.
#[derive(Clone)]
pub struct TokenCodec {
    keys: Arc<KeyStore>,
    issuer: String,
    audience: String,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig, keys: Arc<KeyStore>) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    /// Get access token expiry in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    /// Mint a signed token. A fresh `jti` is generated on every call; callers
    /// never supply one.
    pub fn issue(
        &self,
        subject: &str,
        tenant_id: &str,
        org_id: Option<&str>,
        token_type: TokenType,
        family: Option<String>,
    ) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let exp = match token_type {
            TokenType::Access => now + Duration::minutes(self.access_token_expiry_minutes),
            TokenType::Refresh => now + Duration::days(self.refresh_token_expiry_days),
        };

        let claims = TokenClaims {
            sub: subject.to_string(),
            tenant_id: tenant_id.to_string(),
            org_id: org_id.map(|o| o.to_string()),
            jti: generate_jti(),
            token_type,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            family,
        };

        let (kid, encoding_key) = self.keys.signing_key()?;
        let mut header = Header::new(self.keys.algorithm());
        header.kid = Some(kid);

        let token = encode(&header, &claims, &encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))?;

        Ok(IssuedToken { token, claims })
    }

    /// Validate and decode a token.
    ///
    /// Expiry is checked with zero leeway when `verify_expiry` is set;
    /// passing false still verifies signature, issuer, and audience.
    pub fn decode(
        &self,
        token: &str,
        expected_type: TokenType,
        verify_expiry: bool,
    ) -> Result<TokenClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

        let mut validation = Validation::new(self.keys.algorithm());
        validation.validate_exp = verify_expiry;
        validation.leeway = 0;
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        // Try the key named in the header first, then the overlap keys.
        let mut keys = self.keys.verification_keys()?;
        if let Some(kid) = header.kid.as_deref() {
            keys.sort_by_key(|(candidate, _)| if candidate == kid { 0 } else { 1 });
        }

        for (_, decoding_key) in &keys {
            match decode::<TokenClaims>(token, decoding_key, &validation) {
                Ok(data) => {
                    let claims = data.claims;
                    if claims.token_type != expected_type {
                        return Err(AuthError::TokenTypeMismatch {
                            expected: expected_type,
                            actual: claims.token_type,
                        });
                    }
                    return Ok(claims);
                }
                Err(e) => match map_jwt_error(e) {
                    // A signature mismatch may just mean the wrong key; keep
                    // trying. Anything more specific means the signature
                    // checked out and the claims are the problem.
                    AuthError::MalformedToken => continue,
                    specific => return Err(specific),
                },
            }
        }

        Err(AuthError::MalformedToken)
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer => AuthError::WrongAudienceOrIssuer,
        _ => AuthError::MalformedToken,
    }
}

/// 128 bits of entropy, hex encoded.
fn generate_jti() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigningAlgorithm;
    use std::collections::HashSet;

    fn test_config() -> JwtConfig {
        JwtConfig {
            algorithm: SigningAlgorithm::Hs256,
            hmac_secret: Some("codec-test-secret-0123456789abcdef".to_string()),
            private_key_path: None,
            public_key_path: None,
            issuer: "https://auth.example.com".to_string(),
            audience: "example-platform".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    fn codec() -> TokenCodec {
        let config = test_config();
        let keys = Arc::new(KeyStore::from_config(&config).unwrap());
        TokenCodec::new(&config, keys)
    }

    /// Encode claims directly with the store's signing key, bypassing the
    /// codec's own claim construction.
    fn encode_raw(codec: &TokenCodec, claims: &TokenClaims) -> String {
        let (kid, key) = codec.keys.signing_key().unwrap();
        let mut header = Header::new(codec.keys.algorithm());
        header.kid = Some(kid);
        encode(&header, claims, &key).unwrap()
    }

    #[test]
    fn test_issue_and_decode_round_trip() {
        let codec = codec();
        let issued = codec
            .issue("user_123", "tenant_1", Some("org_1"), TokenType::Access, None)
            .unwrap();

        let claims = codec.decode(&issued.token, TokenType::Access, true).unwrap();
        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.tenant_id, "tenant_1");
        assert_eq!(claims.org_id.as_deref(), Some("org_1"));
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.jti, issued.claims.jti);
        assert!(claims.family.is_none());
    }

    #[test]
    fn test_refresh_token_carries_family() {
        let codec = codec();
        let issued = codec
            .issue("user_123", "tenant_1", None, TokenType::Refresh, Some("fam_1".to_string()))
            .unwrap();

        let claims = codec.decode(&issued.token, TokenType::Refresh, true).unwrap();
        assert_eq!(claims.family.as_deref(), Some("fam_1"));
    }

    #[test]
    fn test_jti_uniqueness_over_many_issuances() {
        let codec = codec();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let issued = codec
                .issue("user_123", "tenant_1", None, TokenType::Access, None)
                .unwrap();
            assert!(seen.insert(issued.claims.jti), "duplicate jti generated");
        }
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let codec = codec();
        let issued = codec
            .issue("user_123", "tenant_1", None, TokenType::Access, None)
            .unwrap();

        let err = codec.decode(&issued.token, TokenType::Refresh, true).unwrap_err();
        assert!(matches!(err, AuthError::TokenTypeMismatch { .. }));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let codec = codec();
        let mut claims = codec
            .issue("user_123", "tenant_1", None, TokenType::Access, None)
            .unwrap()
            .claims;
        claims.exp = Utc::now().timestamp() - 120;
        let token = encode_raw(&codec, &claims);

        let err = codec.decode(&token, TokenType::Access, true).unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
    }

    #[test]
    fn test_expired_token_decodes_without_expiry_check() {
        let codec = codec();
        let mut claims = codec
            .issue("user_123", "tenant_1", None, TokenType::Access, None)
            .unwrap()
            .claims;
        claims.exp = Utc::now().timestamp() - 120;
        let token = encode_raw(&codec, &claims);

        let decoded = codec.decode(&token, TokenType::Access, false).unwrap();
        assert_eq!(decoded.sub, "user_123");
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let codec = codec();
        let mut claims = codec
            .issue("user_123", "tenant_1", None, TokenType::Access, None)
            .unwrap()
            .claims;
        claims.aud = "some-other-audience".to_string();
        let token = encode_raw(&codec, &claims);

        let err = codec.decode(&token, TokenType::Access, true).unwrap_err();
        assert!(matches!(err, AuthError::WrongAudienceOrIssuer));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        let err = codec.decode("not-a-jwt", TokenType::Access, true).unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken));
    }

    #[test]
    fn test_tampered_signature_is_malformed() {
        let codec = codec();
        let issued = codec
            .issue("user_123", "tenant_1", None, TokenType::Access, None)
            .unwrap();
        let mut tampered = issued.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        let err = codec.decode(&tampered, TokenType::Access, true).unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken));
    }

    #[test]
    fn test_tokens_survive_key_rotation() {
        let config = test_config();
        let keys = Arc::new(KeyStore::from_config(&config).unwrap());
        let codec = TokenCodec::new(&config, keys.clone());

        let issued = codec
            .issue("user_123", "tenant_1", None, TokenType::Access, None)
            .unwrap();

        keys.rotate().unwrap();

        // Old token still verifies against the overlap key
        let claims = codec.decode(&issued.token, TokenType::Access, true).unwrap();
        assert_eq!(claims.sub, "user_123");

        // New tokens are signed with the new key
        let fresh = codec
            .issue("user_456", "tenant_1", None, TokenType::Access, None)
            .unwrap();
        let claims = codec.decode(&fresh.token, TokenType::Access, true).unwrap();
        assert_eq!(claims.sub, "user_456");
    }
}
