//! Services layer for the session security core.
//!
//! Key material, token codec, revocation ledger, token lifecycle
//! orchestration, and permission evaluation.

mod codec;
pub mod error;
mod keystore;
mod permission;
pub mod redis;
mod revocation;
mod token;

pub use codec::{IssuedToken, TokenCodec};
pub use error::AuthError;
pub use keystore::{Jwk, Jwks, KeyStatus, KeyStore};
pub use permission::{has_sufficient_role, permission_matches, PermissionEngine};
pub use redis::{InMemoryKvStore, KeyValueStore, RedisService};
pub use revocation::RevocationLedger;
pub use token::{IntrospectResponse, TokenResponse, TokenService};
