mod common;

use common::{build_core, test_principal};
use session_core::models::TokenType;

#[tokio::test]
async fn test_tokens_outlive_key_rotation() {
    let app = build_core();
    let principal = test_principal("user_keys");

    let (tokens, _) = app
        .core
        .tokens()
        .create_session(&principal, None, None, None)
        .await
        .unwrap();

    let old_kid = app.core.keys().current_key_id().unwrap();
    let new_kid = app.core.keys().rotate().unwrap();
    assert_ne!(old_kid, new_kid);

    // Tokens signed before the rotation keep verifying through the overlap
    // window
    assert!(app
        .core
        .tokens()
        .verify(&tokens.access_token, TokenType::Access)
        .await
        .is_ok());

    // New sessions sign with the new key and verify too
    let (fresh, _) = app
        .core
        .tokens()
        .create_session(&principal, None, None, None)
        .await
        .unwrap();
    assert!(app
        .core
        .tokens()
        .verify(&fresh.access_token, TokenType::Access)
        .await
        .is_ok());

    // Once the old key is retired, its tokens stop verifying
    assert!(app.core.keys().retire(&old_kid).unwrap());
    assert!(app
        .core
        .tokens()
        .verify(&tokens.access_token, TokenType::Access)
        .await
        .is_err());
}

#[tokio::test]
async fn test_symmetric_deployment_publishes_no_keys() {
    let app = build_core();
    let jwks = app.core.public_keys().unwrap();
    assert!(jwks.keys.is_empty());
}
