//! Bearer token verification (HS256 JWTs signed with the shared secret).

use std::collections::HashSet;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Claims carried by a gateway bearer token.
///
/// `id` and `email` are the fields the gateway reads; everything else the
/// issuer put in the token is preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID. Optional: a token without one still authenticates, but the
    /// connection is not indexed by user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration (unix timestamp). Validated only when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    /// Identifier used in logs: email when available, otherwise the user ID.
    pub fn display_name(&self) -> &str {
        self.email
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("anonymous")
    }
}

/// Verify a token against the shared secret and return its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Tokens minted by the login service may omit `exp`.
    validation.required_spec_claims = HashSet::new();
    validation.validate_aud = false;

    let key = DecodingKey::from_secret(secret.as_bytes());
    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(?e, "token verification failed");
            AuthError::InvalidCredential(e.to_string())
        })
}

/// Sign claims with the shared secret.
pub fn mint_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let key = EncodingKey::from_secret(secret.as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn verifies_token_signed_with_same_secret() {
        let mut claims = Claims::for_user("usr_1");
        claims.email = Some("one@example.com".into());
        claims
            .extra
            .insert("role".into(), Value::String("admin".into()));

        let token = mint_token(&claims, SECRET).unwrap();
        let decoded = verify_token(&token, SECRET).unwrap();

        assert_eq!(decoded.id.as_deref(), Some("usr_1"));
        assert_eq!(decoded.display_name(), "one@example.com");
        assert_eq!(decoded.extra.get("role"), Some(&Value::String("admin".into())));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let token = mint_token(&Claims::for_user("usr_1"), "other").unwrap();
        let err = verify_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential(_)));
    }

    #[test]
    fn rejects_expired_token() {
        let claims = Claims {
            exp: Some(chrono::Utc::now().timestamp() - 3600),
            ..Claims::for_user("usr_1")
        };
        let token = mint_token(&claims, SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn accepts_token_without_exp() {
        let token = mint_token(&Claims::for_user("usr_1"), SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(verify_token("not-a-jwt", SECRET).is_err());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        assert_eq!(Claims::for_user("usr_9").display_name(), "usr_9");
        assert_eq!(Claims::default().display_name(), "anonymous");
    }
}
