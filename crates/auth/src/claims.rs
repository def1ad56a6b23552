//! Access-token claims and HS256 signing/verification.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use billscribe_core::UserId;

use crate::error::AuthError;

/// Claims carried by a short-lived access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Authenticated user.
    pub sub: UserId,
    pub email: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
}

/// Sign an access token for the given user, valid for `ttl` from now.
pub fn sign_access_token(
    secret: &str,
    user_id: UserId,
    email: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id,
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenEncode(e.to_string()))
}

/// Verify signature and expiry, returning the claims.
pub fn verify_access_token(secret: &str, token: &str) -> Result<AccessClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn sign_then_verify_returns_the_claims() {
        let user_id = UserId::new();
        let token =
            sign_access_token(SECRET, user_id, "ada@example.com", Duration::minutes(15)).unwrap();

        let claims = verify_access_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "ada@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign_access_token(SECRET, UserId::new(), "a@b.c", Duration::minutes(-5))
            .unwrap();
        assert!(matches!(
            verify_access_token(SECRET, &token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token =
            sign_access_token(SECRET, UserId::new(), "a@b.c", Duration::minutes(5)).unwrap();
        assert!(matches!(
            verify_access_token("other-secret", &token),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_access_token(SECRET, "not.a.jwt").is_err());
    }

    proptest! {
        #[test]
        fn any_email_round_trips(email in "[a-z]{1,16}@[a-z]{1,12}\\.[a-z]{2,4}") {
            let user_id = UserId::new();
            let token =
                sign_access_token(SECRET, user_id, &email, Duration::minutes(5)).unwrap();
            let claims = verify_access_token(SECRET, &token).unwrap();
            prop_assert_eq!(claims.email, email);
            prop_assert_eq!(claims.sub, user_id);
        }
    }
}
