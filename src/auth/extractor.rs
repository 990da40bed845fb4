// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::claims::JwtClaims;
use super::{AuthenticatedUser, AuthError};
use crate::state::AppState;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Extractor for authenticated users.
///
/// Validates the JWT from the Authorization header and provides the
/// authenticated user information.
///
/// ## Authentication Modes
///
/// - **Production mode** (`AUTH_JWT_SECRET` set): HS256 signature verification
/// - **Development mode** (no secret): structure validation only
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = verify_jwt(
            token,
            state.config.jwt_secret.as_deref(),
            state.config.jwt_issuer.as_deref(),
        )?;

        Ok(Auth(user))
    }
}

/// Verify a JWT and extract user information.
fn verify_jwt(
    token: &str,
    secret: Option<&str>,
    issuer: Option<&str>,
) -> Result<AuthenticatedUser, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    if let Some(iss) = issuer {
        validation.set_issuer(&[iss]);
    }

    let key = match secret {
        Some(secret) => DecodingKey::from_secret(secret.as_bytes()),
        None => {
            // Development mode: accept unsigned-equivalent tokens. The claims
            // still have to parse and be unexpired.
            validation.insecure_disable_signature_validation();
            DecodingKey::from_secret(&[])
        }
    };

    let data = decode::<JwtClaims>(token, &key, &validation).map_err(map_jwt_error)?;

    if data.claims.sub.is_empty() {
        return Err(AuthError::MalformedToken);
    }
    Ok(data.claims.into())
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        _ => AuthError::MalformedToken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
        iat: i64,
        iss: String,
        name: Option<String>,
    }

    fn make_token(secret: &str, sub: &str, exp_offset: i64, iss: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            sub: sub.to_string(),
            exp: now + exp_offset,
            iat: now,
            iss: iss.to_string(),
            name: Some("Alice".to_string()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode token")
    }

    #[test]
    fn valid_token_verifies_with_secret() {
        let token = make_token("topsecret", "user-1", 3600, "beacon");
        let user = verify_jwt(&token, Some("topsecret"), None).unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = make_token("topsecret", "user-1", 3600, "beacon");
        let err = verify_jwt(&token, Some("other-secret"), None).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = make_token("topsecret", "user-1", -3600, "beacon");
        let err = verify_jwt(&token, Some("topsecret"), None).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn issuer_is_enforced_when_configured() {
        let token = make_token("topsecret", "user-1", 3600, "someone-else");
        let err = verify_jwt(&token, Some("topsecret"), Some("beacon")).unwrap_err();
        assert!(matches!(err, AuthError::InvalidIssuer));

        let good = make_token("topsecret", "user-1", 3600, "beacon");
        assert!(verify_jwt(&good, Some("topsecret"), Some("beacon")).is_ok());
    }

    #[test]
    fn dev_mode_skips_signature_but_not_structure() {
        let token = make_token("whatever", "user-1", 3600, "beacon");
        let user = verify_jwt(&token, None, None).unwrap();
        assert_eq!(user.user_id, "user-1");

        let err = verify_jwt("not-a-jwt", None, None).unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken));
    }
}
