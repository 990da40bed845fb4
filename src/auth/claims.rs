// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims expected in a bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID) - the canonical user identifier
    pub sub: String,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    #[allow(dead_code)]
    pub iat: i64,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Session ID
    #[serde(default)]
    pub sid: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Authenticated user information extracted from a verified JWT.
///
/// This is the primary type used throughout the application to represent
/// the authenticated user making a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,
    /// Display name, when the token carries one
    pub name: Option<String>,
    /// Session ID, when the token carries one
    pub session_id: Option<String>,
}

impl From<JwtClaims> for AuthenticatedUser {
    fn from(claims: JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            session_id: claims.sid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_convert_to_user() {
        let claims: JwtClaims = serde_json::from_value(serde_json::json!({
            "sub": "user-42",
            "exp": 4102444800i64,
            "name": "Alice",
        }))
        .unwrap();

        let user: AuthenticatedUser = claims.into();
        assert_eq!(user.user_id, "user-42");
        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert!(user.session_id.is_none());
    }
}
