use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::AppState;

/// Access-token claims. `sub` is the usuario's email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub nome: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign an HS256 access token for `email`/`nome`, valid for `validity_secs`.
pub fn issue_access_token(
    secret: &str,
    email: &str,
    nome: &str,
    validity_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: email.to_string(),
        nome: nome.to_string(),
        iat: now,
        exp: now + validity_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify signature and expiry, returning the claims.
pub fn verify_access_token(
    secret: &str,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
}

/// Authenticated user extracted from the `Authorization: Bearer <jwt>` header.
/// Protected resource handlers take this as a parameter; rejection is an
/// RFC 6750-style 401, outside the Error Translator's classification table.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub email: String,
    pub nome: String,
}

#[derive(Debug)]
pub struct AuthError {
    pub description: String,
}

impl AuthError {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Bearer error=\"invalid_token\"")],
            Json(json!({
                "error": "invalid_token",
                "error_description": self.description,
            })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AuthError::new("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::new("Authorization header must use Bearer scheme"))?;

        let claims = verify_access_token(&state.security.jwt_secret, token)
            .map_err(|e| AuthError::new(format!("Invalid access token: {e}")))?;

        Ok(Self {
            email: claims.sub,
            nome: claims.nome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_roundtrip() {
        let token = issue_access_token("test-secret", "admin@moneta.com", "Administrador", 1800)
            .unwrap();
        let claims = verify_access_token("test-secret", &token).unwrap();

        assert_eq!(claims.sub, "admin@moneta.com");
        assert_eq!(claims.nome, "Administrador");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_access_token("test-secret", "admin@moneta.com", "Admin", 1800).unwrap();
        assert!(verify_access_token("other-secret", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s validation leeway
        let token = issue_access_token("test-secret", "admin@moneta.com", "Admin", -120).unwrap();
        assert!(verify_access_token("test-secret", &token).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue_access_token("test-secret", "admin@moneta.com", "Admin", 1800).unwrap();
        let tampered = format!("{}x", token);
        assert!(verify_access_token("test-secret", &tampered).is_err());
    }
}
