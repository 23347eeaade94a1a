use axum::extract::State;
use axum::http::header::{AUTHORIZATION, SET_COOKIE, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use moneta_core::auth;

use crate::config::SecurityConfig;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/oauth/token", post(token))
}

// ──────────────────────────────────────────────
// POST /oauth/token
// ──────────────────────────────────────────────

/// Flat form so a missing grant_type renders as invalid_request rather than
/// a deserialization failure. The refresh-token cookie filter may have
/// injected `refresh_token` before this point.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TokenForm {
    #[serde(default)]
    pub grant_type: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

/// RFC 6749 §5.2 error body. Token-endpoint failures render themselves
/// here and never reach the Error Translator's classification table.
#[derive(Debug)]
pub struct OAuthError {
    status: StatusCode,
    error: &'static str,
    description: String,
}

impl OAuthError {
    fn invalid_client(description: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "invalid_client",
            description: description.into(),
        }
    }

    fn invalid_grant(description: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "invalid_grant",
            description: description.into(),
        }
    }

    fn invalid_request(description: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "invalid_request",
            description: description.into(),
        }
    }

    fn unsupported_grant_type(grant_type: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "unsupported_grant_type",
            description: format!("Unsupported grant type: {grant_type}"),
        }
    }

    fn server_error(description: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "server_error",
            description: description.into(),
        }
    }
}

impl From<sqlx::Error> for OAuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "token endpoint storage failure");
        Self::server_error("Token request could not be processed")
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.error,
            "error_description": self.description,
        }));
        if self.status == StatusCode::UNAUTHORIZED {
            return (
                self.status,
                [(WWW_AUTHENTICATE, "Basic realm=\"oauth\"")],
                body,
            )
                .into_response();
        }
        (self.status, body).into_response()
    }
}

#[utoipa::path(
    post,
    path = "/oauth/token",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Invalid grant or request"),
        (status = 401, description = "Client authentication failed")
    ),
    tag = "oauth"
)]
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Result<Response, OAuthError> {
    authenticate_client(&headers, &state.security)?;

    let grant_type = form
        .grant_type
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing grant_type"))?;

    match grant_type {
        "password" => {
            let username = form
                .username
                .as_deref()
                .ok_or_else(|| OAuthError::invalid_request("Missing username"))?;
            let password = form
                .password
                .as_deref()
                .ok_or_else(|| OAuthError::invalid_request("Missing password"))?;
            password_grant(&state, username, password).await
        }
        "refresh_token" => {
            let refresh_token = form
                .refresh_token
                .as_deref()
                .ok_or_else(|| OAuthError::invalid_request("Missing refresh_token"))?;
            refresh_grant(&state, refresh_token).await
        }
        other => Err(OAuthError::unsupported_grant_type(other)),
    }
}

/// Confidential-client check: HTTP Basic credentials against the single
/// configured client.
fn authenticate_client(headers: &HeaderMap, security: &SecurityConfig) -> Result<(), OAuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| OAuthError::invalid_client("Missing client credentials"))?;

    let (client_id, client_secret) = parse_basic_credentials(header)
        .ok_or_else(|| OAuthError::invalid_client("Malformed Basic credentials"))?;

    if client_id != security.client_id || client_secret != security.client_secret {
        return Err(OAuthError::invalid_client("Bad client credentials"));
    }
    Ok(())
}

fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

async fn password_grant(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<Response, OAuthError> {
    let usuario = sqlx::query_as::<_, UsuarioRow>(
        "SELECT codigo, nome, email, senha FROM usuario WHERE email = $1",
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| OAuthError::invalid_grant("Bad credentials"))?;

    let verified = auth::verify_password(password, &usuario.senha)
        .map_err(|e| OAuthError::server_error(format!("Stored credential unusable: {e}")))?;
    if !verified {
        return Err(OAuthError::invalid_grant("Bad credentials"));
    }

    issue_tokens(state, &usuario).await
}

async fn refresh_grant(state: &AppState, refresh_token: &str) -> Result<Response, OAuthError> {
    let token_hash = auth::hash_token(refresh_token);

    let rt = sqlx::query_as::<_, RefreshTokenRow>(
        "SELECT id, usuario_codigo, expires_at \
         FROM refresh_token WHERE token_hash = $1 AND revoked = FALSE",
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| OAuthError::invalid_grant("Invalid refresh token"))?;

    if Utc::now() > rt.expires_at {
        return Err(OAuthError::invalid_grant("Refresh token has expired"));
    }

    // Rotation: the presented token is single-use.
    sqlx::query("UPDATE refresh_token SET revoked = TRUE WHERE id = $1")
        .bind(rt.id)
        .execute(&state.db)
        .await?;

    let usuario = sqlx::query_as::<_, UsuarioRow>(
        "SELECT codigo, nome, email, senha FROM usuario WHERE codigo = $1",
    )
    .bind(rt.usuario_codigo)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| OAuthError::invalid_grant("Refresh token owner no longer exists"))?;

    issue_tokens(state, &usuario).await
}

/// Signs a fresh access token, persists a new refresh token hash, and sets
/// the HttpOnly cookie the pre-processor reads back on the next refresh.
async fn issue_tokens(state: &AppState, usuario: &UsuarioRow) -> Result<Response, OAuthError> {
    let security = &state.security;

    let access_token = crate::auth::issue_access_token(
        &security.jwt_secret,
        &usuario.email,
        &usuario.nome,
        security.access_token_validity_secs,
    )
    .map_err(|e| OAuthError::server_error(format!("Failed to sign access token: {e}")))?;

    let (refresh_token, refresh_hash) = auth::generate_refresh_token();
    let refresh_expires = Utc::now() + Duration::seconds(security.refresh_token_validity_secs);

    sqlx::query(
        "INSERT INTO refresh_token (id, usuario_codigo, token_hash, expires_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::now_v7())
    .bind(usuario.codigo)
    .bind(&refresh_hash)
    .bind(refresh_expires)
    .execute(&state.db)
    .await?;

    let cookie = refresh_cookie(&refresh_token, security.refresh_token_validity_secs);
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| OAuthError::server_error(format!("Failed to encode cookie: {e}")))?;

    let body = Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: security.access_token_validity_secs,
        scope: "read write".to_string(),
    });

    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

/// Scoped to the token endpoint path so browsers only replay it on refresh.
fn refresh_cookie(token: &str, max_age_secs: i64) -> String {
    format!("refreshToken={token}; HttpOnly; Path=/oauth/token; Max-Age={max_age_secs}; SameSite=Lax")
}

#[derive(sqlx::FromRow)]
struct UsuarioRow {
    codigo: i64,
    nome: String,
    email: String,
    senha: String,
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    usuario_codigo: i64,
    expires_at: DateTime<Utc>,
}
