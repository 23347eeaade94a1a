use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Migrations recorded as applied; absent when the database is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations_applied: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health — database reachability plus schema state.
///
/// Counting applied migrations doubles as the connectivity probe and catches
/// a pool pointed at a database the service never migrated.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let migrations_applied =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
            .fetch_one(&state.db)
            .await
            .ok();

    let healthy = migrations_applied.is_some_and(|count| count > 0);
    let (status, http_status) = if healthy {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            migrations_applied,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use sqlx::postgres::PgPoolOptions;

    async fn db_pool_if_available() -> Option<sqlx::PgPool> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .ok()
    }

    #[tokio::test]
    async fn migrated_database_reports_healthy() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };

        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        let state = AppState {
            db: pool,
            security: SecurityConfig::from_env(),
        };

        let response = health_check(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["migrations_applied"].as_i64().unwrap() >= 2);
    }
}
