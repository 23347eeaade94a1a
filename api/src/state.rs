use sqlx::PgPool;

use crate::config::SecurityConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub security: SecurityConfig,
}
