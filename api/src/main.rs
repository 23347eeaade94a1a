use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use moneta_core::messages::MessageCatalog;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Moneta API",
        version = "0.1.0",
        description = "Personal finance REST backend: categories, people, and OAuth2 password/refresh login with localized error payloads."
    ),
    paths(
        routes::health::health_check,
        routes::categorias::listar,
        routes::categorias::criar,
        routes::categorias::buscar_pelo_codigo,
        routes::pessoas::listar,
        routes::pessoas::criar,
        routes::pessoas::buscar_pelo_codigo,
        routes::pessoas::atualizar,
        routes::pessoas::remover,
        routes::pessoas::atualizar_ativo,
        routes::oauth::token,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::categorias::Categoria,
        routes::categorias::CategoriaInput,
        routes::pessoas::Pessoa,
        routes::pessoas::PessoaInput,
        routes::pessoas::Endereco,
        routes::oauth::TokenForm,
        routes::oauth::TokenResponse,
        moneta_core::error::ErrorEntry,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moneta_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let app_state = state::AppState {
        db: pool,
        security: config::SecurityConfig::from_env(),
    };

    let catalog =
        Arc::new(MessageCatalog::embedded().expect("embedded message bundles must parse"));

    // CORS
    let cors_layer = middleware::cors::build_cors_layer();

    // Layer order: the refresh-cookie filter is added last so it runs
    // outermost, rewriting the token-request body before anything else
    // sees it. The translator wraps the routes so every classified
    // failure leaves with a localized JSON array body.
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::oauth::router())
        .merge(routes::categorias::router())
        .merge(routes::pessoas::router())
        .layer(middleware::error_translator::ErrorTranslatorLayer::new(
            catalog,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .layer(middleware::refresh_cookie::RefreshTokenFilterLayer)
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Moneta API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
