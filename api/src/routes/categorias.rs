use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, FieldViolation};
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categorias", get(listar).post(criar))
        .route("/categorias/{codigo}", get(buscar_pelo_codigo))
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Categoria {
    pub codigo: i64,
    pub nome: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CategoriaInput {
    #[serde(default)]
    pub nome: Option<String>,
}

/// GET /categorias — list every category (empty list, never 204)
#[utoipa::path(
    get,
    path = "/categorias",
    responses(
        (status = 200, description = "All categories", body = Vec<Categoria>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "categorias"
)]
pub async fn listar(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Categoria>>, AppError> {
    let categorias =
        sqlx::query_as::<_, Categoria>("SELECT codigo, nome FROM categoria ORDER BY codigo")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(categorias))
}

/// POST /categorias — validate and persist a new category
#[utoipa::path(
    post,
    path = "/categorias",
    request_body = CategoriaInput,
    responses(
        (status = 201, description = "Category created", body = Categoria),
        (status = 400, description = "Validation or integrity failure", body = Vec<moneta_core::error::ErrorEntry>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "categorias"
)]
pub async fn criar(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<CategoriaInput>,
) -> Result<impl IntoResponse, AppError> {
    let nome = validate(&input)?;

    let salva = sqlx::query_as::<_, Categoria>(
        "INSERT INTO categoria (nome) VALUES ($1) RETURNING codigo, nome",
    )
    .bind(&nome)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format!("/categorias/{}", salva.codigo))],
        Json(salva),
    ))
}

/// GET /categorias/{codigo} — fetch one category
#[utoipa::path(
    get,
    path = "/categorias/{codigo}",
    params(("codigo" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category found", body = Categoria),
        (status = 404, description = "No such category", body = Vec<moneta_core::error::ErrorEntry>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "categorias"
)]
pub async fn buscar_pelo_codigo(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(codigo): Path<i64>,
) -> Result<Json<Categoria>, AppError> {
    let categoria =
        sqlx::query_as::<_, Categoria>("SELECT codigo, nome FROM categoria WHERE codigo = $1")
            .bind(codigo)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("no categoria row for codigo={codigo}"))
            })?;
    Ok(Json(categoria))
}

/// `nome` is required and must be 3..=50 characters after trimming.
fn validate(input: &CategoriaInput) -> Result<String, AppError> {
    let nome = input.nome.as_deref().map(str::trim).unwrap_or_default();
    if nome.is_empty() {
        return Err(AppError::validation(vec![FieldViolation::new(
            "nome",
            "categoria.nome.obrigatorio",
            "field 'nome': must not be blank",
        )]));
    }

    let len = nome.chars().count();
    if !(3..=50).contains(&len) {
        return Err(AppError::validation(vec![FieldViolation::new(
            "nome",
            "categoria.nome.tamanho",
            format!("field 'nome': size must be between 3 and 50, was {len}"),
        )]));
    }

    Ok(nome.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_nome_is_rejected() {
        let err = validate(&CategoriaInput { nome: None }).unwrap_err();
        match err {
            AppError::Validation { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "nome");
                assert_eq!(violations[0].message_key, "categoria.nome.obrigatorio");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn blank_nome_is_rejected() {
        let err = validate(&CategoriaInput {
            nome: Some("   ".to_string()),
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn short_nome_is_rejected_with_size_descriptor() {
        let err = validate(&CategoriaInput {
            nome: Some("ab".to_string()),
        })
        .unwrap_err();
        match err {
            AppError::Validation { violations } => {
                assert_eq!(violations[0].message_key, "categoria.nome.tamanho");
                assert!(violations[0].developer_message.contains("was 2"));
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn valid_nome_is_trimmed() {
        let nome = validate(&CategoriaInput {
            nome: Some("  Lazer  ".to_string()),
        })
        .unwrap();
        assert_eq!(nome, "Lazer");
    }
}
