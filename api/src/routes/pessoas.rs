use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, FieldViolation};
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pessoas", get(listar).post(criar))
        .route(
            "/pessoas/{codigo}",
            get(buscar_pelo_codigo).put(atualizar).delete(remover),
        )
        .route("/pessoas/{codigo}/ativo", put(atualizar_ativo))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Endereco {
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub complemento: Option<String>,
    pub bairro: Option<String>,
    pub cep: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Pessoa {
    pub codigo: i64,
    pub nome: String,
    pub ativo: bool,
    #[sqlx(flatten)]
    pub endereco: Endereco,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PessoaInput {
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub ativo: Option<bool>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
}

const SELECT_COLUMNS: &str =
    "codigo, nome, ativo, logradouro, numero, complemento, bairro, cep, cidade, estado";

/// GET /pessoas — list every person
#[utoipa::path(
    get,
    path = "/pessoas",
    responses(
        (status = 200, description = "All people", body = Vec<Pessoa>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "pessoas"
)]
pub async fn listar(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Pessoa>>, AppError> {
    let pessoas = sqlx::query_as::<_, Pessoa>(&format!(
        "SELECT {SELECT_COLUMNS} FROM pessoa ORDER BY codigo"
    ))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(pessoas))
}

/// POST /pessoas — validate and persist a new person
#[utoipa::path(
    post,
    path = "/pessoas",
    request_body = PessoaInput,
    responses(
        (status = 201, description = "Person created", body = Pessoa),
        (status = 400, description = "Validation failure", body = Vec<moneta_core::error::ErrorEntry>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "pessoas"
)]
pub async fn criar(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<PessoaInput>,
) -> Result<impl IntoResponse, AppError> {
    let (nome, ativo, endereco) = validate(&input)?;

    let salva = sqlx::query_as::<_, Pessoa>(&format!(
        "INSERT INTO pessoa (nome, ativo, logradouro, numero, complemento, bairro, cep, cidade, estado) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {SELECT_COLUMNS}"
    ))
    .bind(&nome)
    .bind(ativo)
    .bind(&endereco.logradouro)
    .bind(&endereco.numero)
    .bind(&endereco.complemento)
    .bind(&endereco.bairro)
    .bind(&endereco.cep)
    .bind(&endereco.cidade)
    .bind(&endereco.estado)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format!("/pessoas/{}", salva.codigo))],
        Json(salva),
    ))
}

/// GET /pessoas/{codigo} — fetch one person
#[utoipa::path(
    get,
    path = "/pessoas/{codigo}",
    params(("codigo" = i64, Path, description = "Person id")),
    responses(
        (status = 200, description = "Person found", body = Pessoa),
        (status = 404, description = "No such person", body = Vec<moneta_core::error::ErrorEntry>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "pessoas"
)]
pub async fn buscar_pelo_codigo(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(codigo): Path<i64>,
) -> Result<Json<Pessoa>, AppError> {
    let pessoa = fetch_pessoa(&state, codigo).await?;
    Ok(Json(pessoa))
}

/// PUT /pessoas/{codigo} — full replacement of an existing person
#[utoipa::path(
    put,
    path = "/pessoas/{codigo}",
    params(("codigo" = i64, Path, description = "Person id")),
    request_body = PessoaInput,
    responses(
        (status = 200, description = "Person updated", body = Pessoa),
        (status = 400, description = "Validation failure", body = Vec<moneta_core::error::ErrorEntry>),
        (status = 404, description = "No such person", body = Vec<moneta_core::error::ErrorEntry>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "pessoas"
)]
pub async fn atualizar(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(codigo): Path<i64>,
    AppJson(input): AppJson<PessoaInput>,
) -> Result<Json<Pessoa>, AppError> {
    let (nome, ativo, endereco) = validate(&input)?;

    // Existence check first so a missing row classifies as NotFound
    // rather than an empty update.
    fetch_pessoa(&state, codigo).await?;

    let salva = sqlx::query_as::<_, Pessoa>(&format!(
        "UPDATE pessoa SET nome = $1, ativo = $2, logradouro = $3, numero = $4, \
         complemento = $5, bairro = $6, cep = $7, cidade = $8, estado = $9 \
         WHERE codigo = $10 RETURNING {SELECT_COLUMNS}"
    ))
    .bind(&nome)
    .bind(ativo)
    .bind(&endereco.logradouro)
    .bind(&endereco.numero)
    .bind(&endereco.complemento)
    .bind(&endereco.bairro)
    .bind(&endereco.cep)
    .bind(&endereco.cidade)
    .bind(&endereco.estado)
    .bind(codigo)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(salva))
}

/// DELETE /pessoas/{codigo}
#[utoipa::path(
    delete,
    path = "/pessoas/{codigo}",
    params(("codigo" = i64, Path, description = "Person id")),
    responses(
        (status = 204, description = "Person removed"),
        (status = 404, description = "No such person", body = Vec<moneta_core::error::ErrorEntry>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "pessoas"
)]
pub async fn remover(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(codigo): Path<i64>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM pessoa WHERE codigo = $1")
        .bind(codigo)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!(
            "no pessoa row for codigo={codigo}"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /pessoas/{codigo}/ativo — flip only the active flag
#[utoipa::path(
    put,
    path = "/pessoas/{codigo}/ativo",
    params(("codigo" = i64, Path, description = "Person id")),
    request_body = bool,
    responses(
        (status = 204, description = "Flag updated"),
        (status = 404, description = "No such person", body = Vec<moneta_core::error::ErrorEntry>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "pessoas"
)]
pub async fn atualizar_ativo(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(codigo): Path<i64>,
    AppJson(ativo): AppJson<bool>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("UPDATE pessoa SET ativo = $1 WHERE codigo = $2")
        .bind(ativo)
        .bind(codigo)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!(
            "no pessoa row for codigo={codigo}"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_pessoa(state: &AppState, codigo: i64) -> Result<Pessoa, AppError> {
    sqlx::query_as::<_, Pessoa>(&format!(
        "SELECT {SELECT_COLUMNS} FROM pessoa WHERE codigo = $1"
    ))
    .bind(codigo)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found(format!("no pessoa row for codigo={codigo}")))
}

/// Collects every violation before failing: a body missing both `nome`
/// and `ativo` reports two entries, `nome` first.
fn validate(input: &PessoaInput) -> Result<(String, bool, Endereco), AppError> {
    let mut violations = Vec::new();

    let nome = input.nome.as_deref().map(str::trim).unwrap_or_default();
    if nome.is_empty() {
        violations.push(FieldViolation::new(
            "nome",
            "pessoa.nome.obrigatorio",
            "field 'nome': must not be blank",
        ));
    }

    if input.ativo.is_none() {
        violations.push(FieldViolation::new(
            "ativo",
            "pessoa.ativo.obrigatorio",
            "field 'ativo': must not be null",
        ));
    }

    if !violations.is_empty() {
        return Err(AppError::validation(violations));
    }

    Ok((
        nome.to_string(),
        input.ativo.unwrap_or_default(),
        input.endereco.clone().unwrap_or_default(),
    ))
}
