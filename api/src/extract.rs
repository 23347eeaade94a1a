//! Custom extractors that route axum rejections into the failure
//! classification instead of axum's default plain-text responses.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use std::error::Error as _;

use crate::error::AppError;

/// JSON extractor whose rejection classifies as MalformedBody.
///
/// Drop-in replacement for `axum::Json<T>` in handler signatures: a body
/// that cannot be parsed into `T` becomes a 400 rendered by the Error
/// Translator under the `mensagem.invalida` catalog key.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

/// Developer message is the rejection's underlying cause, or the rejection
/// itself when no cause is attached.
pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let developer_message = rejection
        .source()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| rejection.to_string());
    AppError::malformed_body(developer_message)
}
