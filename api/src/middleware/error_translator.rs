use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::http::header::{ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use moneta_core::error::ErrorEntry;
use moneta_core::messages::MessageCatalog;
use tower::{Layer, Service, ServiceExt};

use crate::error::AppError;

/// Tower Layer that renders every classified failure escaping the handler
/// chain as a JSON array of [`ErrorEntry`].
///
/// Handlers only produce an [`AppError`]; this layer owns the message catalog
/// and resolves the request's locale, so there is exactly one rendering format
/// service-wide. Unclassified failures pass through untouched.
#[derive(Clone)]
pub struct ErrorTranslatorLayer {
    catalog: Arc<MessageCatalog>,
}

impl ErrorTranslatorLayer {
    pub fn new(catalog: Arc<MessageCatalog>) -> Self {
        Self { catalog }
    }
}

impl<S> Layer<S> for ErrorTranslatorLayer {
    type Service = ErrorTranslatorService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorTranslatorService {
            inner,
            catalog: self.catalog.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ErrorTranslatorService<S> {
    inner: S,
    catalog: Arc<MessageCatalog>,
}

impl<S> Service<Request> for ErrorTranslatorService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let not_ready = self.inner.clone();
        let ready = std::mem::replace(&mut self.inner, not_ready);
        let catalog = self.catalog.clone();

        let locale = resolve_locale(
            req.headers()
                .get(ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok()),
            catalog.default_locale(),
        );

        Box::pin(async move {
            let response = ready.oneshot(req).await.into_response();

            match response.extensions().get::<AppError>().cloned() {
                Some(failure) => Ok(render(&catalog, &locale, &failure, response)),
                None => Ok(response),
            }
        })
    }
}

/// Apply the classification table: one entry per rejected field for
/// validation failures, exactly one entry for every other classified kind.
/// User messages always come from the catalog; field descriptors fall back
/// to the raw field name when no catalog entry exists.
pub fn translate(catalog: &MessageCatalog, locale: &str, failure: &AppError) -> Vec<ErrorEntry> {
    match failure {
        AppError::MalformedBody { developer_message } => vec![ErrorEntry::new(
            catalog.message_or(locale, "mensagem.invalida", "mensagem.invalida"),
            developer_message.clone(),
        )],
        AppError::Validation { violations } => violations
            .iter()
            .map(|violation| {
                ErrorEntry::new(
                    catalog.message_or(locale, &violation.message_key, &violation.field),
                    violation.developer_message.clone(),
                )
            })
            .collect(),
        AppError::NotFound { developer_message } => vec![ErrorEntry::new(
            catalog.message_or(locale, "recurso.nao-encontrado", "recurso.nao-encontrado"),
            developer_message.clone(),
        )],
        AppError::IntegrityViolation { root_cause } => vec![ErrorEntry::new(
            catalog.message_or(
                locale,
                "recurso.operacao-nao-permitida",
                "recurso.operacao-nao-permitida",
            ),
            root_cause.clone(),
        )],
        // Rendered by the hosting default, never by this layer
        AppError::Unclassified { .. } => Vec::new(),
    }
}

/// First language tag of an `Accept-Language` header, or the default locale.
/// Quality weights are ignored — the client's first preference wins.
fn resolve_locale(accept_language: Option<&str>, default_locale: &str) -> String {
    accept_language
        .and_then(|header| header.split(',').next())
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim())
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .unwrap_or(default_locale)
        .to_string()
}

/// Replace the failure response's body with the serialized entry array.
/// Status and any headers already on the failure response are preserved.
fn render(
    catalog: &MessageCatalog,
    locale: &str,
    failure: &AppError,
    response: Response,
) -> Response {
    let entries = translate(catalog, locale, failure);
    let body = serde_json::to_vec(&entries).unwrap_or_default();

    let (mut parts, _) = response.into_parts();
    parts.extensions.remove::<AppError>();
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    Response::from_parts(parts, Body::from(body))
}
