use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::http::header::{CONTENT_LENGTH, COOKIE};
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service, ServiceExt};

/// Fixed path of the token-issuing endpoint (compared case-insensitively).
const TOKEN_PATH: &str = "/oauth/token";
/// Cookie carrying the refresh credential (matched case-sensitively).
const REFRESH_COOKIE: &str = "refreshToken";
/// Form parameter the token endpoint reads the credential from.
const REFRESH_PARAM: &str = "refresh_token";

/// Form bodies on the token endpoint are tiny; anything larger is not ours.
const MAX_FORM_BYTES: usize = 16 * 1024;

/// Tower Layer that makes a cookie-borne refresh token visible to the token
/// endpoint as the conventional `refresh_token` form parameter.
///
/// Must be the outermost layer of the stack: it rewrites the request before
/// any other cross-cutting logic sees it. Requests that do not match the
/// trigger (token path, `grant_type=refresh_token`, at least one cookie)
/// pass through byte-identical.
#[derive(Clone, Default)]
pub struct RefreshTokenFilterLayer;

impl<S> Layer<S> for RefreshTokenFilterLayer {
    type Service = RefreshTokenFilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RefreshTokenFilterService { inner }
    }
}

#[derive(Clone)]
pub struct RefreshTokenFilterService<S> {
    inner: S,
}

impl<S> Service<Request> for RefreshTokenFilterService<S>
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

        Box::pin(async move {
            let req = apply(req).await;
            Ok(ready.oneshot(req).await.into_response())
        })
    }
}

/// Rewrite the request when the refresh-token trigger holds, otherwise
/// return it unchanged. Pure transformation: no logging, no I/O beyond
/// buffering the (small) form body that must be inspected anyway.
async fn apply(req: Request) -> Request {
    if !req.uri().path().eq_ignore_ascii_case(TOKEN_PATH) {
        return req;
    }
    if !req.headers().contains_key(COOKIE) {
        return req;
    }

    // The body may only be consumed when it is known to fit the cap; a
    // larger (or undeclared-length) body passes through untouched — it may
    // not even belong to a refresh grant.
    let declared_len = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if !declared_len.is_some_and(|len| len <= MAX_FORM_BYTES) {
        return req;
    }

    let refresh_token = cookie_value(req.headers(), REFRESH_COOKIE).map(str::to_owned);

    let (mut parts, body) = req.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, MAX_FORM_BYTES).await else {
        // Body overran its declared length: hand it downstream empty and
        // let the endpoint produce its own parse failure.
        return Request::from_parts(parts, Body::empty());
    };

    let params: Vec<(String, String)> = url::form_urlencoded::parse(&bytes)
        .into_owned()
        .collect();

    let is_refresh_grant = params
        .iter()
        .any(|(name, value)| name == "grant_type" && value == "refresh_token");

    match (is_refresh_grant, refresh_token) {
        (true, Some(token)) => {
            let locked = LockedParams::with_override(params, REFRESH_PARAM, &token);
            let encoded = locked.encode();
            parts
                .headers
                .insert(CONTENT_LENGTH, encoded.len().into());
            Request::from_parts(parts, Body::from(encoded))
        }
        // No refreshToken cookie or a different grant: the original body
        // flows through untouched.
        _ => Request::from_parts(parts, Body::from(bytes)),
    }
}

/// Value of the first cookie named exactly `name`, across all Cookie headers.
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(cookie_name, _)| *cookie_name == name)
        .map(|(_, value)| value)
}

/// Immutable view of a form parameter set with a single overlaid entry.
///
/// Built once by the filter; exposes read accessors only, so downstream
/// consumers cannot mutate the rewritten parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedParams {
    entries: Vec<(String, String)>,
}

impl LockedParams {
    /// All original entries except `name`, plus `name=value` as sole value.
    pub fn with_override(base: Vec<(String, String)>, name: &str, value: &str) -> Self {
        let mut entries: Vec<(String, String)> =
            base.into_iter().filter(|(key, _)| key != name).collect();
        entries.push((name.to_string(), value.to_string()));
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Re-encode as `application/x-www-form-urlencoded`.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.entries {
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Form;
    use axum::Router;
    use axum::routing::post;
    use std::collections::HashMap;

    fn form_request(path: &str, cookie: Option<&str>, body: &str) -> Request {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/x-www-form-urlencoded")
            .header(CONTENT_LENGTH, body.len());
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_params(req: Request) -> Vec<(String, String)> {
        let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .unwrap();
        url::form_urlencoded::parse(&bytes).into_owned().collect()
    }

    #[tokio::test]
    async fn matching_trigger_injects_cookie_value_as_parameter() {
        let req = form_request(
            "/oauth/token",
            Some("refreshToken=abc123"),
            "grant_type=refresh_token&client_id=angular",
        );
        let params = body_params(apply(req).await).await;

        assert!(params.contains(&("refresh_token".into(), "abc123".into())));
        assert!(params.contains(&("grant_type".into(), "refresh_token".into())));
        assert!(params.contains(&("client_id".into(), "angular".into())));
    }

    #[tokio::test]
    async fn path_match_is_case_insensitive() {
        let req = form_request(
            "/OAuth/Token",
            Some("refreshToken=xyz"),
            "grant_type=refresh_token",
        );
        let params = body_params(apply(req).await).await;
        assert!(params.contains(&("refresh_token".into(), "xyz".into())));
    }

    #[tokio::test]
    async fn existing_refresh_token_parameter_is_overwritten_with_sole_value() {
        let req = form_request(
            "/oauth/token",
            Some("refreshToken=from-cookie"),
            "grant_type=refresh_token&refresh_token=stale",
        );
        let params = body_params(apply(req).await).await;

        let values: Vec<&str> = params
            .iter()
            .filter(|(name, _)| name == "refresh_token")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(values, vec!["from-cookie"]);
    }

    #[tokio::test]
    async fn other_paths_pass_through_unchanged() {
        let body = "grant_type=refresh_token&x=1";
        let req = form_request("/categorias", Some("refreshToken=abc"), body);
        let bytes = axum::body::to_bytes(apply(req).await.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], body.as_bytes());
    }

    #[tokio::test]
    async fn password_grant_passes_through_unchanged() {
        let body = "grant_type=password&username=u&password=p";
        let req = form_request("/oauth/token", Some("refreshToken=abc"), body);
        let bytes = axum::body::to_bytes(apply(req).await.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], body.as_bytes());
    }

    #[tokio::test]
    async fn oversized_form_passes_through_unchanged() {
        let filler = "x".repeat(20 * 1024);
        let body = format!("grant_type=password&username=u&password={filler}");
        let req = form_request("/oauth/token", Some("sessionId=abc"), &body);
        let bytes = axum::body::to_bytes(apply(req).await.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], body.as_bytes());
    }

    #[tokio::test]
    async fn undeclared_body_length_passes_through_unchanged() {
        let body = "grant_type=refresh_token";
        let req = Request::builder()
            .method("POST")
            .uri("/oauth/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .header(COOKIE, "refreshToken=abc")
            .body(Body::from(body))
            .unwrap();
        let bytes = axum::body::to_bytes(apply(req).await.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], body.as_bytes());
    }

    #[tokio::test]
    async fn missing_cookie_header_passes_through_unchanged() {
        let body = "grant_type=refresh_token";
        let req = form_request("/oauth/token", None, body);
        let params = body_params(apply(req).await).await;
        assert_eq!(params, vec![("grant_type".into(), "refresh_token".into())]);
    }

    #[tokio::test]
    async fn cookie_name_match_is_case_sensitive() {
        let body = "grant_type=refresh_token";
        let req = form_request("/oauth/token", Some("refreshtoken=abc; other=1"), body);
        let params = body_params(apply(req).await).await;
        assert_eq!(params, vec![("grant_type".into(), "refresh_token".into())]);
    }

    #[test]
    fn cookie_value_finds_first_match_among_many() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, "a=1; refreshToken=first".parse().unwrap());
        headers.append(COOKIE, "refreshToken=second".parse().unwrap());
        assert_eq!(cookie_value(&headers, "refreshToken"), Some("first"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn locked_params_override_replaces_and_keeps_rest() {
        let base = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), "old".to_string()),
        ];
        let locked = LockedParams::with_override(base, "refresh_token", "new");

        assert_eq!(locked.get("refresh_token"), Some("new"));
        assert_eq!(locked.get("grant_type"), Some("refresh_token"));
        assert_eq!(locked.entries().len(), 2);
    }

    #[test]
    fn locked_params_encoding_is_urlencoded() {
        let locked = LockedParams::with_override(
            vec![("grant_type".to_string(), "refresh_token".to_string())],
            "refresh_token",
            "a b&c",
        );
        assert_eq!(
            locked.encode(),
            "grant_type=refresh_token&refresh_token=a+b%26c"
        );
    }

    #[tokio::test]
    async fn downstream_form_extractor_sees_injected_token() {
        let app = Router::new()
            .route(
                "/oauth/token",
                post(|Form(params): Form<HashMap<String, String>>| async move {
                    params.get("refresh_token").cloned().unwrap_or_default()
                }),
            )
            .layer(RefreshTokenFilterLayer);

        let req = form_request(
            "/oauth/token",
            Some("refreshToken=abc123"),
            "grant_type=refresh_token",
        );
        let response = tower::ServiceExt::oneshot(app, req).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"abc123");
    }
}
