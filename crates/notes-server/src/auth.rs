// ABOUTME: Bearer token authentication layer guarding the notesd /api routes.
// ABOUTME: Accepts an Authorization header, or a token query parameter on the SSE stream only.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::Query;
use axum::http::{Request, Response, StatusCode, header};
use serde::Deserialize;
use tower::{Layer, Service};

/// The only route that may carry its token in the query string.
const QUERY_TOKEN_PATH: &str = "/api/db/stream";

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// A tower Layer that requires a bearer token on every `/api` route.
#[derive(Clone)]
pub struct BearerAuthLayer {
    token: Arc<str>,
}

impl BearerAuthLayer {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuth {
            inner,
            token: Arc::clone(&self.token),
        }
    }
}

#[derive(Clone)]
pub struct BearerAuth<S> {
    inner: S,
    token: Arc<str>,
}

impl<S> BearerAuth<S> {
    fn is_authorized(&self, req: &Request<Body>) -> bool {
        let from_header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                let (scheme, token) = v.split_once(' ')?;
                scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
            });

        if from_header == Some(&*self.token) {
            return true;
        }

        // EventSource cannot set headers, so the stream may pass ?token=
        if req.uri().path() != QUERY_TOKEN_PATH {
            return false;
        }
        Query::<TokenQuery>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(q)| q.token)
            .is_some_and(|token| token == *self.token)
    }
}

fn is_protected(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

impl<S> Service<Request<Body>> for BearerAuth<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        if !is_protected(req.uri().path()) || self.is_authorized(&req) {
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(req).await });
        }

        tracing::warn!("rejected unauthenticated request to {}", req.uri().path());
        Box::pin(async move {
            let mut resp = Response::new(Body::from(r#"{"error":"unauthorized"}"#));
            *resp.status_mut() = StatusCode::UNAUTHORIZED;
            resp.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
            Ok(resp)
        })
    }
}
