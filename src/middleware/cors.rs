//! Origin control: CORS response headers and preflight handling.
//!
//! Every response gets the fixed `Allow-Headers`, `Allow-Methods` and
//! `Max-Age` headers. `Allow-Origin` (echoing the caller's origin) and
//! `Allow-Credentials` are added only when the `Origin` header matches the
//! allow-list, either exactly or through a `*` entry.
//!
//! `OPTIONS` requests are answered with `204 No Content` here, whether or not
//! the origin matched, so preflights never reach rate limiting, validation or
//! a handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, HeaderValue, ORIGIN,
};
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use tower::{Layer, Service};
use tracing::trace;

use super::context::ShortCircuit;

/// Stage name reported on preflight responses.
pub const ORIGIN_STAGE: &str = "origin";

static ALLOW_HEADERS: HeaderValue = HeaderValue::from_static(
    "Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization, accept, origin, Cache-Control, X-Requested-With",
);
static ALLOW_METHODS: HeaderValue = HeaderValue::from_static("POST, OPTIONS, GET, PUT, DELETE");
static MAX_AGE: HeaderValue = HeaderValue::from_static("86400");
static ALLOW_CREDENTIALS: HeaderValue = HeaderValue::from_static("true");

/// CORS layer over a fixed origin allow-list.
#[derive(Debug, Clone)]
pub struct OriginLayer {
    allowed: Arc<[String]>,
}

impl OriginLayer {
    /// Create a layer from the configured origins.
    pub fn new(allowed_origins: &[String]) -> Self {
        Self {
            allowed: allowed_origins.iter().cloned().collect(),
        }
    }
}

impl<S> Layer<S> for OriginLayer {
    type Service = OriginService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OriginService {
            inner,
            allowed: Arc::clone(&self.allowed),
        }
    }
}

/// Service produced by [`OriginLayer`].
#[derive(Clone)]
pub struct OriginService<S> {
    inner: S,
    allowed: Arc<[String]>,
}

/// Whether `origin` may receive credentialed CORS headers.
pub fn is_allowed_origin(origin: &str, allowed: &[String]) -> bool {
    !origin.is_empty()
        && allowed
            .iter()
            .any(|candidate| candidate == "*" || candidate == origin)
}

fn apply_cors_headers(headers: &mut HeaderMap, matched_origin: Option<HeaderValue>) {
    if let Some(origin) = matched_origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, ALLOW_CREDENTIALS.clone());
    }
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS.clone());
    headers.insert(ACCESS_CONTROL_MAX_AGE, MAX_AGE.clone());
}

impl<S> Service<Request<Body>> for OriginService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let matched_origin = req
            .headers()
            .get(ORIGIN)
            .filter(|value| {
                value
                    .to_str()
                    .is_ok_and(|origin| is_allowed_origin(origin, &self.allowed))
            })
            .cloned();

        if req.method() == Method::OPTIONS {
            trace!(path = %req.uri().path(), "Answering CORS preflight");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            apply_cors_headers(response.headers_mut(), matched_origin);
            response
                .extensions_mut()
                .insert(ShortCircuit { stage: ORIGIN_STAGE });
            return Box::pin(async move { Ok(response) });
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            apply_cors_headers(response.headers_mut(), matched_origin);
            Ok(response)
        })
    }
}
