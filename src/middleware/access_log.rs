//! Access logging and request id propagation.
//!
//! # Features
//!
//! - Generates UUIDv4 request IDs for incoming requests without one
//! - Propagates existing `X-Request-Id` headers
//! - Adds `X-Request-Id` to all responses, short-circuited ones included
//! - Resolves the client key once and stores it in the [`PipelineContext`]
//! - Logs one event per completed request inside a `request` span
//!
//! # Severity
//!
//! | Status | Level |
//! |--------|-------|
//! | 5xx    | error |
//! | 4xx    | warn  |
//! | other  | info  |
//!
//! When a later stage ended the chain, the event carries its name in the
//! `stage` field (`handler` otherwise).
//!
//! # Client Usage
//!
//! Clients can provide their own request ID:
//!
//! ```bash
//! curl -H "X-Request-Id: my-correlation-id" http://localhost:8000/api/recipes
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::{HeaderValue, USER_AGENT};
use axum::http::{Method, Request, Response, StatusCode};
use tower::{Layer, Service};
use tracing::{Instrument, Level, info_span};
use uuid::Uuid;

use super::context::{PipelineContext, ShortCircuit};
use super::ip::{TrustedProxyConfig, client_key};

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fallback header value when request ID parsing fails.
static UNKNOWN_REQUEST_ID: HeaderValue = HeaderValue::from_static("unknown");

/// Access log layer for Tower middleware stack.
#[derive(Clone, Default)]
pub struct AccessLogLayer {
    trusted_proxies: Arc<TrustedProxyConfig>,
}

impl AccessLogLayer {
    /// Create a new access log layer.
    pub fn new(trusted_proxies: Arc<TrustedProxyConfig>) -> Self {
        Self { trusted_proxies }
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService {
            inner,
            trusted_proxies: Arc::clone(&self.trusted_proxies),
        }
    }
}

/// Access log service wrapper.
#[derive(Clone)]
pub struct AccessLogService<S> {
    inner: S,
    trusted_proxies: Arc<TrustedProxyConfig>,
}

struct AccessRecord {
    status: StatusCode,
    method: Method,
    path: String,
    client_ip: String,
    latency: Duration,
    user_agent: String,
    request_id: String,
    stage: &'static str,
}

macro_rules! access_event {
    ($level:ident, $rec:ident, $msg:literal) => {
        tracing::$level!(
            status = $rec.status.as_u16(),
            method = %$rec.method,
            path = %$rec.path,
            client_ip = %$rec.client_ip,
            latency_ms = $rec.latency.as_secs_f64() * 1000.0,
            latency_human = ?$rec.latency,
            user_agent = %$rec.user_agent,
            request_id = %$rec.request_id,
            stage = $rec.stage,
            $msg
        )
    };
}

impl AccessRecord {
    fn emit(&self) {
        let rec = self;
        let level = severity(rec.status);
        if level == Level::ERROR {
            access_event!(error, rec, "Request processed with error");
        } else if level == Level::WARN {
            access_event!(warn, rec, "Request processed with warning");
        } else {
            access_event!(info, rec, "Request processed");
        }
    }
}

/// Log level for a completed request.
pub fn severity(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        Level::INFO
    }
}

impl<S> Service<Request<Body>> for AccessLogService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let start = Instant::now();
        let request_id = extract_or_generate_request_id(&req);
        let header_value =
            HeaderValue::from_str(&request_id).unwrap_or_else(|_| UNKNOWN_REQUEST_ID.clone());
        req.headers_mut()
            .insert(REQUEST_ID_HEADER, header_value.clone());

        let client_ip = client_key(&req, &self.trusted_proxies).into_owned();
        let ctx = PipelineContext::of(req.extensions_mut());
        ctx.request_id = Some(request_id.clone());
        ctx.client_key = Some(client_ip.clone());

        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        let span = info_span!("request", %method, %path, request_id = %request_id);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let mut response = inner.call(req).await?;
                response
                    .headers_mut()
                    .insert(REQUEST_ID_HEADER, header_value);

                AccessRecord {
                    status: response.status(),
                    method,
                    path,
                    client_ip,
                    latency: start.elapsed(),
                    user_agent,
                    request_id,
                    stage: response
                        .extensions()
                        .get::<ShortCircuit>()
                        .map_or("handler", |marker| marker.stage),
                }
                .emit();

                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// Extract request ID from headers or generate a new one.
fn extract_or_generate_request_id<B>(req: &Request<B>) -> String {
    if let Some(header_value) = req.headers().get(REQUEST_ID_HEADER)
        && let Ok(value) = header_value.to_str()
        && !value.is_empty()
    {
        return value.to_string();
    }

    Uuid::new_v4().to_string()
}
