//! Shared contract for short-circuiting pipeline stages.
//!
//! A gate looks at the request (and the [`PipelineContext`]) and decides:
//!
//! ```text
//!            ┌──────────┐  Flow::Continue(req)      ┌────────────┐
//! request ──►│   Gate   │──────────────────────────►│ next stage │
//!            └────┬─────┘                           └────────────┘
//!                 │ Flow::ShortCircuit(response)
//!                 ▼
//!          response (next stages and handler skipped)
//! ```
//!
//! [`GateLayer`] turns any [`Gate`] into a Tower layer, so gates compose with
//! the wrapping stages (recovery, origin, access log, metrics) in one router
//! stack.
//!
//! [`PipelineContext`]: super::context::PipelineContext

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};

use super::context::ShortCircuit;

/// Outcome of a gate.
pub enum Flow {
    /// Hand the (possibly modified) request to the next stage.
    Continue(Request<Body>),
    /// Stop the chain and answer with this response.
    ShortCircuit(Response<Body>),
}

impl Flow {
    /// Short-circuit with anything that converts into a response.
    pub fn reject(response: impl IntoResponse) -> Self {
        Flow::ShortCircuit(response.into_response())
    }
}

/// A pipeline stage that may end the chain early.
pub trait Gate: Clone + Send + Sync + 'static {
    /// Stage name, recorded on short-circuited responses.
    fn name(&self) -> &'static str;

    /// Decide whether the request continues.
    fn check(&self, req: Request<Body>) -> impl Future<Output = Flow> + Send;
}

/// Tower layer running a [`Gate`] in front of the inner service.
#[derive(Clone)]
pub struct GateLayer<G> {
    gate: G,
}

impl<G> GateLayer<G> {
    /// Wrap a gate as a layer.
    pub fn new(gate: G) -> Self {
        Self { gate }
    }
}

impl<S, G: Clone> Layer<S> for GateLayer<G> {
    type Service = GateService<S, G>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Service produced by [`GateLayer`].
#[derive(Clone)]
pub struct GateService<S, G> {
    inner: S,
    gate: G,
}

impl<S, G> Service<Request<Body>> for GateService<S, G>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    G: Gate,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let gate = self.gate.clone();
        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match gate.check(req).await {
                Flow::Continue(req) => inner.call(req).await,
                Flow::ShortCircuit(mut response) => {
                    response.extensions_mut().insert(ShortCircuit { stage: gate.name() });
                    Ok(response)
                }
            }
        })
    }
}
