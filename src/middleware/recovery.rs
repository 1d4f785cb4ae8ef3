//! Panic containment for the request pipeline.
//!
//! [`RecoveryLayer`] must be the outermost stage of every route group. The
//! whole downstream chain, including the synchronous part of each inner
//! `Service::call`, runs inside `catch_unwind`, so a panic anywhere below it
//! becomes a logged fault and a generic 500 instead of tearing down the
//! connection task.
//!
//! # Response
//!
//! ```json
//! { "error": "Internal server error" }
//! ```
//!
//! The panic payload and a backtrace are logged server-side only; nothing
//! about the fault is exposed to the caller.
//!
//! # Backtraces
//!
//! By the time `catch_unwind` returns, the panicking frames are gone. Call
//! [`install_panic_hook`] once at startup: the hook captures the backtrace at
//! the panic site into a thread-local, and the recovery stage (which polls the
//! downstream future on the same thread) picks it up for its log record.
//! While the downstream future is being polled the hook only logs at debug,
//! so a recovered panic yields one error record, written by this stage.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use futures_util::FutureExt;
use tower::{Layer, Service};
use tracing::{debug, error};

use super::context::ShortCircuit;
use crate::error::AppError;

/// Stage name reported on recovered responses.
pub const RECOVERY_STAGE: &str = "recovery";

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
    static RECOVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as polling a recovered future until dropped.
///
/// Dropped during unwinding too, so the mark never outlives the poll.
struct RecoveryScope;

impl RecoveryScope {
    fn enter() -> Self {
        RECOVERY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        RecoveryScope
    }
}

impl Drop for RecoveryScope {
    fn drop(&mut self) {
        RECOVERY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn in_recovery_scope() -> bool {
    RECOVERY_DEPTH.with(|depth| depth.get() > 0)
}

/// Install a process-wide panic hook that records panic-site backtraces.
///
/// Panics outside request handling (background tasks, startup) are logged
/// by the hook itself at error level. Panics under a recovery stage are
/// logged once, by that stage.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        if in_recovery_scope() {
            debug!(panic = %info, "Panic inside request handling");
        } else {
            error!(panic = %info, backtrace = %backtrace, "Thread panicked");
        }
        PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
    }));
}

fn take_panic_backtrace() -> String {
    PANIC_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .map_or_else(|| "unavailable".to_string(), |bt| bt.to_string())
}

/// Tower layer that converts downstream panics into 500 responses.
#[derive(Clone, Copy, Default)]
pub struct RecoveryLayer;

impl RecoveryLayer {
    /// Create a new recovery layer.
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService { inner }
    }
}

/// Recovery service wrapper.
#[derive(Clone)]
pub struct RecoveryService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RecoveryService<S>
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
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut downstream = Box::pin(async move { inner.call(req).await });
            let scoped = futures_util::future::poll_fn(move |cx| {
                let _scope = RecoveryScope::enter();
                downstream.as_mut().poll(cx)
            });

            match AssertUnwindSafe(scoped).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    error!(
                        panic = %panic_message(payload.as_ref()),
                        method = %method,
                        path = %path,
                        backtrace = %take_panic_backtrace(),
                        "Panic recovered"
                    );

                    let mut response = AppError::Internal(format!("panic in {method} {path}"))
                        .into_response();
                    response.extensions_mut().insert(ShortCircuit {
                        stage: RECOVERY_STAGE,
                    });
                    Ok(response)
                }
            }
        })
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
