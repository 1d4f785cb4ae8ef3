//! Request-admission pipeline.
//!
//! Every inbound request passes an ordered chain of stages before it reaches
//! a handler:
//!
//! - **Recovery**: Contains handler panics, answers 500
//! - **Origin Gate**: CORS headers, answers preflight with 204
//! - **Access Log**: Request id and one structured record per request
//! - **Metrics Capture**: Request counter and latency histogram
//! - **Rate Limit Gate**: Per-client token bucket, answers 429
//! - **Validator**: Body, path id and pagination checks, answers 400
//!
//! # Architecture
//!
//! ```text
//! Request → Recovery → Origin → AccessLog → Metrics → RateLimit → Validator → Handler
//!                         ↓                               ↓            ↓
//!                   204 preflight                     429 Too Many   400 Bad Request
//! ```
//!
//! Wrapping stages are plain Tower layers. Stages that may end the chain
//! early implement [`Gate`] and are run by [`GateLayer`]. Which stages a
//! route group gets is decided once, in [`Pipeline`].
//!
//! # Security Considerations
//!
//! - Forwarding headers are only believed from configured trusted proxies
//! - Limiter registries are bounded, so unseen client keys cannot grow memory
//!   without limit

pub mod access_log;
pub mod context;
pub mod cors;
pub mod ip;
pub mod metrics;
pub mod pipeline;
pub mod rate_limit;
pub mod recovery;
pub mod stage;
pub mod validate;

pub use access_log::{AccessLogLayer, REQUEST_ID_HEADER};
pub use context::{Pagination, PipelineContext, ShortCircuit};
pub use cors::OriginLayer;
pub use ip::{TrustedProxyConfig, UNKNOWN_IP, client_key};
pub use metrics::MetricsLayer;
pub use pipeline::{Pipeline, Stage};
pub use rate_limit::RateLimitGate;
pub use recovery::{RecoveryLayer, install_panic_hook};
pub use stage::{Flow, Gate, GateLayer};
pub use validate::Validator;
