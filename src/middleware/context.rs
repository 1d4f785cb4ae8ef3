//! Request-scoped pipeline context.
//!
//! Every stage reads and writes the same [`PipelineContext`] stored in the
//! request extensions. Values are typed fields rather than string-keyed
//! entries, so a downstream reader can never find a value of the wrong type.
//!
//! Handlers receive the context as an extractor:
//!
//! ```rust,ignore
//! async fn get_recipe(ctx: PipelineContext) -> AppResult<Json<Recipe>> {
//!     let id = ctx.recipe_id.ok_or_else(|| AppError::bad_request("Invalid recipe ID"))?;
//!     // ...
//! }
//! ```

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::Extensions;
use axum::http::request::Parts;

/// Parsed pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl Pagination {
    /// Number of items to skip before this page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

/// Per-request state shared between pipeline stages and the handler.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    /// Correlation id assigned by the access log stage
    pub request_id: Option<String>,
    /// Key the rate limit gate charged this request to
    pub client_key: Option<String>,
    /// Pagination parsed by the pagination validator
    pub pagination: Option<Pagination>,
    /// Numeric path id parsed by the id validator
    pub recipe_id: Option<u32>,
}

impl PipelineContext {
    /// Context of a request, created empty on first access.
    pub fn of(extensions: &mut Extensions) -> &mut Self {
        extensions.get_or_insert_default::<Self>()
    }
}

impl<S> FromRequestParts<S> for PipelineContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<PipelineContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Marker placed in response extensions by a stage that ended the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCircuit {
    /// Name of the stage that produced the response
    pub stage: &'static str,
}
