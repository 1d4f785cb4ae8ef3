//! Payload and parameter validation gate.
//!
//! Three variants, one per route group that needs them:
//!
//! | Variant | Checks | On success |
//! |---------|--------|------------|
//! | `RecipeRequest` | JSON body of `POST` requests | body restored for the handler |
//! | `RecipeId` | `{id}` path segment | `recipe_id` stored in context |
//! | `Pagination` | `page` / `per_page` query | `pagination` stored in context, never rejects |
//!
//! Violations answer 400 with `{"error": <constraint>}`.

use axum::body::{Body, to_bytes};
use axum::extract::{Query, RawPathParams};
use axum::extract::FromRequestParts;
use axum::http::{Method, Request};
use serde::Deserialize;
use tracing::debug;

use super::context::PipelineContext;
use super::stage::{Flow, Gate};
use crate::error::AppError;
use crate::validation::{
    parse_pagination, parse_recipe_request, validate_recipe_id, validate_recipe_request,
};

/// Stage name reported on validation failures.
pub const VALIDATOR_STAGE: &str = "validator";

/// Validation gate.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Generation request body, capped at `body_limit` bytes.
    RecipeRequest { body_limit: usize },
    /// Numeric recipe id from the path.
    RecipeId,
    /// Listing pagination from the query string.
    Pagination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageParams {
    page: Option<String>,
    per_page: Option<String>,
}

impl Gate for Validator {
    fn name(&self) -> &'static str {
        VALIDATOR_STAGE
    }

    async fn check(&self, req: Request<Body>) -> Flow {
        let outcome = match self {
            Validator::RecipeRequest { body_limit } => recipe_request(req, *body_limit).await,
            Validator::RecipeId => recipe_id(req).await,
            Validator::Pagination => Ok(pagination(req)),
        };

        match outcome {
            Ok(req) => Flow::Continue(req),
            Err(err) => Flow::reject(err),
        }
    }
}

async fn recipe_request(req: Request<Body>, body_limit: usize) -> Result<Request<Body>, AppError> {
    if req.method() != Method::POST {
        return Ok(req);
    }

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, body_limit).await.map_err(|e| {
        debug!(error = %e, "Failed to read request body");
        AppError::bad_request_with_details("Invalid request format", e.to_string())
    })?;

    let parsed = parse_recipe_request(&bytes)?;
    validate_recipe_request(&parsed)?;

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

async fn recipe_id(req: Request<Body>) -> Result<Request<Body>, AppError> {
    let (mut parts, body) = req.into_parts();

    let raw = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(name, _)| *name == "id")
                .map(|(_, value)| value.to_owned())
        })
        .unwrap_or_default();

    let id = validate_recipe_id(&raw)?;
    PipelineContext::of(&mut parts.extensions).recipe_id = Some(id);

    Ok(Request::from_parts(parts, body))
}

fn pagination(mut req: Request<Body>) -> Request<Body> {
    let params = Query::<PageParams>::try_from_uri(req.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    let pagination = parse_pagination(params.page.as_deref(), params.per_page.as_deref());
    PipelineContext::of(req.extensions_mut()).pagination = Some(pagination);
    req
}
