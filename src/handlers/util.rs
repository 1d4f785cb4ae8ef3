//! Shared utilities for handlers.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::middleware::PipelineContext;

/// Decode a JSON request body.
///
/// Handlers take raw bytes rather than `Json<T>` so malformed bodies and a
/// missing `Content-Type` both answer with the standard error shape.
///
/// # Errors
///
/// `Invalid request format` if the body does not decode as `T`.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Rejected malformed JSON body");
        AppError::bad_request("Invalid request format")
    })
}

/// Recipe id parsed by the id validator.
///
/// # Errors
///
/// `Invalid recipe ID` if the route was served without that validator.
pub fn recipe_id(ctx: &PipelineContext) -> AppResult<u32> {
    ctx.recipe_id
        .ok_or_else(|| AppError::bad_request("Invalid recipe ID"))
}

/// Attachment file name for an export, e.g. `recipe_20240115_103000.txt`.
pub fn export_filename(at: DateTime<Utc>, extension: &str) -> String {
    format!("recipe_{}.{extension}", at.format("%Y%m%d_%H%M%S"))
}
