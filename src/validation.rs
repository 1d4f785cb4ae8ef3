//! Input validation for recipe requests and route parameters.
//!
//! These are plain functions over raw input so they can be fuzzed directly;
//! the [`Validator`](crate::middleware::Validator) stage applies them before
//! a request reaches its handler.

use crate::error::{AppError, AppResult};
use crate::middleware::Pagination;
use crate::models::RecipeRequest;

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum number of comma-separated ingredient entries.
pub const MAX_INGREDIENTS: usize = 20;

/// Smallest accepted serving size.
pub const MIN_SERVING_SIZE: i64 = 1;

/// Largest accepted serving size.
pub const MAX_SERVING_SIZE: i64 = 12;

/// Largest accepted `per_page` value.
pub const MAX_PER_PAGE: u32 = 100;

/// Accepted star ratings.
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// Parse a recipe generation request body.
///
/// # Errors
///
/// `Invalid request format`, with the parser message as details, if the body
/// is not a JSON object of the expected shape.
pub fn parse_recipe_request(body: &[u8]) -> AppResult<RecipeRequest> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request_with_details("Invalid request format", e.to_string()))
}

/// Check the fields of a recipe generation request.
///
/// Rules, checked in order:
/// - ingredients must not be blank
/// - at most [`MAX_INGREDIENTS`] comma-separated entries (empty entries count)
/// - serving size between 1 and 12; an absent serving size counts as 0
pub fn validate_recipe_request(req: &RecipeRequest) -> AppResult<()> {
    if req.ingredients.trim().is_empty() {
        return Err(AppError::bad_request("Ingredients field is required"));
    }

    if req.ingredients.split(',').count() > MAX_INGREDIENTS {
        return Err(AppError::bad_request(format!(
            "Too many ingredients (maximum {MAX_INGREDIENTS})"
        )));
    }

    if !(MIN_SERVING_SIZE..=MAX_SERVING_SIZE).contains(&req.serving_size) {
        return Err(AppError::bad_request(format!(
            "Serving size must be between {MIN_SERVING_SIZE} and {MAX_SERVING_SIZE}"
        )));
    }

    Ok(())
}

/// Validate the `{id}` path segment of an item route.
///
/// Accepts decimal digits only, parsed as a non-zero `u32`.
pub fn validate_recipe_id(raw: &str) -> AppResult<u32> {
    if raw.is_empty() {
        return Err(AppError::bad_request("ID parameter is required"));
    }

    raw.bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| raw.parse::<u32>().ok())
        .flatten()
        .filter(|id| *id != 0)
        .ok_or_else(|| AppError::bad_request("Invalid ID parameter"))
}

/// Resolve pagination query values, falling back to defaults.
///
/// Never fails: a missing, unparseable or out-of-range `page` becomes 1 and
/// such a `per_page` becomes 10.
pub fn parse_pagination(page: Option<&str>, per_page: Option<&str>) -> Pagination {
    let defaults = Pagination::default();

    let page = page
        .and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(defaults.page);

    let per_page = per_page
        .and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|p| (1..=MAX_PER_PAGE).contains(p))
        .unwrap_or(defaults.per_page);

    Pagination { page, per_page }
}

/// Trimmed, non-empty ingredient entries.
pub fn split_ingredients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a star rating.
pub fn validate_rating(rating: i64) -> AppResult<u8> {
    if !RATING_RANGE.contains(&rating) {
        return Err(AppError::bad_request("Rating must be between 1 and 5 stars"));
    }
    u8::try_from(rating).map_err(|_| AppError::bad_request("Rating must be between 1 and 5 stars"))
}
