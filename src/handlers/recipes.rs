//! Saved recipe endpoints.
//!
//! # Endpoints
//!
//! - `POST /save_recipe` - Persist a generated recipe
//! - `POST /export_recipe/{format}` - Download a recipe as `json` or `txt`
//! - `POST /validate_ingredients` - Check an ingredient list without generating
//! - `GET /api/recipes` - Paginated listing with search and rating filter
//! - `GET /api/recipes/{id}` - Single recipe
//! - `DELETE /api/recipes/{id}` - Remove a recipe
//! - `PUT /api/recipes/{id}/rating` - Rate a recipe 1 to 5 stars
//!
//! Item routes read the id from the [`PipelineContext`], where the id
//! validator put it.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{info, instrument};

use super::util::{decode_json, export_filename, recipe_id};
use crate::error::{AppError, AppResult};
use crate::middleware::PipelineContext;
use crate::models::{
    MessageResponse, NewRecipe, RatingRequest, RatingResponse, Recipe, RecipeData, RecipeEnvelope,
    RecipeListResponse, RecipeSearchQuery, SaveRecipeResponse, ValidateIngredientsRequest,
    ValidateIngredientsResponse,
};
use crate::services::RecipeQuery;
use crate::state::AppState;
use crate::validation::{MAX_INGREDIENTS, split_ingredients, validate_rating};

fn recipe_not_found() -> AppError {
    AppError::NotFound("Recipe not found".to_string())
}

/// Decode `{recipe_data}` and require non-empty recipe text.
fn recipe_data(body: &[u8]) -> AppResult<RecipeData> {
    let RecipeEnvelope { recipe_data } = decode_json(body)?;
    if recipe_data.recipe.trim().is_empty() {
        return Err(AppError::bad_request("No recipe data provided"));
    }
    Ok(recipe_data)
}

/// Persist a generated recipe.
#[instrument(skip(state, body))]
pub async fn save_recipe(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<SaveRecipeResponse>> {
    let data = recipe_data(&body)?;
    let saved = state.store.create(NewRecipe::from(data)).await?;

    info!(recipe_id = saved.id, title = %saved.title, "Recipe saved");

    Ok(Json(SaveRecipeResponse {
        message: "Recipe saved successfully",
        recipe_id: saved.id,
        title: saved.title,
    }))
}

/// Render a recipe as a downloadable file.
///
/// `json` is the recipe data pretty-printed; `txt` is a plain text sheet with
/// a header block followed by the recipe.
#[instrument(skip(body))]
pub async fn export_recipe(Path(format): Path<String>, body: Bytes) -> AppResult<Response> {
    let data = recipe_data(&body)?;
    let now = Utc::now();

    let (content_type, content) = match format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&data)
                .map_err(|e| AppError::Internal(format!("Failed to export recipe: {e}")))?;
            ("application/json", json)
        }
        "txt" => ("text/plain; charset=utf-8", text_export(&data)),
        _ => return Err(AppError::bad_request("Invalid export format")),
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(now, &format)
    );

    Ok((
        [(CONTENT_TYPE, content_type.to_string()), (CONTENT_DISPOSITION, disposition)],
        content,
    )
        .into_response())
}

fn text_export(data: &RecipeData) -> String {
    let or = |value: &str, fallback: &'static str| {
        if value.is_empty() { fallback.to_string() } else { value.to_string() }
    };

    format!(
        "Recipe Generated on {}\n\n\
         Ingredients Used: {}\n\
         Dietary Restrictions: {}\n\
         Cuisine Preference: {}\n\
         Serving Size: {}\n\n\
         {}\n",
        data.timestamp,
        data.ingredients_used,
        or(&data.dietary_restrictions, "None"),
        or(&data.cuisine_preference, "Any"),
        data.serving_size,
        data.recipe,
    )
}

/// Check an ingredient list. Always answers 200 for a decodable body.
#[instrument(skip(body))]
pub async fn validate_ingredients(body: Bytes) -> Response {
    let Ok(req) = serde_json::from_slice::<ValidateIngredientsRequest>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ValidateIngredientsResponse::invalid("Invalid request format")),
        )
            .into_response();
    };

    Json(check_ingredients(&req.ingredients)).into_response()
}

fn check_ingredients(raw: &str) -> ValidateIngredientsResponse {
    if raw.is_empty() {
        return ValidateIngredientsResponse::invalid("No ingredients provided");
    }

    let ingredients = split_ingredients(raw);
    if ingredients.is_empty() {
        return ValidateIngredientsResponse::invalid("Please provide at least one ingredient");
    }
    if ingredients.len() > MAX_INGREDIENTS {
        return ValidateIngredientsResponse::invalid(format!(
            "Too many ingredients (maximum {MAX_INGREDIENTS})"
        ));
    }

    ValidateIngredientsResponse {
        valid: true,
        message: format!("Valid: {} ingredient(s) provided", ingredients.len()),
        count: Some(ingredients.len()),
        ingredients: Some(ingredients),
    }
}

/// List saved recipes, newest first.
#[instrument(skip(state, ctx))]
pub async fn list_recipes(
    State(state): State<AppState>,
    ctx: PipelineContext,
    Query(params): Query<RecipeSearchQuery>,
) -> AppResult<Json<RecipeListResponse>> {
    let pagination = ctx.pagination.unwrap_or_default();

    // A non-numeric or zero rating filter is ignored
    let min_rating = params
        .min_rating
        .as_deref()
        .and_then(|r| r.trim().parse::<u8>().ok())
        .filter(|r| *r > 0);

    let query = RecipeQuery {
        pagination,
        search: params.search,
        min_rating,
    };
    let page = state.store.list(&query).await?;

    Ok(Json(RecipeListResponse {
        pages: page.total.div_ceil(pagination.per_page as usize),
        total: page.total,
        recipes: page.recipes,
        current_page: pagination.page,
        per_page: pagination.per_page,
    }))
}

/// Get a single recipe.
#[instrument(skip(state, ctx), fields(recipe_id = ctx.recipe_id))]
pub async fn get_recipe(
    State(state): State<AppState>,
    ctx: PipelineContext,
) -> AppResult<Json<Recipe>> {
    let id = recipe_id(&ctx)?;
    let recipe = state.store.get(id).await?.ok_or_else(recipe_not_found)?;
    Ok(Json(recipe))
}

/// Delete a recipe.
#[instrument(skip(state, ctx), fields(recipe_id = ctx.recipe_id))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    ctx: PipelineContext,
) -> AppResult<Json<MessageResponse>> {
    let id = recipe_id(&ctx)?;
    if !state.store.delete(id).await? {
        return Err(recipe_not_found());
    }

    info!(recipe_id = id, "Recipe deleted");
    Ok(Json(MessageResponse {
        message: "Recipe deleted successfully",
    }))
}

/// Set a recipe's star rating.
#[instrument(skip(state, ctx, body), fields(recipe_id = ctx.recipe_id))]
pub async fn update_rating(
    State(state): State<AppState>,
    ctx: PipelineContext,
    body: Bytes,
) -> AppResult<Json<RatingResponse>> {
    let id = recipe_id(&ctx)?;
    let RatingRequest { rating } = decode_json(&body)?;
    let rating = validate_rating(rating)?;

    if !state.store.update_rating(id, rating).await? {
        return Err(recipe_not_found());
    }

    info!(
        recipe_id = id,
        rating,
        client_ip = ctx.client_key.as_deref(),
        "Recipe rating updated successfully"
    );

    Ok(Json(RatingResponse {
        message: "Recipe rating updated successfully",
        rating,
    }))
}
