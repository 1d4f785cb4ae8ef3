//! Recipe generation endpoint.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use chrono::{SecondsFormat, Utc};
use tracing::{info, instrument};

use crate::error::AppResult;
use crate::middleware::PipelineContext;
use crate::models::RecipeData;
use crate::services::build_prompt;
use crate::state::AppState;
use crate::validation::parse_recipe_request;

/// Serving size used when the request leaves it at 0.
const DEFAULT_SERVING_SIZE: u32 = 4;

/// Generate a recipe from an ingredient list.
///
/// The body has already passed the recipe request validator.
///
/// # Response Body
///
/// ```json
/// {
///   "recipe": "Recipe Name: ...",
///   "timestamp": "2024-01-15T10:30:00Z",
///   "ingredients_used": "eggs, spinach",
///   "dietary_restrictions": "",
///   "cuisine_preference": "",
///   "serving_size": 4
/// }
/// ```
#[instrument(skip(state, ctx, body), fields(client_ip = ctx.client_key.as_deref()))]
pub async fn generate_recipe(
    State(state): State<AppState>,
    ctx: PipelineContext,
    body: Bytes,
) -> AppResult<Json<RecipeData>> {
    let req = parse_recipe_request(&body)?;

    let serving_size = u32::try_from(req.serving_size)
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_SERVING_SIZE);

    let prompt = build_prompt(&req, serving_size);
    let recipe = state.generator.generate(&prompt).await?;

    info!(
        ingredients = %req.ingredients,
        serving_size,
        "Recipe generated successfully"
    );

    Ok(Json(RecipeData {
        recipe,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ingredients_used: req.ingredients,
        dietary_restrictions: req.dietary_restrictions,
        cuisine_preference: req.cuisine_preference,
        serving_size,
    }))
}
