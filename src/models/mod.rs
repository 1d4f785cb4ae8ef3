mod api;
mod recipe;

pub use api::{
    HealthResponse, MessageResponse, RatingRequest, RatingResponse, ReadyResponse, RecipeData,
    RecipeEnvelope, RecipeListResponse, RecipeRequest, RecipeSearchQuery, SaveRecipeResponse,
    ValidateIngredientsRequest, ValidateIngredientsResponse,
};
pub use recipe::{NewRecipe, Recipe, UNTITLED_RECIPE, extract_title};
