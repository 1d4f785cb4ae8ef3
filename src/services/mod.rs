mod generator;
mod store;

pub use generator::{
    AnthropicGenerator, AnthropicSettings, RecipeGenerator, UpstreamError, build_prompt,
};
pub use store::{InMemoryRecipeStore, RecipePage, RecipeQuery, RecipeStore, StoreError};
