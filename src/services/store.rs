//! Recipe persistence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::middleware::Pagination;
use crate::models::{NewRecipe, Recipe, extract_title};

/// Persistence failures. Relayed to clients as a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("recipe id space exhausted")]
    IdsExhausted,
}

/// Filters for a recipe listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeQuery {
    pub pagination: Pagination,
    /// Case-insensitive substring of title or content
    pub search: Option<String>,
    /// Only recipes rated at least this many stars
    pub min_rating: Option<u8>,
}

/// One page of a listing plus the unpaginated match count.
#[derive(Debug, Clone, Default)]
pub struct RecipePage {
    pub recipes: Vec<Recipe>,
    pub total: usize,
}

/// Storage for saved recipes.
#[async_trait]
pub trait RecipeStore: Send + Sync + 'static {
    /// Persist a recipe, assigning its id, title and timestamp.
    async fn create(&self, recipe: NewRecipe) -> Result<Recipe, StoreError>;

    /// Newest first, filtered and paginated.
    async fn list(&self, query: &RecipeQuery) -> Result<RecipePage, StoreError>;

    async fn get(&self, id: u32) -> Result<Option<Recipe>, StoreError>;

    /// Returns `false` if no recipe had this id.
    async fn delete(&self, id: u32) -> Result<bool, StoreError>;

    /// Returns `false` if no recipe had this id.
    async fn update_rating(&self, id: u32, rating: u8) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Cheap liveness probe used by the readiness check.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u32,
    recipes: BTreeMap<u32, Recipe>,
}

/// Process-local store. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct InMemoryRecipeStore {
    inner: RwLock<Inner>,
}

impl InMemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(recipe: &Recipe, needle: Option<&str>, min_rating: Option<u8>) -> bool {
    if let Some(min) = min_rating
        && recipe.rating.is_none_or(|r| r < min)
    {
        return false;
    }

    needle.is_none_or(|needle| {
        recipe.title.to_lowercase().contains(needle)
            || recipe.content.to_lowercase().contains(needle)
    })
}

#[async_trait]
impl RecipeStore for InMemoryRecipeStore {
    #[instrument(skip(self, recipe))]
    async fn create(&self, recipe: NewRecipe) -> Result<Recipe, StoreError> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        inner.next_id = id;

        let saved = Recipe {
            id,
            title: extract_title(&recipe.content),
            content: recipe.content,
            ingredients_used: recipe.ingredients_used,
            dietary_restrictions: recipe.dietary_restrictions,
            cuisine_preference: recipe.cuisine_preference,
            serving_size: recipe.serving_size,
            rating: None,
            created_at: Utc::now(),
        };
        inner.recipes.insert(id, saved.clone());

        debug!(id, title = %saved.title, "Recipe stored");
        Ok(saved)
    }

    async fn list(&self, query: &RecipeQuery) -> Result<RecipePage, StoreError> {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let inner = self.inner.read().await;
        let matching: Vec<&Recipe> = inner
            .recipes
            .values()
            .rev()
            .filter(|r| matches(r, needle.as_deref(), query.min_rating))
            .collect();

        let total = matching.len();
        let recipes = matching
            .into_iter()
            .skip(query.pagination.offset())
            .take(query.pagination.per_page as usize)
            .cloned()
            .collect();

        Ok(RecipePage { recipes, total })
    }

    async fn get(&self, id: u32) -> Result<Option<Recipe>, StoreError> {
        Ok(self.inner.read().await.recipes.get(&id).cloned())
    }

    async fn delete(&self, id: u32) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.recipes.remove(&id).is_some())
    }

    async fn update_rating(&self, id: u32, rating: u8) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.recipes.get_mut(&id) {
            Some(recipe) => {
                recipe.rating = Some(rating);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.recipes.len())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
