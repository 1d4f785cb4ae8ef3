use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::Recipe;

/// Request to generate a recipe.
///
/// Every field is optional on the wire; validation decides what is
/// acceptable. An absent or `null` field takes its zero value, so a missing
/// `serving_size` reads as 0.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipeRequest {
    /// Comma-separated ingredient list
    #[serde(deserialize_with = "null_as_default")]
    pub ingredients: String,
    /// Free-form dietary restrictions
    #[serde(deserialize_with = "null_as_default")]
    pub dietary_restrictions: String,
    /// Free-form cuisine preference
    #[serde(deserialize_with = "null_as_default")]
    pub cuisine_preference: String,
    /// Number of people to serve
    #[serde(deserialize_with = "null_as_default")]
    pub serving_size: i64,
}

/// A generated recipe together with the inputs that produced it.
///
/// Returned by generation and sent back by clients to save or export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeData {
    /// Generated recipe text
    #[serde(deserialize_with = "null_as_default")]
    pub recipe: String,
    /// Generation time (RFC 3339)
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: String,
    /// Ingredients as entered
    #[serde(deserialize_with = "null_as_default")]
    pub ingredients_used: String,
    /// Dietary restrictions as entered
    #[serde(deserialize_with = "null_as_default")]
    pub dietary_restrictions: String,
    /// Cuisine preference as entered
    #[serde(deserialize_with = "null_as_default")]
    pub cuisine_preference: String,
    /// Serving size used for generation
    #[serde(deserialize_with = "null_as_default")]
    pub serving_size: u32,
}

/// Read a field where JSON `null` means the zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Body of `POST /save_recipe` and `POST /export_recipe/{format}`.
#[derive(Debug, Deserialize)]
pub struct RecipeEnvelope {
    pub recipe_data: RecipeData,
}

/// Response after saving a recipe.
#[derive(Debug, Serialize)]
pub struct SaveRecipeResponse {
    pub message: &'static str,
    pub recipe_id: u32,
    pub title: String,
}

/// Body of `POST /validate_ingredients`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValidateIngredientsRequest {
    pub ingredients: String,
}

/// Result of an ingredient check. Always sent with 200.
#[derive(Debug, Serialize)]
pub struct ValidateIngredientsResponse {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
}

impl ValidateIngredientsResponse {
    /// Negative result with a reason.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            count: None,
            ingredients: None,
        }
    }
}

/// Query string of `GET /api/recipes` (pagination is handled separately).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecipeSearchQuery {
    /// Case-insensitive substring of title or content
    pub search: Option<String>,
    /// Minimum rating, ignored if not a number
    pub min_rating: Option<String>,
}

/// One page of saved recipes.
#[derive(Debug, Serialize)]
pub struct RecipeListResponse {
    pub recipes: Vec<Recipe>,
    pub total: usize,
    pub pages: usize,
    pub current_page: u32,
    pub per_page: u32,
}

/// Body of `PUT /api/recipes/{id}/rating`.
#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i64,
}

/// Response after a rating update.
#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub message: &'static str,
    pub rating: u8,
}

/// Generic confirmation body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_request_defaults() {
        let request: RecipeRequest =
            serde_json::from_str(r#"{"ingredients": "eggs"}"#).expect("Deserialization should succeed");

        assert_eq!(request.ingredients, "eggs");
        assert_eq!(request.serving_size, 0);
        assert!(request.dietary_restrictions.is_empty());
    }

    #[test]
    fn test_null_fields_take_zero_values() {
        let request: RecipeRequest = serde_json::from_str(
            r#"{"ingredients": "eggs", "dietary_restrictions": null, "cuisine_preference": null, "serving_size": null}"#,
        )
        .unwrap();

        assert_eq!(request.serving_size, 0);
        assert!(request.dietary_restrictions.is_empty());
        assert!(request.cuisine_preference.is_empty());

        let data: RecipeData =
            serde_json::from_str(r#"{"recipe": "Toast", "serving_size": null, "timestamp": null}"#)
                .unwrap();
        assert_eq!(data.serving_size, 0);
        assert!(data.timestamp.is_empty());
    }

    #[test]
    fn test_null_does_not_hide_type_errors() {
        assert!(serde_json::from_str::<RecipeRequest>(r#"{"serving_size": "four"}"#).is_err());
    }

    #[test]
    fn test_recipe_envelope_accepts_partial_data() {
        let envelope: RecipeEnvelope =
            serde_json::from_str(r#"{"recipe_data": {"recipe": "Toast"}}"#).unwrap();
        assert_eq!(envelope.recipe_data.recipe, "Toast");
        assert_eq!(envelope.recipe_data.serving_size, 0);
    }

    #[test]
    fn test_validate_response_omits_empty_fields() {
        let json = serde_json::to_value(ValidateIngredientsResponse::invalid("No ingredients provided"))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"valid": false, "message": "No ingredients provided"})
        );
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok",
            version: "0.1.0",
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&response).expect("Serialization should succeed");
        assert!(json.contains("\"status\":\"ok\""));
    }
}
