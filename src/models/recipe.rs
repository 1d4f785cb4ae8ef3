use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecipeData;

/// Title used when no line of the content qualifies.
pub const UNTITLED_RECIPE: &str = "Untitled Recipe";

/// Leading markers stripped from candidate title lines, in this order.
const TITLE_PREFIXES: [&str; 6] = ["Recipe Name:", "Recipe:", "Title:", "**", "#", "*"];

/// A saved recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: u32,
    pub title: String,
    #[serde(rename = "recipe")]
    pub content: String,
    pub ingredients_used: String,
    pub dietary_restrictions: Option<String>,
    pub cuisine_preference: Option<String>,
    pub serving_size: u32,
    pub rating: Option<u8>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A recipe about to be stored. The store assigns id, title and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub content: String,
    pub ingredients_used: String,
    pub dietary_restrictions: Option<String>,
    pub cuisine_preference: Option<String>,
    pub serving_size: u32,
}

impl From<RecipeData> for NewRecipe {
    fn from(data: RecipeData) -> Self {
        let non_empty = |s: String| (!s.is_empty()).then_some(s);
        Self {
            content: data.recipe,
            ingredients_used: data.ingredients_used,
            dietary_restrictions: non_empty(data.dietary_restrictions),
            cuisine_preference: non_empty(data.cuisine_preference),
            serving_size: data.serving_size,
        }
    }
}

/// Derive a display title from generated recipe text.
///
/// Takes the first line that, after stripping markdown and label prefixes,
/// is between 4 and 99 characters long. Blank lines and "Recipe Generated"
/// banners are skipped. Otherwise the first line is used, cut to 50
/// characters with an ellipsis.
pub fn extract_title(content: &str) -> String {
    let content = content.trim();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("Recipe Generated") {
            continue;
        }

        let mut candidate = line;
        for prefix in TITLE_PREFIXES {
            if let Some(rest) = candidate.strip_prefix(prefix) {
                candidate = rest.trim();
            }
        }
        let candidate = candidate.replace('*', "");
        let candidate = candidate.trim();

        let len = candidate.chars().count();
        if (4..100).contains(&len) {
            return candidate.to_string();
        }
    }

    match content.lines().next() {
        Some(first) if first.chars().count() > 50 => {
            format!("{}...", first.chars().take(50).collect::<String>())
        }
        Some(first) if !first.is_empty() => first.to_string(),
        _ => UNTITLED_RECIPE.to_string(),
    }
}
