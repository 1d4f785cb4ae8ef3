mod generate;
mod health;
mod recipes;
mod util;

pub use generate::generate_recipe;
pub use health::{health_check, metrics, readiness_check};
pub use recipes::{
    delete_recipe, export_recipe, get_recipe, list_recipes, save_recipe, update_rating,
    validate_ingredients,
};
