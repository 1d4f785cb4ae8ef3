//! Fuzz testing for validation functions.
//!
//! This fuzz target tests the robustness of the validation module against
//! arbitrary input. It ensures that validation functions:
//!
//! - Never panic on any input
//! - Always return a valid Result (Ok or Err)
//! - Keep their documented bounds on whatever they accept
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the validation fuzz target
//! cargo +nightly fuzz run fuzz_validation
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```
//!
//! # What This Tests
//!
//! - `parse_recipe_request` / `validate_recipe_request`: Generation request bodies
//! - `validate_recipe_id`: Path id parsing
//! - `parse_pagination`: Query pagination defaults
//! - `split_ingredients`: Ingredient list splitting
//! - `extract_title`: Title derivation from recipe text

#![no_main]

use libfuzzer_sys::fuzz_target;
use recipe_gateway::models::extract_title;
use recipe_gateway::validation::{
    MAX_INGREDIENTS, MAX_PER_PAGE, parse_pagination, parse_recipe_request, split_ingredients,
    validate_recipe_id, validate_recipe_request,
};

fuzz_target!(|data: &[u8]| {
    // Raw bytes as a request body
    if let Ok(req) = parse_recipe_request(data) {
        if validate_recipe_request(&req).is_ok() {
            assert!(req.ingredients.split(',').count() <= MAX_INGREDIENTS);
            assert!((1..=12).contains(&req.serving_size));
        }
    }

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(id) = validate_recipe_id(s) {
            assert!(id > 0);
        }

        // Split the input in two for page / per_page
        let mid = s.char_indices().nth(s.chars().count() / 2).map_or(0, |(i, _)| i);
        let (page, per_page) = s.split_at(mid);
        let pagination = parse_pagination(Some(page), Some(per_page));
        assert!(pagination.page >= 1);
        assert!((1..=MAX_PER_PAGE).contains(&pagination.per_page));

        for ingredient in split_ingredients(s) {
            assert!(!ingredient.is_empty());
        }

        assert!(!extract_title(s).is_empty());
    }
});
