//! In-process tests of the composed router.
//!
//! Requests are driven through `build_router` with `tower::ServiceExt::oneshot`
//! against stub collaborators, so every stage runs exactly as in production
//! without a socket. A `ConnectInfo` extension stands in for the peer address.
//!
//! Run with: `cargo test --test pipeline_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use recipe_gateway::services::{InMemoryRecipeStore, RecipeGenerator, UpstreamError};
use recipe_gateway::{AppState, Config, build_router};

/// Ingredient that makes the stub generator panic.
const PANIC_INGREDIENT: &str = "dynamite";

/// Ingredient that makes the stub generator fail.
const FAILING_INGREDIENT: &str = "unobtainium";

struct StubGenerator;

#[async_trait]
impl RecipeGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        if prompt.contains(PANIC_INGREDIENT) {
            panic!("generator blew up");
        }
        if prompt.contains(FAILING_INGREDIENT) {
            return Err(UpstreamError::EmptyResponse);
        }
        Ok("Recipe Name: Stub Frittata\n\nWhisk and bake.".to_string())
    }
}

fn test_config() -> Config {
    Config {
        anthropic_api_key: "test-key".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        ..Config::default()
    }
}

fn app_with(config: Config) -> (Router, AppState) {
    let state = AppState::with_collaborators(
        config,
        Arc::new(StubGenerator),
        Arc::new(InMemoryRecipeStore::new()),
    )
    .unwrap();
    (build_router(state.clone()), state)
}

fn app() -> Router {
    app_with(test_config()).0
}

fn request(method: Method, uri: &str, body: Option<Value>, peer: &str) -> Request<Body> {
    let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let addr: SocketAddr = format!("{peer}:40000").parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

fn generate(body: Value, peer: &str) -> Request<Body> {
    request(Method::POST, "/generate_recipe", Some(body), peer)
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn ingredients(n: usize) -> String {
    (0..n).map(|i| format!("item{i}")).collect::<Vec<_>>().join(",")
}

// =============================================================================
// Ops routes
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let response = app()
        .oneshot(request(Method::GET, "/health", None, "10.0.0.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_readiness_endpoint() {
    let response = app()
        .oneshot(request(Method::GET, "/ready", None, "10.0.0.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ready");
    assert_eq!(json["database"], "connected");
}

#[tokio::test]
async fn test_unmatched_path_is_404() {
    let response = app()
        .oneshot(request(Method::GET, "/does/not/exist", None, "10.0.0.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await, json!({"error": "Not found"}));
}

#[tokio::test]
async fn test_metrics_use_route_templates() {
    let app = app();
    for id in ["1", "2"] {
        app.clone()
            .oneshot(request(
                Method::GET,
                &format!("/api/recipes/{id}"),
                None,
                "10.0.0.1",
            ))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(request(Method::GET, "/metrics", None, "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(text.contains(r#"endpoint="/api/recipes/{id}""#));
    assert!(text.contains(r#"status="404""#));
    assert!(text.contains("recipe_ai_total_recipes 0"));
}

// =============================================================================
// Origin gate
// =============================================================================

#[tokio::test]
async fn test_allowed_origin_gets_cors_headers() {
    let mut req = request(Method::GET, "/health", None, "10.0.0.1");
    req.headers_mut()
        .insert("origin", "http://localhost:3000".parse().unwrap());
    let response = app().oneshot(req).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["access-control-max-age"], "86400");
}

#[tokio::test]
async fn test_unknown_origin_gets_no_allow_origin() {
    let mut req = request(Method::GET, "/health", None, "10.0.0.1");
    req.headers_mut()
        .insert("origin", "http://evil.example".parse().unwrap());
    let response = app().oneshot(req).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-methods")
    );
}

#[tokio::test]
async fn test_preflight_answers_204_regardless_of_origin() {
    let app = app();
    for origin in ["http://localhost:3000", "http://evil.example"] {
        let mut req = request(Method::OPTIONS, "/generate_recipe", None, "10.0.0.1");
        req.headers_mut().insert("origin", origin.parse().unwrap());
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT, "origin {origin}");
    }
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_generation_rate_limit_sequence() {
    let app = app();
    let body = json!({"ingredients": "eggs, cheese", "serving_size": 2});

    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = app
            .clone()
            .oneshot(generate(body.clone(), "10.1.1.1"))
            .await
            .unwrap();
        statuses.push(response.status());

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            assert_eq!(response.headers()["x-ratelimit-limit"], "5");
            let retry: u64 = response.headers()["retry-after"]
                .to_str()
                .unwrap()
                .parse()
                .unwrap();
            assert!(retry >= 1);

            let json = body_json(response).await;
            assert_eq!(json["error"], "Rate limit exceeded");
            assert_eq!(json["code"], "rate_limit_exceeded");
            assert_eq!(json["retry_after"], "Please try again later");
        }
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}

#[tokio::test]
async fn test_clients_and_groups_limited_independently() {
    let app = app();
    let body = json!({"ingredients": "rice", "serving_size": 1});

    for _ in 0..3 {
        app.clone()
            .oneshot(generate(body.clone(), "10.2.2.2"))
            .await
            .unwrap();
    }

    // Same client, other registry
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/recipes", None, "10.2.2.2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Other client, same registry
    let response = app.oneshot(generate(body, "10.2.2.3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forwarded_for_ignored_from_untrusted_peer() {
    let app = app();
    let body = json!({"ingredients": "rice", "serving_size": 1});

    let mut statuses = Vec::new();
    for i in 0..3 {
        let mut req = generate(body.clone(), "10.3.3.3");
        req.headers_mut()
            .insert("x-forwarded-for", format!("203.0.113.{i}").parse().unwrap());
        statuses.push(app.clone().oneshot(req).await.unwrap().status());
    }

    assert_eq!(statuses[2], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_forwarded_for_used_from_trusted_proxy() {
    let (app, _state) = app_with(Config {
        trusted_proxies: vec!["10.0.0.0/8".to_string()],
        ..test_config()
    });
    let body = json!({"ingredients": "rice", "serving_size": 1});

    for i in 0..4 {
        let mut req = generate(body.clone(), "10.9.9.9");
        req.headers_mut()
            .insert("x-forwarded-for", format!("203.0.113.{i}").parse().unwrap());
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "client {i}");
    }
}

#[tokio::test]
async fn test_unsupported_method_does_not_spend_generation_permits() {
    let app = app();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/generate_recipe", None, "10.4.5.6"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Method not allowed"})
        );
    }

    let response = app
        .oneshot(generate(
            json!({"ingredients": "eggs", "serving_size": 2}),
            "10.4.5.6",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unsupported_method_on_api_item_route() {
    let response = app()
        .oneshot(request(Method::POST, "/api/recipes/1", None, "10.4.5.7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await["error"], "Method not allowed");
}

#[tokio::test]
async fn test_preflight_is_not_rate_limited() {
    let app = app();
    for _ in 0..5 {
        let req = request(Method::OPTIONS, "/generate_recipe", None, "10.4.4.4");
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app
        .oneshot(generate(
            json!({"ingredients": "eggs", "serving_size": 1}),
            "10.4.4.4",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_generation_validator_bounds() {
    let app = app();
    let cases = [
        (json!({"ingredients": ingredients(20), "serving_size": 4}), StatusCode::OK),
        (
            json!({"ingredients": ingredients(21), "serving_size": 4}),
            StatusCode::BAD_REQUEST,
        ),
        (json!({"ingredients": "eggs", "serving_size": 1}), StatusCode::OK),
        (json!({"ingredients": "eggs", "serving_size": 12}), StatusCode::OK),
        (json!({"ingredients": "eggs", "serving_size": 0}), StatusCode::BAD_REQUEST),
        (json!({"ingredients": "eggs", "serving_size": 13}), StatusCode::BAD_REQUEST),
        (json!({"ingredients": "eggs"}), StatusCode::BAD_REQUEST),
    ];

    // One client per case keeps the strict limiter out of the way
    for (i, (body, expected)) in cases.into_iter().enumerate() {
        let peer = format!("10.5.0.{}", i + 1);
        let response = app.clone().oneshot(generate(body.clone(), &peer)).await.unwrap();
        assert_eq!(response.status(), expected, "body {body}");
    }
}

#[tokio::test]
async fn test_null_fields_decode_as_empty() {
    let app = app();

    let response = app
        .clone()
        .oneshot(generate(
            json!({"ingredients": "eggs", "dietary_restrictions": "", "serving_size": null}),
            "10.5.1.1",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Serving size must be between 1 and 12"})
    );

    let response = app
        .oneshot(generate(
            json!({
                "ingredients": "eggs",
                "dietary_restrictions": null,
                "cuisine_preference": null,
                "serving_size": 2
            }),
            "10.5.1.2",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["dietary_restrictions"], "");
    assert_eq!(json["cuisine_preference"], "");
}

#[tokio::test]
async fn test_invalid_item_id_rejected_before_handler() {
    let app = app();
    for uri in ["/api/recipes/abc", "/api/recipes/0", "/api/recipes/abc/rating"] {
        let method = if uri.ends_with("rating") {
            Method::PUT
        } else {
            Method::GET
        };
        let response = app
            .clone()
            .oneshot(request(method, uri, Some(json!({"rating": 3})), "10.6.0.1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
        assert_eq!(body_json(response).await["error"], "Invalid ID parameter");
    }
}

#[tokio::test]
async fn test_pagination_defaults_in_listing() {
    let response = app()
        .oneshot(request(
            Method::GET,
            "/api/recipes?page=-4&per_page=1000",
            None,
            "10.6.0.2",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["current_page"], 1);
    assert_eq!(json["per_page"], 10);
    assert_eq!(json["total"], 0);
    assert_eq!(json["pages"], 0);
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test]
async fn test_panic_in_one_request_does_not_affect_another() {
    let app = app();

    let failing = app.clone().oneshot(generate(
        json!({"ingredients": PANIC_INGREDIENT, "serving_size": 2}),
        "10.7.0.1",
    ));
    let healthy = app.clone().oneshot(generate(
        json!({"ingredients": "eggs", "serving_size": 2}),
        "10.7.0.2",
    ));

    let (failing, healthy) = tokio::join!(
        tokio::spawn(failing),
        tokio::spawn(healthy)
    );
    let failing = failing.unwrap().unwrap();
    let healthy = healthy.unwrap().unwrap();

    assert_eq!(failing.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(failing).await,
        json!({"error": "Internal server error"})
    );
    assert_eq!(healthy.status(), StatusCode::OK);

    // The router keeps serving afterwards
    let response = app
        .oneshot(request(Method::GET, "/health", None, "10.7.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// End-to-end generation
// =============================================================================

#[tokio::test]
async fn test_generation_empty_ingredients() {
    let response = app()
        .oneshot(generate(
            json!({"ingredients": "   ", "serving_size": 2}),
            "10.8.0.1",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Ingredients field is required"})
    );
}

#[tokio::test]
async fn test_generation_upstream_failure() {
    let response = app()
        .oneshot(generate(
            json!({"ingredients": FAILING_INGREDIENT, "serving_size": 2}),
            "10.8.0.2",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Failed to generate recipe"})
    );
}

#[tokio::test]
async fn test_generation_success() {
    let response = app()
        .oneshot(generate(
            json!({
                "ingredients": "eggs, spinach",
                "dietary_restrictions": "vegetarian",
                "serving_size": 3
            }),
            "10.8.0.3",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["recipe"], "Recipe Name: Stub Frittata\n\nWhisk and bake.");
    assert_eq!(json["ingredients_used"], "eggs, spinach");
    assert_eq!(json["dietary_restrictions"], "vegetarian");
    assert_eq!(json["serving_size"], 3);
    assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
}

// =============================================================================
// Saved recipes
// =============================================================================

fn recipe_data() -> Value {
    json!({
        "recipe_data": {
            "recipe": "Recipe Name: Stub Frittata\n\nWhisk and bake.",
            "timestamp": "2024-01-15T10:30:00Z",
            "ingredients_used": "eggs, spinach",
            "dietary_restrictions": "",
            "cuisine_preference": "Italian",
            "serving_size": 2
        }
    })
}

#[tokio::test]
async fn test_saved_recipe_lifecycle() {
    let app = app();
    let peer = "10.9.0.1";

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/save_recipe", Some(recipe_data()), peer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let saved = body_json(response).await;
    assert_eq!(saved["message"], "Recipe saved successfully");
    assert_eq!(saved["recipe_id"], 1);
    assert_eq!(saved["title"], "Stub Frittata");

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/recipes?search=FRITTATA", None, peer))
        .await
        .unwrap();
    let list = body_json(response).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["pages"], 1);
    assert_eq!(list["recipes"][0]["cuisine_preference"], "Italian");

    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            "/api/recipes/1/rating",
            Some(json!({"rating": 6})),
            peer,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Rating must be between 1 and 5 stars"
    );

    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            "/api/recipes/1/rating",
            Some(json!({"rating": 4})),
            peer,
        ))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"message": "Recipe rating updated successfully", "rating": 4})
    );

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/recipes/1", None, peer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let recipe = body_json(response).await;
    assert_eq!(recipe["rating"], 4);
    assert_eq!(recipe["dietary_restrictions"], Value::Null);

    let response = app
        .clone()
        .oneshot(request(Method::DELETE, "/api/recipes/1", None, peer))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await["message"],
        "Recipe deleted successfully"
    );

    let response = app
        .oneshot(request(Method::GET, "/api/recipes/1", None, peer))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Recipe not found");
}

#[tokio::test]
async fn test_save_requires_recipe_text() {
    let response = app()
        .oneshot(request(
            Method::POST,
            "/save_recipe",
            Some(json!({"recipe_data": {"recipe": ""}})),
            "10.9.0.2",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No recipe data provided");
}

#[tokio::test]
async fn test_export_formats() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/export_recipe/txt",
            Some(recipe_data()),
            "10.9.0.3",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()["content-disposition"].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"recipe_"));
    assert!(disposition.ends_with(".txt\""));
    let text = body_text(response).await;
    assert!(text.starts_with("Recipe Generated on 2024-01-15T10:30:00Z\n\n"));
    assert!(text.contains("Dietary Restrictions: None\n"));

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/export_recipe/json",
            Some(recipe_data()),
            "10.9.0.3",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["serving_size"], 2);

    let response = app
        .oneshot(request(
            Method::POST,
            "/export_recipe/pdf",
            Some(recipe_data()),
            "10.9.0.3",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid export format");
}

#[tokio::test]
async fn test_validate_ingredients_endpoint() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/validate_ingredients",
            Some(json!({"ingredients": "eggs, milk"})),
            "10.9.0.4",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "valid": true,
            "message": "Valid: 2 ingredient(s) provided",
            "count": 2,
            "ingredients": ["eggs", "milk"]
        })
    );

    let response = app
        .oneshot(request(
            Method::POST,
            "/validate_ingredients",
            Some(json!({"ingredients": ingredients(21)})),
            "10.9.0.4",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["valid"], false);
}
