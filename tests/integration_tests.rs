//! End-to-end tests over real sockets.
//!
//! Each fixture starts a mock text generation API and the gateway on
//! ephemeral ports, then talks to the gateway with `reqwest`. Nothing outside
//! the test process is needed.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use recipe_gateway::services::RecipeStore;
use recipe_gateway::{AppState, Config, build_router};

/// Ingredient that makes the mock upstream answer with an error.
const UPSTREAM_FAILURE: &str = "teapot";

const MOCK_RECIPE: &str = "Recipe Name: Mock Soup\n\nIngredients:\n- water\n\nSimmer.";

/// Mock of the text generation Messages API.
async fn mock_messages(headers: HeaderMap, axum::Json(body): axum::Json<Value>) -> impl IntoResponse {
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"error": {"message": "invalid x-api-key"}})),
        );
    }

    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    if prompt.contains(UPSTREAM_FAILURE) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({"error": {"message": "overloaded"}})),
        );
    }

    (
        StatusCode::OK,
        axum::Json(json!({
            "content": [{"type": "text", "text": MOCK_RECIPE}],
            "model": body["model"],
        })),
    )
}

/// Bind an ephemeral port and serve `app` on it in the background.
async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to ephemeral port");
    let addr = listener.local_addr().expect("Failed to get local address");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server error");
    });

    addr
}

/// Test fixture that manages the mock upstream and the gateway
struct TestFixture {
    base_url: String,
    client: Client,
    state: AppState,
}

impl TestFixture {
    async fn new() -> Self {
        let upstream = spawn_server(Router::new().route("/v1/messages", post(mock_messages))).await;

        let config = Config {
            anthropic_api_key: "test-key".to_string(),
            anthropic_api_url: format!("http://{upstream}/v1/messages"),
            generation_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        let state = AppState::new(config).expect("Failed to build application state");
        let addr = spawn_server(build_router(state.clone())).await;

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn generate(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/generate_recipe"))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request")
    }
}

// =============================================================================
// Ops Tests
// =============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let request_id = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());

    let response = fixture
        .client
        .get(fixture.url("/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["database"], "connected");
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
}

// =============================================================================
// Generation Tests
// =============================================================================

#[tokio::test]
async fn test_generate_save_and_list() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .generate(json!({
            "ingredients": "water, salt",
            "cuisine_preference": "Thai",
            "serving_size": 2
        }))
        .await;
    assert_eq!(response.status(), 200);
    let generated: Value = response.json().await.unwrap();
    assert_eq!(generated["recipe"], MOCK_RECIPE);
    assert_eq!(generated["cuisine_preference"], "Thai");

    let response = fixture
        .client
        .post(fixture.url("/save_recipe"))
        .json(&json!({"recipe_data": generated}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let saved: Value = response.json().await.unwrap();
    assert_eq!(saved["title"], "Mock Soup");

    let response = fixture
        .client
        .get(fixture.url("/api/recipes?page=1&per_page=5"))
        .send()
        .await
        .unwrap();
    let list: Value = response.json().await.unwrap();
    assert_eq!(list["total"], 1);
    assert_eq!(list["per_page"], 5);
    assert_eq!(list["recipes"][0]["title"], "Mock Soup");
    assert_eq!(list["recipes"][0]["serving_size"], 2);

    assert_eq!(fixture.state.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_upstream_failure_is_sanitized() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .generate(json!({"ingredients": UPSTREAM_FAILURE, "serving_size": 1}))
        .await;

    assert_eq!(response.status(), 500);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json, json!({"error": "Failed to generate recipe"}));
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/generate_recipe"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"], "Invalid request format");
    assert!(json["details"].is_string());
}

// =============================================================================
// Rate Limiting Tests
// =============================================================================

#[tokio::test]
async fn test_peer_address_is_rate_limited() {
    let fixture = TestFixture::new().await;
    let body = json!({"ingredients": "water", "serving_size": 1});

    let mut statuses = Vec::new();
    for _ in 0..3 {
        statuses.push(fixture.generate(body.clone()).await.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 429]);

    // Spoofed forwarding headers from an untrusted peer do not help
    let response = fixture
        .client
        .post(fixture.url("/generate_recipe"))
        .header("x-forwarded-for", "198.51.100.7")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);
    assert!(response.headers().contains_key("retry-after"));

    // The api registry is unaffected
    let response = fixture
        .client
        .get(fixture.url("/api/recipes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_limiter_gauge_exported() {
    let fixture = TestFixture::new().await;
    fixture
        .generate(json!({"ingredients": "water", "serving_size": 1}))
        .await;

    fixture.state.metrics.set_rate_limiter_clients(
        recipe_gateway::state::GENERATION_GROUP,
        fixture.state.generation_limits.len().await,
    );

    let text = fixture
        .client
        .get(fixture.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(text.contains(r#"recipe_ai_rate_limiter_clients{group="generation"} 1"#));
    assert!(text.contains(r#"endpoint="/generate_recipe""#));

    fixture.state.shutdown().await;
}
