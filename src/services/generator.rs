//! Recipe text generation through the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::models::RecipeRequest;

/// Pinned Messages API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Completion length cap for one recipe.
const MAX_TOKENS: u32 = 2000;

/// Sampling temperature.
const TEMPERATURE: f32 = 0.7;

/// Errors from the text-generation collaborator.
///
/// Details stay server-side; clients only ever see
/// `Failed to generate recipe`.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation request timed out")]
    Timeout,

    #[error("generation API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("generation API returned no text")]
    EmptyResponse,

    #[error("failed to decode generation response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Turns a prompt into recipe text.
#[async_trait]
pub trait RecipeGenerator: Send + Sync + 'static {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

/// Build the generation prompt for a validated request.
///
/// Empty preferences read as "None" and "Any".
pub fn build_prompt(req: &RecipeRequest, serving_size: u32) -> String {
    let dietary = non_empty_or(&req.dietary_restrictions, "None");
    let cuisine = non_empty_or(&req.cuisine_preference, "Any");

    format!(
        "Generate a detailed recipe using the following ingredients: {ingredients}\n\n\
         Dietary restrictions: {dietary}\n\
         Cuisine preference: {cuisine}\n\
         Serving size: {serving_size} people\n\n\
         Please provide:\n\
         1. Recipe name\n\
         2. Total prep time and cooking time\n\
         3. Complete list of ingredients with measurements\n\
         4. Step-by-step cooking instructions\n\
         5. Nutritional information (approximate)\n\
         6. Tips or variations\n\n\
         Format the response in a clear, structured way.",
        ingredients = req.ingredients,
    )
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

/// Connection settings for [`AnthropicGenerator`].
#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// Messages API client.
#[derive(Clone)]
pub struct AnthropicGenerator {
    client: Client,
    settings: AnthropicSettings,
}

impl std::fmt::Debug for AnthropicGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicGenerator")
            .field("api_url", &self.settings.api_url)
            .field("model", &self.settings.model)
            .field("timeout", &self.settings.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicGenerator {
    /// Create a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Request` if the HTTP client cannot be built.
    pub fn new(settings: AnthropicSettings) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl RecipeGenerator for AnthropicGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.settings.model))]
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.settings.api_url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Generation API returned an error");
            return Err(UpstreamError::Status { status, body });
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .filter(|text| !text.is_empty())
            .ok_or(UpstreamError::EmptyResponse)?;

        debug!(chars = text.len(), "Recipe text generated");
        Ok(text)
    }
}
