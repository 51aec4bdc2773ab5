use crate::error::{AuthRejected, QaError};
use crate::model::{validate_api_key, Embedding, LanguageModel, ModelClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_EMBEDDINGS_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";
pub const DEFAULT_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
pub const DEFAULT_GENERATE_MODEL: &str = "models/gemini-1.5-flash";

/// Endpoints and model names for the Gemini API. The API key is not part of
/// this configuration; it is supplied to [`GeminiModelClient::create`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub embeddings_url: String,
    pub generate_url: String,
    pub embedding_model: String,
    pub generate_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            embeddings_url: DEFAULT_EMBEDDINGS_URL.to_string(),
            generate_url: DEFAULT_GENERATE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generate_model: DEFAULT_GENERATE_MODEL.to_string(),
        }
    }
}

/// Sampling settings sent with every generation request
#[derive(Serialize, Debug, Clone, Copy)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub max_output_tokens: i32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            temperature: 0.2,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    api_key: String,
    generation: GenerationConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig, api_key: impl Into<String>) -> Self {
        GeminiClient {
            config,
            api_key: api_key.into(),
            generation: GenerationConfig::default(),
            client: reqwest::Client::new(),
        }
    }

    /// Generate embeddings for a text
    pub async fn get_embedding(&self, text: &str) -> Result<Embedding> {
        #[derive(Serialize)]
        struct EmbeddingContent<'a> {
            parts: Vec<Part<'a>>,
        }

        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            content: EmbeddingContent<'a>,
        }

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            content: EmbeddingContent {
                parts: vec![Part { text }],
            },
        };

        let response: EmbeddingResponse = self.post(&self.config.embeddings_url, &request).await?;

        Ok(Embedding {
            values: response.embedding.values,
        })
    }

    /// Generate text using the configured Gemini model
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.generate_model,
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: self.generation,
        };

        let response: GenerateResponse = self.post(&self.config.generate_url, &request).await?;

        // Extract the generated text from the response
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }

    async fn post<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .context("Failed to reach the Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            if is_auth_failure(status, &error_text) {
                return Err(AuthRejected {
                    status: status.as_u16(),
                }
                .into());
            }
            return Err(anyhow::anyhow!(
                "API request failed: {} {}",
                status,
                error_text
            ));
        }

        response
            .json()
            .await
            .context("Failed to decode Gemini API response")
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.get_embedding(text).await
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt).await
    }
}

/// Gemini answers a bad key with 400 `API_KEY_INVALID` as well as 401/403
fn is_auth_failure(status: StatusCode, body: &str) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || (status == StatusCode::BAD_REQUEST && body.contains("API_KEY_INVALID"))
}

/// Creates [`GeminiClient`] handles
#[derive(Debug, Clone, Default)]
pub struct GeminiModelClient {
    config: GeminiConfig,
}

impl GeminiModelClient {
    pub fn new(config: GeminiConfig) -> Self {
        GeminiModelClient { config }
    }
}

impl ModelClient for GeminiModelClient {
    fn create(&self, api_key: Option<&str>) -> Result<Arc<dyn LanguageModel>, QaError> {
        let key = validate_api_key(api_key)?;
        Ok(Arc::new(GeminiClient::new(self.config.clone(), key)))
    }
}

// Request/response structures for the Gemini API

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'static str,
}

impl<'a> Content<'a> {
    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role,
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
