use crate::error::QaError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }
}

/// A remote language model able to embed text and generate answers
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate an embedding for a piece of text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate a completion for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Builds a [`LanguageModel`] handle from a credential.
///
/// The credential is passed in explicitly on every call so a missing key is
/// reported at submission time instead of failing at startup.
pub trait ModelClient: Send + Sync {
    fn create(&self, api_key: Option<&str>) -> Result<Arc<dyn LanguageModel>, QaError>;
}

/// Checks shared by every [`ModelClient`]: the key must be present and look
/// like a single token
pub fn validate_api_key(api_key: Option<&str>) -> Result<&str, QaError> {
    let key = match api_key.map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => {
            return Err(QaError::Config(
                "no API key configured; set GEMINI_API_KEY and restart".to_string(),
            ))
        }
    };

    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(QaError::Auth(
            "API key contains whitespace or control characters".to_string(),
        ));
    }

    Ok(key)
}
