use crate::chunking::ChunkingConfig;
use crate::gemini::{
    GeminiConfig, DEFAULT_EMBEDDINGS_URL, DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATE_MODEL,
    DEFAULT_GENERATE_URL,
};
use crate::store::QdrantConfig;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TOP_K: usize = 2;

/// Everything the service needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub session_ttl: Duration,
    /// Absent keys are allowed; submissions then fail with a configuration error
    pub api_key: Option<String>,
    pub gemini: GeminiConfig,
    pub qdrant: Option<QdrantConfig>,
    pub chunking: ChunkingConfig,
    pub top_k: usize,
}

impl Config {
    /// Create a configuration from CLI values and the process environment
    pub fn from_env(bind: String, session_ttl_secs: u64) -> Result<Self> {
        Self::from_vars(bind, session_ttl_secs, env::vars().collect())
    }

    /// Same as [`Config::from_env`] but over an explicit variable map
    pub fn from_vars(bind: String, session_ttl_secs: u64, vars: HashMap<String, String>) -> Result<Self> {
        let var = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY"));

        let gemini = GeminiConfig {
            embeddings_url: var("GEMINI_EMBEDDINGS_URL")
                .unwrap_or_else(|| DEFAULT_EMBEDDINGS_URL.to_string()),
            generate_url: var("GEMINI_GENERATE_URL")
                .unwrap_or_else(|| DEFAULT_GENERATE_URL.to_string()),
            embedding_model: var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            generate_model: var("GEMINI_GENERATE_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATE_MODEL.to_string()),
        };

        let qdrant = var("QDRANT_URL").map(|url| QdrantConfig {
            url,
            api_key: var("QDRANT_API_KEY"),
        });

        let defaults = ChunkingConfig::default();
        let chunking = ChunkingConfig {
            chunk_size: parse_var(var("DOCQA_CHUNK_SIZE"), "DOCQA_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(
                var("DOCQA_CHUNK_OVERLAP"),
                "DOCQA_CHUNK_OVERLAP",
                defaults.chunk_overlap,
            )?,
        };
        if chunking.chunk_size == 0 {
            anyhow::bail!("DOCQA_CHUNK_SIZE must be greater than zero");
        }

        let top_k = parse_var(var("DOCQA_TOP_K"), "DOCQA_TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            anyhow::bail!("DOCQA_TOP_K must be greater than zero");
        }

        Ok(Config {
            bind,
            session_ttl: Duration::from_secs(session_ttl_secs),
            api_key,
            gemini,
            qdrant,
            chunking,
            top_k,
        })
    }
}

fn parse_var<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}
