use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::info;
use qdrant_client::qdrant::{
    with_payload_selector, CreateCollectionBuilder, Distance, PointStruct, SearchPoints,
    UpsertPointsBuilder, Value, VectorParams, WithPayloadSelector,
};
use qdrant_client::Qdrant;
use serde_json::json;

use super::{ScoredChunk, VectorStore};
use crate::chunking::{estimate_token_count, TextChunk};
use crate::model::Embedding;

/// Configuration for Qdrant
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

/// Vector store backed by a Qdrant server
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Create a new Qdrant client
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let config_builder = Qdrant::from_url(&config.url);
        let config_builder = match config.api_key {
            Some(api_key) => config_builder.api_key(api_key),
            None => config_builder,
        };

        let client = config_builder
            .build()
            .with_context(|| format!("Failed to create Qdrant client for {}", config.url))?;

        Ok(QdrantStore { client })
    }

    /// Check if a collection exists
    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        match self.client.collection_info(name).await {
            Ok(_) => Ok(true),
            Err(qdrant_client::QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                Ok(false)
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to check collection existence: {}",
                e
            )),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        // Collections outlive the process; an earlier run may have left one behind
        if self.collection_exists(name).await? {
            info!("Replacing existing collection {}", name);
            self.client
                .delete_collection(name.to_string())
                .await
                .with_context(|| format!("Failed to delete collection {}", name))?;
        }

        let create_collection =
            CreateCollectionBuilder::new(name).vectors_config(VectorParams {
                size: dimensions as u64,
                distance: Distance::Cosine.into(),
                ..Default::default()
            });

        self.client
            .create_collection(create_collection)
            .await
            .with_context(|| format!("Failed to create collection {}", name))?;

        Ok(())
    }

    async fn store_chunks(
        &self,
        name: &str,
        chunks: Vec<TextChunk>,
        embeddings: Vec<Embedding>,
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            bail!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            );
        }

        let mut points = Vec::with_capacity(chunks.len());
        for (idx, (chunk, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            let payload: HashMap<String, Value> = serde_json::from_value(json!({
                "text": chunk.text,
                "document_id": chunk.document_id,
                "start_position": chunk.start_position,
                "chunk_index": idx,
            }))
            .context("Failed to build point payload")?;

            points.push(PointStruct::new(idx as u64, embedding.values, payload));
        }

        let upsert_request = UpsertPointsBuilder::new(name, points).wait(true).build();

        self.client
            .upsert_points(upsert_request)
            .await
            .with_context(|| format!("Failed to upsert points in collection {}", name))?;

        Ok(())
    }

    async fn search(&self, name: &str, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>> {
        let search_request = SearchPoints {
            collection_name: name.to_string(),
            vector: query.values.clone(),
            limit: limit as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .with_context(|| format!("Failed to search collection {}", name))?;

        // Convert search results back to TextChunks
        let hits = search_response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let payload = scored_point.payload;
                let text = payload.get("text")?.as_str()?.to_string();
                let document_id = payload
                    .get("document_id")
                    .and_then(|v| v.as_str())
                    .cloned()
                    .unwrap_or_default();
                let start_position = payload
                    .get("start_position")
                    .and_then(|v| v.as_integer())
                    .map(|v| v as usize)
                    .unwrap_or(0);

                Some(ScoredChunk {
                    chunk: TextChunk {
                        token_count: estimate_token_count(&text),
                        text,
                        document_id,
                        start_position,
                    },
                    score: scored_point.score,
                })
            })
            .collect();

        Ok(hits)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if !self.collection_exists(name).await? {
            return Ok(());
        }
        self.client
            .delete_collection(name.to_string())
            .await
            .with_context(|| format!("Failed to delete collection {}", name))?;
        info!("Deleted collection {}", name);
        Ok(())
    }
}
