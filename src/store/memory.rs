use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use super::{ScoredChunk, VectorStore};
use crate::chunking::TextChunk;
use crate::model::Embedding;

struct Collection {
    dimensions: usize,
    entries: Vec<(TextChunk, Vec<f32>)>,
}

/// In-process store; vector search is brute-force cosine similarity.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, name: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(name).map_or(0, |c| c.entries.len())
    }

    pub async fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        let previous = collections.insert(
            name.to_string(),
            Collection {
                dimensions,
                entries: Vec::new(),
            },
        );
        if previous.is_some() {
            debug!("Replaced existing collection {}", name);
        }
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

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .with_context(|| format!("Collection {} does not exist", name))?;

        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            if embedding.dimensions() != collection.dimensions {
                bail!(
                    "Embedding has {} dimensions, collection {} expects {}",
                    embedding.dimensions(),
                    name,
                    collection.dimensions
                );
            }
            collection.entries.push((chunk, embedding.values));
        }
        Ok(())
    }

    async fn search(&self, name: &str, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .with_context(|| format!("Collection {} does not exist", name))?;

        let mut hits: Vec<ScoredChunk> = collection
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_sim(&query.values, vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.remove(name).is_some() {
            debug!("Deleted collection {} ({} remaining)", name, collections.len());
        }
        Ok(())
    }
}
