//! Vector storage backends for document indexes.
//!
//! Each loaded document gets its own collection. [`InMemoryStore`] keeps
//! vectors in the process and is used when no Qdrant URL is configured;
//! [`QdrantStore`] persists them in a Qdrant server.

mod memory;
mod qdrant;

pub use memory::InMemoryStore;
pub use qdrant::{QdrantConfig, QdrantStore};

use crate::chunking::TextChunk;
use crate::model::Embedding;
use anyhow::Result;
use async_trait::async_trait;

/// A chunk returned by a similarity search
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create an empty collection holding vectors of `dimensions` length,
    /// replacing any collection already stored under `name`
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Store chunks and their embeddings, index-aligned
    async fn store_chunks(
        &self,
        name: &str,
        chunks: Vec<TextChunk>,
        embeddings: Vec<Embedding>,
    ) -> Result<()>;

    /// Return up to `limit` chunks closest to `query`, best first
    async fn search(&self, name: &str, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Drop a collection and its vectors; a missing collection is not an error
    async fn delete_collection(&self, name: &str) -> Result<()>;
}

/// Generate a collection name from a document's file name and id
pub fn collection_name(file_name: &str, document_id: &str) -> String {
    // Replace non-alphanumeric characters with underscores and convert to lowercase
    let name = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase();
    let suffix: String = document_id
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect();

    format!("doc_{}_{}", name, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name() {
        assert_eq!(
            collection_name("My Notes.txt", "1b4e28ba-2fa1-11d2-883f-0016d3cca427"),
            "doc_my_notes_txt_1b4e28ba"
        );
    }
}
