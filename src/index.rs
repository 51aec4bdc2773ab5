use crate::chunking::{split_into_chunks, ChunkingConfig};
use crate::document::Document;
use crate::error::QaError;
use crate::model::{Embedding, LanguageModel};
use crate::store::{collection_name, VectorStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

/// Answer given when retrieval finds nothing to ground an answer on
pub const NO_CONTEXT_ANSWER: &str = "No relevant information found in the document.";

/// Answers natural-language questions against one document's index
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, QaError>;

    /// Free whatever the index holds outside the process; called once when
    /// the owning session ends
    async fn release(&self) -> Result<(), QaError> {
        Ok(())
    }
}

/// Embeds a document and returns a [`QueryEngine`] over it
#[async_trait]
pub trait IndexBuilder: Send + Sync {
    async fn build(
        &self,
        model: Arc<dyn LanguageModel>,
        document: &Document,
    ) -> Result<Box<dyn QueryEngine>, QaError>;
}

/// Builds indexes in a [`VectorStore`], one collection per document
pub struct VectorIndexBuilder {
    store: Arc<dyn VectorStore>,
    chunking: ChunkingConfig,
    top_k: usize,
}

impl VectorIndexBuilder {
    pub fn new(store: Arc<dyn VectorStore>, chunking: ChunkingConfig, top_k: usize) -> Self {
        VectorIndexBuilder {
            store,
            chunking,
            top_k: top_k.max(1),
        }
    }

    /// Chunk, embed and store a document; returns the collection name
    async fn index_document(&self, model: &dyn LanguageModel, document: &Document) -> Result<String> {
        let document_id = document.id.to_string();
        let chunks = split_into_chunks(&document.content, &document_id, &self.chunking);
        if chunks.is_empty() {
            anyhow::bail!("{} produced no text chunks", document.file_name);
        }
        info!("Split {} into {} chunks", document.file_name, chunks.len());

        // Generate embeddings for each chunk
        let mut embeddings: Vec<Embedding> = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            debug!("Embedding chunk {} of {}", i + 1, chunks.len());
            let embedding = model
                .embed(&chunk.text)
                .await
                .with_context(|| format!("Failed to embed chunk {}", i + 1))?;
            embeddings.push(embedding);
        }

        let dimensions = embeddings[0].dimensions();
        if dimensions == 0 {
            anyhow::bail!("Embedding service returned empty vectors");
        }
        if let Some((i, odd)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.dimensions() != dimensions)
        {
            anyhow::bail!(
                "Embedding for chunk {} has {} dimensions, expected {}",
                i + 1,
                odd.dimensions(),
                dimensions
            );
        }

        let collection = collection_name(&document.file_name, &document_id);
        self.store.create_collection(&collection, dimensions).await?;
        if let Err(e) = self.store.store_chunks(&collection, chunks, embeddings).await {
            // A half-filled collection must not survive into the next attempt
            if let Err(cleanup) = self.store.delete_collection(&collection).await {
                warn!("Failed to drop partial collection {}: {:#}", collection, cleanup);
            }
            return Err(e);
        }

        Ok(collection)
    }
}

#[async_trait]
impl IndexBuilder for VectorIndexBuilder {
    async fn build(
        &self,
        model: Arc<dyn LanguageModel>,
        document: &Document,
    ) -> Result<Box<dyn QueryEngine>, QaError> {
        info!("Building index for {}", document.file_name);

        let collection = self
            .index_document(model.as_ref(), document)
            .await
            .map_err(QaError::from_build)?;

        info!("Index ready in collection {}", collection);

        Ok(Box::new(VectorQueryEngine {
            model,
            store: self.store.clone(),
            collection,
            top_k: self.top_k,
        }))
    }
}

/// Retrieval-augmented answering over one collection
pub struct VectorQueryEngine {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn VectorStore>,
    collection: String,
    top_k: usize,
}

impl VectorQueryEngine {
    async fn answer(&self, question: &str) -> Result<String> {
        // Get embedding for the question
        let question_embedding = self
            .model
            .embed(question)
            .await
            .context("Failed to embed question")?;

        // Retrieve relevant chunks
        let hits = self
            .store
            .search(&self.collection, &question_embedding, self.top_k)
            .await?;

        if hits.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }
        debug!("Retrieved {} chunks for question", hits.len());

        // Create context from chunks
        let context = hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n\n");

        let answer = self
            .model
            .generate(&build_prompt(&context, question))
            .await
            .context("Failed to generate answer")?;

        Ok(answer.trim().to_string())
    }
}

#[async_trait]
impl QueryEngine for VectorQueryEngine {
    async fn ask(&self, question: &str) -> Result<String, QaError> {
        info!("Querying {}", self.collection);
        self.answer(question).await.map_err(QaError::from_query)
    }

    async fn release(&self) -> Result<(), QaError> {
        info!("Dropping collection {}", self.collection);
        self.store
            .delete_collection(&self.collection)
            .await
            .map_err(|e| QaError::Build(format!("{:#}", e)))
    }
}

fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {}\n\
         Answer: ",
        context, question
    )
}
