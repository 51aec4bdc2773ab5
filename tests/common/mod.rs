#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use docqa::document::{Document, DocumentLoader, UploadedFile};
use docqa::error::QaError;
use docqa::chunking::ChunkingConfig;
use docqa::index::{IndexBuilder, QueryEngine, VectorIndexBuilder};
use docqa::model::{validate_api_key, Embedding, LanguageModel, ModelClient};
use docqa::session::SessionController;
use docqa::store::InMemoryStore;
use uuid::Uuid;

/// Counts loads; the first `fail_next` loads fail
#[derive(Default)]
pub struct CountingLoader {
    pub calls: AtomicUsize,
    pub fail_next: AtomicUsize,
}

#[async_trait]
impl DocumentLoader for CountingLoader {
    async fn load(&self, upload: &UploadedFile) -> Result<Document, QaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_next) {
            return Err(QaError::Load("simulated parse failure".to_string()));
        }
        Ok(Document {
            id: Uuid::new_v4(),
            file_name: upload.file_name.clone(),
            mime_type: "text/plain".to_string(),
            content: String::from_utf8_lossy(&upload.bytes).into_owned(),
        })
    }
}

pub struct NullModel;

#[async_trait]
impl LanguageModel for NullModel {
    async fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(Embedding { values: vec![1.0] })
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }
}

#[derive(Default)]
pub struct CountingModelClient {
    pub calls: AtomicUsize,
}

impl ModelClient for CountingModelClient {
    fn create(&self, api_key: Option<&str>) -> Result<Arc<dyn LanguageModel>, QaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        validate_api_key(api_key)?;
        Ok(Arc::new(NullModel))
    }
}

/// State shared by every engine a [`CountingIndexBuilder`] hands out
#[derive(Default)]
pub struct EngineLog {
    pub asked: Mutex<Vec<String>>,
    pub fail_next: AtomicUsize,
    pub documents: Mutex<Vec<String>>,
    pub released: AtomicUsize,
}

#[derive(Default)]
pub struct CountingIndexBuilder {
    pub calls: AtomicUsize,
    pub fail_next: AtomicUsize,
    pub log: Arc<EngineLog>,
}

struct LoggingEngine {
    log: Arc<EngineLog>,
}

#[async_trait]
impl QueryEngine for LoggingEngine {
    async fn ask(&self, question: &str) -> Result<String, QaError> {
        self.log.asked.lock().unwrap().push(question.to_string());
        if take_failure(&self.log.fail_next) {
            return Err(QaError::Query("simulated remote failure".to_string()));
        }
        let documents = self.log.documents.lock().unwrap();
        Ok(format!("Answer to '{}' from {}", question, documents.join(",")))
    }

    async fn release(&self) -> Result<(), QaError> {
        self.log.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl IndexBuilder for CountingIndexBuilder {
    async fn build(
        &self,
        _model: Arc<dyn LanguageModel>,
        document: &Document,
    ) -> Result<Box<dyn QueryEngine>, QaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_next) {
            return Err(QaError::Build("simulated embedding failure".to_string()));
        }
        self.log
            .documents
            .lock()
            .unwrap()
            .push(document.content.clone());
        Ok(Box::new(LoggingEngine {
            log: self.log.clone(),
        }))
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// A controller wired to counting fakes, with handles to inspect them
pub struct Harness {
    pub loader: Arc<CountingLoader>,
    pub model_client: Arc<CountingModelClient>,
    pub index_builder: Arc<CountingIndexBuilder>,
    pub controller: SessionController,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_api_key(Some("test-key"))
    }

    pub fn with_api_key(api_key: Option<&str>) -> Self {
        let loader = Arc::new(CountingLoader::default());
        let model_client = Arc::new(CountingModelClient::default());
        let index_builder = Arc::new(CountingIndexBuilder::default());
        let controller = SessionController::new(
            loader.clone(),
            model_client.clone(),
            index_builder.clone(),
            api_key.map(str::to_string),
        );
        Harness {
            loader,
            model_client,
            index_builder,
            controller,
        }
    }

    pub fn loads(&self) -> usize {
        self.loader.calls.load(Ordering::SeqCst)
    }

    pub fn builds(&self) -> usize {
        self.index_builder.calls.load(Ordering::SeqCst)
    }

    pub fn model_creates(&self) -> usize {
        self.model_client.calls.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.index_builder.log.released.load(Ordering::SeqCst)
    }

    pub fn asked(&self) -> Vec<String> {
        self.index_builder.log.asked.lock().unwrap().clone()
    }
}

/// A controller that really indexes uploads into `store`
pub fn indexing_controller(store: Arc<InMemoryStore>) -> SessionController {
    SessionController::new(
        Arc::new(CountingLoader::default()),
        Arc::new(CountingModelClient::default()),
        Arc::new(VectorIndexBuilder::new(store, ChunkingConfig::default(), 2)),
        Some("test-key".to_string()),
    )
}

pub fn notes() -> UploadedFile {
    UploadedFile::new("notes.txt", "The sky is blue.")
}
