//! One-document, many-question interaction.
//!
//! A [`Session`] is plain state owned by whoever drives the interaction (the
//! web layer keeps one per browser session). [`SessionController`] holds the
//! collaborators and mutates a session passed in by reference, so the
//! controller itself is shared across all sessions.
//!
//! The document and query engine are built lazily on the first successful
//! submission and then reused for every later question.

use crate::document::{Document, DocumentLoader, UploadedFile};
use crate::error::QaError;
use crate::index::{IndexBuilder, QueryEngine};
use crate::model::ModelClient;
use log::{error, info, warn};
use std::sync::Arc;

/// Per-interaction state: the loaded document, its query engine and the
/// question/answer history
#[derive(Default)]
pub struct Session {
    document: Option<Document>,
    query_engine: Option<Box<dyn QueryEngine>>,
    questions: Vec<String>,
    /// Index-aligned with `questions`, never longer
    responses: Vec<Option<String>>,
}

/// A question displayed next to its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QaPair<'a> {
    pub index: usize,
    pub question: &'a str,
    pub answer: &'a str,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn has_query_engine(&self) -> bool {
        self.query_engine.is_some()
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Number of response slots; unanswered slots below an answered index count
    pub fn responses_len(&self) -> usize {
        self.responses.len()
    }

    pub fn response(&self, index: usize) -> Option<&str> {
        self.responses.get(index).and_then(|r| r.as_deref())
    }

    /// Answered questions in ascending index order
    pub fn render(&self) -> Vec<QaPair<'_>> {
        self.questions
            .iter()
            .enumerate()
            .filter_map(|(index, question)| {
                self.response(index).map(|answer| QaPair {
                    index,
                    question,
                    answer,
                })
            })
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<(), QaError> {
        if index < self.questions.len() {
            Ok(())
        } else {
            Err(QaError::QuestionIndex {
                index,
                len: self.questions.len(),
            })
        }
    }

    fn store_response(&mut self, index: usize, answer: String) {
        if self.responses.len() <= index {
            self.responses.resize(index + 1, None);
        }
        self.responses[index] = Some(answer);
    }
}

/// Coordinates document loading, index building and querying for sessions
pub struct SessionController {
    loader: Arc<dyn DocumentLoader>,
    model_client: Arc<dyn ModelClient>,
    index_builder: Arc<dyn IndexBuilder>,
    api_key: Option<String>,
}

impl SessionController {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        model_client: Arc<dyn ModelClient>,
        index_builder: Arc<dyn IndexBuilder>,
        api_key: Option<String>,
    ) -> Self {
        SessionController {
            loader,
            model_client,
            index_builder,
            api_key,
        }
    }

    /// Append an empty question slot
    pub fn add_question(&self, session: &mut Session) -> usize {
        session.questions.push(String::new());
        session.questions.len() - 1
    }

    /// Overwrite the text of an existing question; any stored answer is kept
    /// until the question is submitted again
    pub fn edit_question(
        &self,
        session: &mut Session,
        index: usize,
        text: impl Into<String>,
    ) -> Result<(), QaError> {
        session.check_index(index)?;
        session.questions[index] = text.into();
        Ok(())
    }

    /// Answer the question at `index`, loading the document and building the
    /// index first if this session has not done so yet.
    ///
    /// Whatever succeeded before a failure stays cached, so a retry only
    /// repeats the steps that have not completed.
    pub async fn submit_question(
        &self,
        session: &mut Session,
        upload: Option<&UploadedFile>,
        index: usize,
    ) -> Result<String, QaError> {
        let result = self.try_submit(session, upload, index).await;
        match &result {
            Err(e) if e.is_configuration() => error!("Question {} failed: {}", index + 1, e),
            Err(e) => warn!("Question {} failed: {}", index + 1, e),
            Ok(_) => {}
        }
        result
    }

    async fn try_submit(
        &self,
        session: &mut Session,
        upload: Option<&UploadedFile>,
        index: usize,
    ) -> Result<String, QaError> {
        let upload = upload.ok_or(QaError::NoDocument)?;
        session.check_index(index)?;
        let question = session.questions[index].trim().to_string();
        if question.is_empty() {
            return Err(QaError::EmptyQuestion);
        }

        if session.document.is_none() {
            let document = self.loader.load(upload).await?;
            session.document = Some(document);
        }

        if session.query_engine.is_none() {
            let model = self.model_client.create(self.api_key.as_deref())?;
            let document = session.document.as_ref().ok_or(QaError::NoDocument)?;
            let engine = self.index_builder.build(model, document).await?;
            session.query_engine = Some(engine);
        }

        let engine = session.query_engine.as_ref().ok_or_else(|| {
            QaError::Build("query engine missing after build".to_string())
        })?;
        let answer = engine.ask(&question).await?;

        info!("Answered question {}", index + 1);
        session.store_response(index, answer.clone());
        Ok(answer)
    }

    /// Discard a session, releasing its index. Release failures are logged
    /// and otherwise ignored.
    pub async fn end_session(&self, session: Session) {
        if let Some(engine) = session.query_engine {
            if let Err(e) = engine.release().await {
                warn!("Failed to release index: {}", e);
            }
        }
    }
}
