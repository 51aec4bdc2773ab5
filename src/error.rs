use thiserror::Error;

/// Errors surfaced to the user by a question/answer session.
///
/// The `Display` text of each variant is what the page shows in its
/// flash area, so messages are written for the person asking questions.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("Please upload a document first")]
    NoDocument,

    #[error("Please enter a question")]
    EmptyQuestion,

    #[error("Question {} does not exist (session has {} questions)", .index + 1, .len)]
    QuestionIndex { index: usize, len: usize },

    #[error("Failed to load document: {0}")]
    Load(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Failed to build the document index: {0}")]
    Build(String),

    #[error("Failed to answer the question: {0}")]
    Query(String),
}

/// Raised inside an `anyhow` chain when the model service rejects the API key.
#[derive(Debug, Error)]
#[error("model service rejected the API key ({status})")]
pub struct AuthRejected {
    pub status: u16,
}

impl QaError {
    /// Classify a failure from the index-building step.
    pub fn from_build(err: anyhow::Error) -> Self {
        match err.downcast_ref::<AuthRejected>() {
            Some(rejected) => QaError::Auth(rejected.to_string()),
            None => QaError::Build(format!("{:#}", err)),
        }
    }

    /// Classify a failure from the query step.
    pub fn from_query(err: anyhow::Error) -> Self {
        match err.downcast_ref::<AuthRejected>() {
            Some(rejected) => QaError::Auth(rejected.to_string()),
            None => QaError::Query(format!("{:#}", err)),
        }
    }

    /// Whether retrying without operator action can ever succeed.
    pub fn is_configuration(&self) -> bool {
        matches!(self, QaError::Config(_) | QaError::Auth(_))
    }
}
