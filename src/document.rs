use crate::error::QaError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text_from_mem;
use uuid::Uuid;

/// A file as received from the upload form, before any parsing
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original file name reported by the browser
    pub file_name: String,
    /// Content type declared by the browser, if any
    pub content_type: Option<String>,
    /// Raw file bytes
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        UploadedFile {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// Identifier assigned at load time, used to name the index collection
    pub id: Uuid,
    /// The uploaded file name
    pub file_name: String,
    /// The document's MIME type
    pub mime_type: String,
    /// The extracted text content of the document
    pub content: String,
}

/// Turns an uploaded file into a [`Document`]
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, upload: &UploadedFile) -> Result<Document, QaError>;
}

/// Loads PDF and plain text uploads
#[derive(Debug, Default, Clone)]
pub struct FileDocumentLoader;

impl FileDocumentLoader {
    pub fn new() -> Self {
        FileDocumentLoader
    }
}

#[async_trait]
impl DocumentLoader for FileDocumentLoader {
    async fn load(&self, upload: &UploadedFile) -> Result<Document, QaError> {
        info!(
            "Loading document {} ({} bytes)",
            upload.file_name,
            upload.bytes.len()
        );

        let mime_type = detect_mime_type(upload);
        debug!("Detected MIME type: {}", mime_type);

        // PDF extraction is CPU bound
        let bytes = upload.bytes.clone();
        let mime = mime_type.clone();
        let content = tokio::task::spawn_blocking(move || read_document_content(&bytes, &mime))
            .await
            .map_err(|e| QaError::Load(format!("document parser crashed: {}", e)))?
            .map_err(|e| QaError::Load(format!("{:#}", e)))?;

        if content.trim().is_empty() {
            return Err(QaError::Load(format!(
                "{} contains no extractable text",
                upload.file_name
            )));
        }

        info!(
            "Loaded {} as {} ({} characters)",
            upload.file_name,
            mime_type,
            content.len()
        );

        Ok(Document {
            id: Uuid::new_v4(),
            file_name: upload.file_name.clone(),
            mime_type,
            content,
        })
    }
}

/// Prefer the declared content type when it is one we handle, otherwise
/// guess from the file name
fn detect_mime_type(upload: &UploadedFile) -> String {
    match upload.content_type.as_deref() {
        Some(declared) if declared.starts_with("application/pdf") || declared.starts_with("text/") => {
            declared.to_string()
        }
        _ => from_path(&upload.file_name).first_or_octet_stream().to_string(),
    }
}

/// Read content from document bytes based on its MIME type
pub fn read_document_content(bytes: &[u8], mime_type: &str) -> Result<String> {
    match mime_type {
        // Handle PDF documents
        mime if mime.starts_with("application/pdf") => {
            let content =
                extract_text_from_mem(bytes).context("Failed to extract text from PDF")?;

            // PDF extraction can sometimes include excessive whitespace
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        // Handle plain text documents
        mime if mime.starts_with("text/") => {
            let content =
                String::from_utf8(bytes.to_vec()).context("Text file is not valid UTF-8")?;
            Ok(content)
        }

        // Unsupported format
        _ => Err(anyhow::anyhow!(
            "Unsupported document format: {}. Only text and PDF files are supported.",
            mime_type
        )),
    }
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
            continue;
        }

        if newline_count > 0 {
            normalized.push_str(if newline_count >= 2 { "\n\n" } else { "\n" });
            newline_count = 0;
        }

        // Don't add consecutive spaces
        if !(c == ' ' && prev_char == ' ') {
            normalized.push(c);
        }
        prev_char = c;
    }

    normalized.trim().to_string()
}
