use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use log::{debug, info};
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::page::{render_not_found, render_session};
use super::sessions::{FlashLevel, WebSession};
use super::AppState;
use crate::document::UploadedFile;
use crate::error::QaError;

/// Handler failures that are not session errors; those are flashed instead
pub(super) enum WebError {
    NotFound,
    BadRequest(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::NotFound => (StatusCode::NOT_FOUND, Html(render_not_found())).into_response(),
            WebError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        }
    }
}

type WebResult<T> = Result<T, WebError>;

async fn lookup(state: &AppState, id: &str) -> WebResult<(Uuid, Arc<Mutex<WebSession>>)> {
    let id: Uuid = id.parse().map_err(|_| WebError::NotFound)?;
    let web = state.sessions.get(&id).await.ok_or(WebError::NotFound)?;
    Ok((id, web))
}

fn session_url(id: &Uuid) -> String {
    format!("/s/{}", id)
}

fn flash_level(err: &QaError) -> FlashLevel {
    match err {
        QaError::NoDocument | QaError::EmptyQuestion => FlashLevel::Warning,
        _ => FlashLevel::Error,
    }
}

pub(super) async fn health() -> &'static str {
    "ok"
}

pub(super) async fn new_session(State(state): State<AppState>) -> Redirect {
    let id = state.sessions.create().await;
    Redirect::to(&session_url(&id))
}

pub(super) async fn show_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Html<String>> {
    let (id, web) = lookup(&state, &id).await?;
    let mut web = web.lock().await;
    web.touch();

    let flashes = web.take_flashes();
    Ok(Html(render_session(&id, &web, &flashes)))
}

pub(super) async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> WebResult<Redirect> {
    let (id, web) = lookup(&state, &id).await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| WebError::BadRequest(format!("Malformed upload: {}", e)))?;

        if !file_name.is_empty() {
            upload = Some(UploadedFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        }
    }

    let mut web = web.lock().await;
    web.touch();
    match upload {
        Some(file) => {
            info!("Session {} uploaded {} ({} bytes)", id, file.file_name, file.bytes.len());
            if let Some(active) = web.session.document() {
                let message = format!(
                    "{} was uploaded, but this session keeps answering from {}. End the session to switch documents.",
                    file.file_name, active.file_name
                );
                web.flash(FlashLevel::Warning, message);
            } else {
                web.flash(FlashLevel::Info, format!("Uploaded {}", file.file_name));
            }
            web.upload = Some(file);
        }
        None => web.flash(FlashLevel::Warning, "Choose a file to upload"),
    }

    Ok(Redirect::to(&session_url(&id)))
}

pub(super) async fn add_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Redirect> {
    let (id, web) = lookup(&state, &id).await?;
    let mut web = web.lock().await;
    web.touch();

    let index = state.controller.add_question(&mut web.session);
    debug!("Session {} added question {}", id, index + 1);

    Ok(Redirect::to(&format!("{}#q{}", session_url(&id), index)))
}

#[derive(Deserialize)]
pub(super) struct QuestionForm {
    #[serde(default)]
    question: String,
}

pub(super) async fn submit_question(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    Form(form): Form<QuestionForm>,
) -> WebResult<Redirect> {
    let (id, web) = lookup(&state, &id).await?;
    let mut guard = web.lock().await;
    guard.touch();

    let web = &mut *guard;
    let outcome = match state
        .controller
        .edit_question(&mut web.session, index, form.question)
    {
        Ok(()) => {
            state
                .controller
                .submit_question(&mut web.session, web.upload.as_ref(), index)
                .await
        }
        // Without a document that is the problem worth reporting
        Err(_) if web.upload.is_none() => Err(QaError::NoDocument),
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        web.flash(flash_level(&e), e.to_string());
    }

    Ok(Redirect::to(&format!("{}#q{}", session_url(&id), index)))
}

pub(super) async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Redirect> {
    let id: Uuid = id.parse().map_err(|_| WebError::NotFound)?;
    if !state.close_session(&id).await {
        return Err(WebError::NotFound);
    }
    Ok(Redirect::to("/"))
}
