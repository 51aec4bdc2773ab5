//! Single-page web UI.
//!
//! | Method | Path | Action |
//! |--------|------|--------|
//! | `GET`  | `/` | start a session, redirect to it |
//! | `GET`  | `/s/:id` | render the session page |
//! | `POST` | `/s/:id/upload` | select the document (multipart field `file`) |
//! | `POST` | `/s/:id/questions` | add an empty question |
//! | `POST` | `/s/:id/questions/:index` | save and submit a question (form field `question`) |
//! | `POST` | `/s/:id/close` | end the session |
//! | `GET`  | `/health` | liveness check |
//!
//! Every POST answers with a 303 redirect back to the session page, which
//! shows the outcome as flash messages.

mod handlers;
pub mod page;
pub mod sessions;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use log::info;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::session::SessionController;
use sessions::{SessionRegistry, WebSession};

/// Largest accepted upload
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(controller: SessionController, session_ttl: Duration) -> Self {
        AppState {
            controller: Arc::new(controller),
            sessions: Arc::new(SessionRegistry::new(session_ttl)),
        }
    }

    /// End a session and release its index; false if it was not live
    pub async fn close_session(&self, id: &Uuid) -> bool {
        match self.sessions.remove(id).await {
            Some(web) => {
                self.release(web).await;
                true
            }
            None => false,
        }
    }

    /// End every idle session; returns how many were ended
    pub async fn purge_expired(&self) -> usize {
        let expired = self.sessions.purge_expired().await;
        let count = expired.len();
        for web in expired {
            self.release(web).await;
        }
        count
    }

    async fn release(&self, web: Arc<Mutex<WebSession>>) {
        // Waits out any request still holding the session
        let session = std::mem::take(&mut web.lock().await.session);
        self.controller.end_session(session).await;
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::new_session))
        .route("/health", get(handlers::health))
        .route("/s/:id", get(handlers::show_session))
        .route("/s/:id/upload", post(handlers::upload_document))
        .route("/s/:id/questions", post(handlers::add_question))
        .route("/s/:id/questions/:index", post(handlers::submit_question))
        .route("/s/:id/close", post(handlers::close_session))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the UI until the process is terminated
pub async fn run_server(bind: &str, state: AppState) -> Result<()> {
    let sweeper = spawn_session_sweeper(state.clone());

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);

    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served.context("Server error")
}

/// Periodically drop idle sessions
fn spawn_session_sweeper(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            state.purge_expired().await;
        }
    })
}
