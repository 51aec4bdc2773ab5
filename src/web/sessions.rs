use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::document::UploadedFile;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Info,
    Warning,
    Error,
}

/// A one-shot message shown on the next page render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Browser-side state wrapped around a [`Session`]: the file currently
/// selected for upload and messages waiting to be shown
pub struct WebSession {
    pub session: Session,
    pub upload: Option<UploadedFile>,
    flashes: Vec<Flash>,
    last_active: Instant,
}

impl WebSession {
    fn new() -> Self {
        WebSession {
            session: Session::new(),
            upload: None,
            flashes: Vec::new(),
            last_active: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn flash(&mut self, level: FlashLevel, message: impl Into<String>) {
        self.flashes.push(Flash {
            level,
            message: message.into(),
        });
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.flashes)
    }
}

/// All live sessions. Each session sits behind its own mutex, so operations
/// on one session run one at a time while other sessions proceed.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<WebSession>>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(Mutex::new(WebSession::new())));
        info!("Created session {} ({} active)", id, sessions.len());
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<WebSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Unregister a session and hand it back for cleanup
    pub async fn remove(&self, id: &Uuid) -> Option<Arc<Mutex<WebSession>>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id);
        if removed.is_some() {
            info!("Closed session {}", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Unregister sessions idle for longer than the TTL and hand them back
    /// for cleanup. Sessions busy with a request are never expired.
    pub async fn purge_expired(&self) -> Vec<Arc<Mutex<WebSession>>> {
        let mut sessions = self.sessions.write().await;

        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, session)| match session.try_lock() {
                Ok(guard) => guard.last_active.elapsed() >= self.ttl,
                Err(_) => false,
            })
            .map(|(id, _)| *id)
            .collect();
        let purged: Vec<Arc<Mutex<WebSession>>> = expired
            .iter()
            .filter_map(|id| sessions.remove(id))
            .collect();

        if !purged.is_empty() {
            info!("Expired {} idle sessions ({} active)", purged.len(), sessions.len());
        }
        purged
    }
}
