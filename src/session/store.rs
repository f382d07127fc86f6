//! In-memory session records

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{Session, SessionId};

/// Session records keyed by id. Closed sessions stay queryable.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
    }

    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Replace an existing record. Returns false if the id is unknown.
    pub async fn update(&self, session: Session) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session;
                true
            }
            None => false,
        }
    }

    /// The connected session, if any
    pub async fn active(&self) -> Option<Session> {
        self.sessions
            .read()
            .await
            .values()
            .find(|s| s.connected)
            .cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.connected)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
