//! In-memory session store
//!
//! Process-lifetime map from session id to session state. Each session
//! sits behind its own `tokio::sync::Mutex`, so concurrent turns against
//! the same id apply in arrival order while turns on different sessions
//! proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::Session;

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly opened session, returning its id.
    pub async fn insert(&self, session: Session) -> Uuid {
        let id = session.id;
        self.inner
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drop sessions idle longer than `ttl`. A session whose mutex is
    /// held has a turn in flight and is left alone regardless of its
    /// timestamp. Returns the number of evicted sessions.
    pub async fn evict_idle(&self, ttl: chrono::Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.last_active_at >= cutoff,
            Err(_) => true,
        });
        before - map.len()
    }
}
