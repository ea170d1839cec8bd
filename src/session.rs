//! Per-conversation session state.
//!
//! Each conversation owns a `SessionContext` with a typed credential cache.
//! Sessions never share credentials; the store only maps ids to contexts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Session-scoped cache of resolved credentials.
///
/// Holds only concrete secret values; an unresolved placeholder is never
/// written here. The flight map serializes concurrent resolutions of the
/// same placeholder name so a credential is prompted for at most once at a
/// time per session.
#[derive(Default)]
pub struct CredentialCache {
    resolved: Mutex<HashMap<String, String>>,
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CredentialCache {
    pub async fn get(&self, name: &str) -> Option<String> {
        self.resolved.lock().await.get(name).cloned()
    }

    pub async fn insert(&self, name: &str, value: String) {
        self.resolved.lock().await.insert(name.to_string(), value);
    }

    /// The single-flight guard for one placeholder name.
    pub async fn flight(&self, name: &str) -> Arc<Mutex<()>> {
        self.flights
            .lock()
            .await
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

/// Typed per-session context passed into each turn handler.
pub struct SessionContext {
    pub id: Uuid,
    pub credentials: CredentialCache,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            credentials: CredentialCache::default(),
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory store of live sessions, keyed by id.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionContext>>>,
}

impl SessionStore {
    /// Create and register a fresh session.
    pub async fn create(&self) -> Arc<SessionContext> {
        let session = Arc::new(SessionContext::new());
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionContext>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Look up an existing session or create a new one.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> Arc<SessionContext> {
        if let Some(id) = id {
            if let Some(session) = self.get(id).await {
                return session;
            }
        }
        self.create().await
    }

    pub async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }
}
