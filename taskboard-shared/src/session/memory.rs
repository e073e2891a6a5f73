/// In-process session store
///
/// Keeps sessions in a map with a deadline per entry. Deadlines use
/// `tokio::time::Instant`, so tests can expire sessions with a paused clock.
/// Expired entries are dropped when read, and swept on every create so the
/// map stays bounded by the sessions alive within one TTL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use super::{
    SessionError, SessionMutator, SessionRecord, SessionStore, SessionSummary, SessionToken,
};

struct Entry {
    record: SessionRecord,
    expires_at: Instant,
}

pub struct MemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, record: SessionRecord) -> Result<SessionToken, SessionError> {
        let token = SessionToken::generate();
        let now = Instant::now();
        let entry = Entry {
            record,
            expires_at: now + self.ttl,
        };

        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(token.session_id(), entry);
        Ok(token)
    }

    async fn read(&self, token: &SessionToken) -> Result<SessionRecord, SessionError> {
        let id = token.session_id();
        let mut entries = self.entries.lock().await;

        match entries.get(&id) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(entry.record.clone()),
            Some(_) => {
                entries.remove(&id);
                Err(SessionError::NotFound)
            }
            None => Err(SessionError::NotFound),
        }
    }

    async fn update(
        &self,
        token: &SessionToken,
        mutate: SessionMutator,
    ) -> Result<SessionRecord, SessionError> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&token.session_id()) {
            Some(entry) if entry.expires_at > Instant::now() => {
                mutate(&mut entry.record);
                Ok(entry.record.clone())
            }
            _ => Err(SessionError::NotFound),
        }
    }

    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionError> {
        self.entries.lock().await.remove(&token.session_id());
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SessionSummary>, SessionError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;

        let mut sessions: Vec<SessionSummary> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at > now && entry.record.user_id == user_id)
            .map(|(id, entry)| SessionSummary::new(id.clone(), &entry.record))
            .collect();

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn destroy_by_id(&self, user_id: Uuid, session_id: &str) -> Result<bool, SessionError> {
        let mut entries = self.entries.lock().await;
        let owned = entries
            .get(session_id)
            .map(|entry| entry.record.user_id == user_id && entry.expires_at > Instant::now())
            .unwrap_or(false);

        if owned {
            entries.remove(session_id);
        }
        Ok(owned)
    }
}
