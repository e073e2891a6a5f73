/// Session store
///
/// Sessions map an opaque [`SessionToken`] to a [`SessionRecord`]: the user,
/// the project the user is currently working in, and request metadata. The
/// store is the trust anchor for identity, so anything it cannot find (expired,
/// destroyed or never created) is reported the same way, as
/// [`SessionError::NotFound`].
///
/// # Backends
///
/// - [`redis_store::RedisSessionStore`]: shared across API instances, TTL
///   enforced by Redis
/// - [`memory::MemorySessionStore`]: single process, used by tests and local
///   development
///
/// # Concurrency
///
/// `update` is a read-modify-write without compare-and-swap. Two concurrent
/// updates of the same session resolve last-writer-wins; the only mutation in
/// practice is switching the active project, where that is acceptable.

pub mod memory;
pub mod redis_store;
pub mod token;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;
pub use token::SessionToken;

/// Session store errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// No live session for the token
    #[error("Session not found")]
    NotFound,

    #[error("Session backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("Session payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// State stored for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Uuid,

    /// Active tenant; set by selecting a project
    pub project_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl SessionRecord {
    pub fn new(user_id: Uuid, user_agent: Option<String>) -> Self {
        Self {
            user_id,
            project_id: None,
            created_at: Utc::now(),
            user_agent,
        }
    }
}

/// A session as shown in the user's session list
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Digest of the token, never the token itself
    pub id: String,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub user_agent: Option<String>,
}

impl SessionSummary {
    pub fn new(id: String, record: &SessionRecord) -> Self {
        Self {
            id,
            project_id: record.project_id,
            created_at: record.created_at,
            user_agent: record.user_agent.clone(),
        }
    }
}

/// Mutation applied by [`SessionStore::update`]
pub type SessionMutator = Box<dyn FnOnce(&mut SessionRecord) + Send>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a record under a freshly generated token
    async fn create(&self, record: SessionRecord) -> Result<SessionToken, SessionError>;

    /// Returns the record, or `NotFound` if missing or expired
    async fn read(&self, token: &SessionToken) -> Result<SessionRecord, SessionError>;

    /// Applies `mutate` to the stored record without extending its TTL
    async fn update(
        &self,
        token: &SessionToken,
        mutate: SessionMutator,
    ) -> Result<SessionRecord, SessionError>;

    /// Removes the session; destroying a missing session is not an error
    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionError>;

    /// Live sessions of a user
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SessionSummary>, SessionError>;

    /// Removes a session by its public id if it belongs to `user_id`
    ///
    /// Returns `false` when no such session exists for that user.
    async fn destroy_by_id(&self, user_id: Uuid, session_id: &str) -> Result<bool, SessionError>;
}
