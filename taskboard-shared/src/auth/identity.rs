/// Identity resolution
///
/// Turns a session token into the authenticated [`User`]. User rows are read
/// through a [`UserCache`]; a cached user may outlive its deletion by at most
/// the cache TTL. When the store reports the session's user as missing, the
/// session is destroyed so the dangling token cannot be replayed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use super::guard::GuardError;
use crate::models::user::User;
use crate::session::{SessionRecord, SessionStore, SessionToken};
use crate::store::Directory;

/// Read-through cache of user rows keyed by user id
///
/// Stale entries are swept on insert, so the cache holds at most the users
/// seen within one TTL.
pub struct UserCache {
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, (User, Instant)>>,
}

impl UserCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, user_id: Uuid) -> Option<User> {
        let entries = self.entries.read().await;
        entries
            .get(&user_id)
            .filter(|(_, cached_at)| cached_at.elapsed() < self.ttl)
            .map(|(user, _)| user.clone())
    }

    pub async fn insert(&self, user: User) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, cached_at)| cached_at.elapsed() < self.ttl);
        entries.insert(user.id, (user, Instant::now()));
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        self.entries.write().await.remove(&user_id);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Authenticated caller
pub struct Identity {
    pub user: User,
    pub token: SessionToken,
    pub session: SessionRecord,
}

pub struct IdentityResolver {
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn Directory>,
    cache: UserCache,
}

impl IdentityResolver {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn Directory>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            sessions,
            directory,
            cache: UserCache::new(cache_ttl),
        }
    }

    /// Resolves the session's user
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the session is missing or expired, or if its
    ///   user no longer exists (the session is destroyed in that case)
    /// - `Session` / `Store` on backend failures
    pub async fn resolve(&self, token: &SessionToken) -> Result<Identity, GuardError> {
        let session = self.sessions.read(token).await?;

        if let Some(user) = self.cache.get(session.user_id).await {
            return Ok(Identity {
                user,
                token: token.clone(),
                session,
            });
        }

        match self.directory.find_user(session.user_id).await? {
            Some(user) => {
                self.cache.insert(user.clone()).await;
                Ok(Identity {
                    user,
                    token: token.clone(),
                    session,
                })
            }
            None => {
                tracing::warn!(user_id = %session.user_id, "Session references a missing user, destroying it");
                self.cache.invalidate(session.user_id).await;
                if let Err(e) = self.sessions.destroy(token).await {
                    tracing::warn!(error = %e, "Failed to destroy orphaned session");
                }
                Err(GuardError::Unauthenticated)
            }
        }
    }
}
