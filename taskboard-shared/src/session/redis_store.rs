/// Redis-backed session store
///
/// # Key Layout
///
/// ```text
/// {prefix}{session_id}       →  JSON SessionRecord          (EX ttl)
/// {prefix}user:{user_id}     →  SET of the user's session ids (EX ttl, refreshed on create)
/// ```
///
/// `session_id` is the SHA-256 digest of the token, so a Redis dump never
/// contains usable tokens. Updates use `SET ... XX KEEPTTL`: the write only
/// lands if the key still exists and the original expiry is preserved.
///
/// Listing reads the user's index set instead of scanning the keyspace.
/// Sessions that expired on their own are still in the set; listing drops
/// them from it.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::redis::{RedisClient, RedisConfig};
/// use taskboard_shared::session::{RedisSessionStore, SessionRecord, SessionStore};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RedisClient::new(RedisConfig::from_url("redis://localhost:6379")).await?;
/// let store = RedisSessionStore::new(client, "sessions:", 7 * 24 * 3600);
///
/// let token = store.create(SessionRecord::new(Uuid::new_v4(), None)).await?;
/// let record = store.read(&token).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    SessionError, SessionMutator, SessionRecord, SessionStore, SessionSummary, SessionToken,
};
use crate::redis::RedisClient;

fn session_key(prefix: &str, session_id: &str) -> String {
    format!("{}{}", prefix, session_id)
}

fn user_index_key(prefix: &str, user_id: Uuid) -> String {
    format!("{}user:{}", prefix, user_id)
}

pub struct RedisSessionStore {
    client: RedisClient,
    prefix: String,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(client: RedisClient, prefix: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            ttl_secs,
        }
    }

    fn key(&self, session_id: &str) -> String {
        session_key(&self.prefix, session_id)
    }

    fn user_key(&self, user_id: Uuid) -> String {
        user_index_key(&self.prefix, user_id)
    }

    /// Deletes one session and its index entry
    async fn remove(&self, user_id: Uuid, session_id: &str) -> Result<bool, SessionError> {
        let mut conn = self.client.get_connection();
        let (removed,): (u64,) = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(self.key(session_id))
            .cmd("SREM")
            .arg(self.user_key(user_id))
            .arg(session_id)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn get_record(&self, key: &str) -> Result<Option<SessionRecord>, SessionError> {
        let mut conn = self.client.get_connection();
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, record: SessionRecord) -> Result<SessionToken, SessionError> {
        let token = SessionToken::generate();
        let session_id = token.session_id();
        let user_key = self.user_key(record.user_id);
        let json = serde_json::to_string(&record)?;
        let mut conn = self.client.get_connection();

        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(self.key(&session_id))
            .arg(json)
            .arg("EX")
            .arg(self.ttl_secs)
            .ignore()
            .cmd("SADD")
            .arg(&user_key)
            .arg(&session_id)
            .ignore()
            .cmd("EXPIRE")
            .arg(&user_key)
            .arg(self.ttl_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        tracing::debug!(user_id = %record.user_id, "Session created");
        Ok(token)
    }

    async fn read(&self, token: &SessionToken) -> Result<SessionRecord, SessionError> {
        self.get_record(&self.key(&token.session_id()))
            .await?
            .ok_or(SessionError::NotFound)
    }

    async fn update(
        &self,
        token: &SessionToken,
        mutate: SessionMutator,
    ) -> Result<SessionRecord, SessionError> {
        let key = self.key(&token.session_id());
        let mut record = self.get_record(&key).await?.ok_or(SessionError::NotFound)?;
        mutate(&mut record);

        let json = serde_json::to_string(&record)?;
        let mut conn = self.client.get_connection();
        let written: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await?;

        // nil reply: the key expired between GET and SET
        match written {
            Some(_) => Ok(record),
            None => Err(SessionError::NotFound),
        }
    }

    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionError> {
        let session_id = token.session_id();
        // The record names the user whose index holds this session
        if let Some(record) = self.get_record(&self.key(&session_id)).await? {
            self.remove(record.user_id, &session_id).await?;
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SessionSummary>, SessionError> {
        let user_key = self.user_key(user_id);
        let mut conn = self.client.get_connection();

        let ids: Vec<String> = redis::cmd("SMEMBERS").arg(&user_key).query_async(&mut conn).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut sessions = Vec::new();
        let mut expired = Vec::new();
        for (id, value) in ids.into_iter().zip(values) {
            let Some(json) = value else {
                expired.push(id);
                continue;
            };
            match serde_json::from_str::<SessionRecord>(&json) {
                Ok(record) if record.user_id == user_id => {
                    sessions.push(SessionSummary::new(id, &record));
                }
                Ok(_) => expired.push(id),
                Err(e) => tracing::warn!(session_id = %id, error = %e, "Skipping unreadable session"),
            }
        }

        if !expired.is_empty() {
            redis::cmd("SREM")
                .arg(&user_key)
                .arg(&expired)
                .query_async::<_, ()>(&mut conn)
                .await?;
        }

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn destroy_by_id(&self, user_id: Uuid, session_id: &str) -> Result<bool, SessionError> {
        match self.get_record(&self.key(session_id)).await? {
            Some(record) if record.user_id == user_id => self.remove(user_id, session_id).await,
            _ => Ok(false),
        }
    }
}
