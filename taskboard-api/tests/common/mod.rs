//! Common test utilities for integration tests
//!
//! Builds the full router over the in-memory backends, so every test runs
//! the real guard chain, ordering engine and handlers without Postgres or
//! Redis:
//! - Test user and project creation straight through the stores
//! - Session cookies minted directly in the session store
//! - A JSON request helper

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::{ApiConfig, CacheConfig, Config, DatabaseConfig, RedisSettings, SessionConfig};
use taskboard_shared::events::LocalHub;
use taskboard_shared::models::invitation::Invitation;
use taskboard_shared::models::membership::MemberRole;
use taskboard_shared::models::project::{CreateProject, Project};
use taskboard_shared::models::user::{CreateUser, User};
use taskboard_shared::notify::LogNotifier;
use taskboard_shared::session::{MemorySessionStore, SessionRecord, SessionStore, SessionToken};
use taskboard_shared::store::{AccountStore, MemoryStore, ProjectStore};
use tower::Service as _;
use uuid::Uuid;

/// Session lifetime used by every test context
pub const SESSION_TTL: Duration = Duration::from_secs(3600);

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub hub: LocalHub,
}

impl TestContext {
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new(SESSION_TTL));
        let hub = LocalHub::default();

        let state = AppState::new(
            config.clone(),
            store.clone(),
            sessions.clone(),
            Arc::new(hub.clone()),
            hub.clone(),
            Arc::new(LogNotifier),
        );

        Self {
            app: build_router(state),
            config,
            store,
            sessions,
            hub,
        }
    }

    /// Creates a user whose password hash is a placeholder
    ///
    /// Use the register endpoint for users that need to log in.
    pub async fn create_user(&self, name: &str) -> User {
        let unique = Uuid::new_v4().simple().to_string();
        self.store
            .create_user(CreateUser {
                email: format!("{}-{}@example.com", name, &unique[..8]),
                username: format!("{}-{}", name, &unique[..8]),
                password_hash: "not-a-real-hash".to_string(),
            })
            .await
            .unwrap()
    }

    /// Starts a session for `user` and returns its `Cookie` header value
    pub async fn sign_in(&self, user: &User) -> String {
        let token = self
            .sessions
            .create(SessionRecord::new(user.id, Some("integration-test".to_string())))
            .await
            .unwrap();
        self.cookie(&token)
    }

    pub fn cookie(&self, token: &SessionToken) -> String {
        format!("{}={}", self.config.session.cookie_name, token.as_str())
    }

    /// A signed-in user
    pub async fn user_with_session(&self, name: &str) -> (User, String) {
        let user = self.create_user(name).await;
        let cookie = self.sign_in(&user).await;
        (user, cookie)
    }

    /// Creates a project with `owner` as its admin
    pub async fn create_project(&self, owner: &User, name: &str) -> Project {
        self.store
            .create_project_with_admin(
                owner.id,
                &CreateProject {
                    name: name.to_string(),
                    icon: None,
                    description: None,
                },
            )
            .await
            .unwrap()
    }

    /// Adds `user` to the project through an accepted invitation
    pub async fn add_member(&self, project_id: Uuid, user: &User, role: MemberRole) {
        let invitation = Invitation::issue(project_id, &user.email, role);
        self.store.save_invitation(&invitation).await.unwrap();
        self.store
            .accept_invitation(&invitation.token, user.id)
            .await
            .unwrap()
            .unwrap();
    }

    /// Sends a request through the router
    ///
    /// Returns the status and the JSON body, `Value::Null` when the body is
    /// empty.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.app.clone().call(request(method, uri, cookie, body)).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes))
            })
        };

        (status, json)
    }

    /// Sends a request and returns the raw response
    pub async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.app.clone().call(request(method, uri, cookie, body)).await.unwrap()
    }
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["http://localhost:3000".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: "postgresql://localhost/taskboard_test".to_string(),
            max_connections: 1,
        },
        redis: RedisSettings {
            url: "redis://localhost:6379".to_string(),
        },
        session: SessionConfig::default(),
        cache: CacheConfig::default(),
    }
}
