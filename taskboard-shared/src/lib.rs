//! # Taskboard Shared Library
//!
//! Domain types, persistence seams and the request-authorization pipeline
//! shared by the Taskboard API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `db`: PostgreSQL pool and migrations
//! - `redis`: Redis client wrapper
//! - `session`: Opaque session tokens and the session store
//! - `auth`: Password hashing and the guard chain
//! - `store`: Persistence traits with Postgres and in-memory backends
//! - `board`: Task ordering engine
//! - `projects`: Project and membership rules
//! - `events`: Board change broadcast
//! - `notify`: Outbound notifications
//! - `analytics`: Plan-gated project statistics
//! - `error`: Common storage error type

pub mod analytics;
pub mod auth;
pub mod board;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod notify;
pub mod projects;
pub mod redis;
pub mod session;
pub mod store;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
