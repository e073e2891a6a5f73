//! # Taskboard API Server Library
//!
//! HTTP surface of the Taskboard backend. Every protected handler builds a
//! [`RequestContext`](taskboard_shared::auth::RequestContext) from the
//! session cookie and the ids in its path, runs its static
//! [`GuardPolicy`](taskboard_shared::auth::GuardPolicy) through the guard
//! chain, and only then touches the stores.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Session cookie extractor
//! - `middleware`: Response middleware
//! - `policies`: Guard policy per operation
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod policies;
pub mod routes;
