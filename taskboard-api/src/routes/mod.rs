/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, logout, current user
/// - `sessions`: The caller's sessions
/// - `projects`: Projects, tenant selection, statistics
/// - `members`: Memberships and invitations
/// - `tasks`: Board listing and task operations
/// - `activity`: Task assignees and comments
/// - `events`: Live board changes over SSE
/// - `documents`: Project documents
///
/// Every handler evaluates a policy from [`crate::policies`] through
/// [`crate::app::AppState::authorize`] before touching any store.

pub mod activity;
pub mod auth;
pub mod documents;
pub mod events;
pub mod health;
pub mod members;
pub mod projects;
pub mod sessions;
pub mod tasks;
