/// Database models for Taskboard
///
/// Each model carries its own SQL in the `impl` block. Query functions take
/// any `PgExecutor`, so the same code runs against the pool or inside a
/// transaction.
///
/// - `user`: Accounts
/// - `project`: Projects (tenants) and their subscription plan
/// - `membership`: User-project relationship with a role
/// - `task`: Board tasks with per-bucket positions
/// - `document`: Project documents
/// - `invitation`: Pending membership invitations
/// - `assignee`: Members assigned to a task
/// - `comment`: Task discussion

pub mod assignee;
pub mod comment;
pub mod document;
pub mod invitation;
pub mod membership;
pub mod project;
pub mod task;
pub mod user;
