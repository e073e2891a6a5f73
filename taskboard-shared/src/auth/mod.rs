/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`identity`]: session token → user, with a short-lived user cache
/// - [`tenant`]: which project a request is scoped to
/// - [`membership`]: role checks within a project
/// - [`entitlement`]: plan checks for gated features
/// - [`guard`]: the chain composing all of the above
///
/// # Pipeline
///
/// ```text
/// RequestContext ─► Identity ─► TenantScope ─► Membership ─► Entitlement ─► Access
///                      │             │              │              │
///                      └─────────────┴──────────────┴──────────────┴─► GuardError
/// ```
///
/// The first failing step ends evaluation; later steps perform no lookups.

pub mod entitlement;
pub mod guard;
pub mod identity;
pub mod membership;
pub mod password;
pub mod tenant;

pub use guard::{Access, GuardChain, GuardError, GuardPolicy, RequestContext};
pub use identity::{Identity, IdentityResolver, UserCache};
pub use tenant::ScopeHint;
