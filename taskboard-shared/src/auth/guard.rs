/// Guard chain
///
/// Every protected operation declares a static [`GuardPolicy`]. The chain
/// evaluates it against a [`RequestContext`] in a fixed order:
///
/// 1. identity (session token → user)
/// 2. tenant scope (request reference or session → project id)
/// 3. membership (user × project → role, filtered by `allowed_roles`)
/// 4. entitlement (project → plan, filtered by `allowed_plans`)
///
/// A later step implies the earlier ones: a plan filter needs a membership,
/// a membership needs a tenant, a tenant needs a user. The first failure is
/// returned immediately and no later lookup is made. Each entity is fetched
/// at most once per evaluation; the resolved values are handed back in an
/// [`Access`] the handler reads instead of touching ambient state.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::auth::{GuardChain, GuardPolicy, RequestContext, ScopeHint};
/// use taskboard_shared::models::membership::MemberRole;
/// # use taskboard_shared::session::SessionToken;
///
/// const MOVE_TASK: GuardPolicy = GuardPolicy::roles(MemberRole::WRITERS);
///
/// # async fn example(chain: &GuardChain, token: SessionToken, task_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = RequestContext::new(Some(token)).scoped(ScopeHint::Task(task_id));
/// let access = chain.evaluate(&MOVE_TASK, ctx).await?;
/// println!("acting in project {}", access.project_id()?);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::entitlement::EntitlementPolicy;
use super::identity::IdentityResolver;
use super::membership::MembershipPolicy;
use super::tenant::{ScopeHint, TenantScopeResolver};
use crate::error::StoreError;
use crate::models::membership::{MemberRole, Membership};
use crate::models::project::ProjectPlan;
use crate::models::user::User;
use crate::session::{SessionError, SessionRecord, SessionStore, SessionToken};
use crate::store::Directory;

/// Guard failures
///
/// Everything except `Session` and `Store` is a denial. Callers should not
/// disclose which denial occurred beyond "unauthenticated" versus "forbidden".
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("No active project for this request")]
    NoActiveTenant,

    #[error("Not a member of the project")]
    NotAMember,

    #[error("Role {actual:?} is not allowed for this operation")]
    InsufficientRole { actual: MemberRole },

    #[error("Plan {plan:?} does not include this feature")]
    PlanNotAllowed { plan: ProjectPlan },

    #[error("Session store error: {0}")]
    Session(SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GuardError {
    /// True for authorization outcomes, false for backend failures
    pub fn is_denial(&self) -> bool {
        !matches!(self, GuardError::Session(_) | GuardError::Store(_))
    }
}

impl From<SessionError> for GuardError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => GuardError::Unauthenticated,
            other => GuardError::Session(other),
        }
    }
}

/// Per-operation authorization requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    pub require_auth: bool,
    pub require_tenant: bool,
    /// `Some(&[])` means any member
    pub allowed_roles: Option<&'static [MemberRole]>,
    pub allowed_plans: Option<&'static [ProjectPlan]>,
}

impl GuardPolicy {
    /// No checks at all
    pub const PUBLIC: Self = Self {
        require_auth: false,
        require_tenant: false,
        allowed_roles: None,
        allowed_plans: None,
    };

    /// Signed-in user, no tenant
    pub const AUTHENTICATED: Self = Self {
        require_auth: true,
        ..Self::PUBLIC
    };

    /// Any member of the resolved project
    pub const MEMBER: Self = Self::roles(&[]);

    /// Member of the resolved project holding one of `roles`
    pub const fn roles(roles: &'static [MemberRole]) -> Self {
        Self {
            require_auth: true,
            require_tenant: true,
            allowed_roles: Some(roles),
            allowed_plans: None,
        }
    }

    /// Adds a plan filter; implies a membership check
    pub const fn with_plans(self, plans: &'static [ProjectPlan]) -> Self {
        let allowed_roles = match self.allowed_roles {
            Some(roles) => Some(roles),
            None => Some(&[] as &'static [MemberRole]),
        };
        Self {
            require_auth: true,
            require_tenant: true,
            allowed_roles,
            allowed_plans: Some(plans),
        }
    }

    fn needs_membership(&self) -> bool {
        self.allowed_roles.is_some() || self.allowed_plans.is_some()
    }

    fn needs_tenant(&self) -> bool {
        self.require_tenant || self.needs_membership()
    }

    fn needs_auth(&self) -> bool {
        self.require_auth || self.needs_tenant()
    }
}

/// What the caller brought with the request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub token: Option<SessionToken>,
    pub scope: ScopeHint,
}

impl RequestContext {
    pub fn new(token: Option<SessionToken>) -> Self {
        Self {
            token,
            scope: ScopeHint::None,
        }
    }

    pub fn scoped(mut self, scope: ScopeHint) -> Self {
        self.scope = scope;
        self
    }
}

/// State resolved by a successful evaluation
///
/// Accessors fail with the error the corresponding guard would have produced
/// if the policy did not ask for that step.
#[derive(Clone, Default)]
pub struct Access {
    user: Option<User>,
    token: Option<SessionToken>,
    session: Option<SessionRecord>,
    project_id: Option<Uuid>,
    membership: Option<Membership>,
    plan: Option<ProjectPlan>,
}

impl Access {
    pub fn user(&self) -> Result<&User, GuardError> {
        self.user.as_ref().ok_or(GuardError::Unauthenticated)
    }

    pub fn token(&self) -> Result<&SessionToken, GuardError> {
        self.token.as_ref().ok_or(GuardError::Unauthenticated)
    }

    pub fn session(&self) -> Result<&SessionRecord, GuardError> {
        self.session.as_ref().ok_or(GuardError::Unauthenticated)
    }

    pub fn project_id(&self) -> Result<Uuid, GuardError> {
        self.project_id.ok_or(GuardError::NoActiveTenant)
    }

    pub fn membership(&self) -> Result<&Membership, GuardError> {
        self.membership.as_ref().ok_or(GuardError::NotAMember)
    }

    pub fn plan(&self) -> Option<ProjectPlan> {
        self.plan
    }
}

pub struct GuardChain {
    identity: IdentityResolver,
    tenant: TenantScopeResolver,
    membership: MembershipPolicy,
    entitlement: EntitlementPolicy,
}

impl GuardChain {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn Directory>,
        user_cache_ttl: Duration,
    ) -> Self {
        Self {
            identity: IdentityResolver::new(sessions, directory.clone(), user_cache_ttl),
            tenant: TenantScopeResolver::new(directory.clone()),
            membership: MembershipPolicy::new(directory.clone()),
            entitlement: EntitlementPolicy::new(directory),
        }
    }

    /// Runs the guards `policy` asks for, in order, stopping at the first failure
    pub async fn evaluate(&self, policy: &GuardPolicy, ctx: RequestContext) -> Result<Access, GuardError> {
        let result = self.run(policy, ctx).await;

        match &result {
            Err(err) if err.is_denial() => tracing::debug!(reason = %err, "Request denied"),
            Err(err) => tracing::error!(error = %err, "Guard evaluation failed"),
            Ok(_) => {}
        }

        result
    }

    async fn run(&self, policy: &GuardPolicy, ctx: RequestContext) -> Result<Access, GuardError> {
        let mut access = Access::default();

        if !policy.needs_auth() {
            return Ok(access);
        }

        let token = ctx.token.ok_or(GuardError::Unauthenticated)?;
        let identity = self.identity.resolve(&token).await?;
        let user_id = identity.user.id;
        access.user = Some(identity.user);
        access.token = Some(identity.token);

        if policy.needs_tenant() {
            let project_id = self.tenant.resolve(ctx.scope, &identity.session).await?;
            access.project_id = Some(project_id);

            if let Some(roles) = policy.allowed_roles {
                access.membership = Some(self.membership.authorize(user_id, project_id, roles).await?);
            }

            if let Some(plans) = policy.allowed_plans {
                access.plan = Some(self.entitlement.authorize(project_id, plans).await?);
            }
        }

        access.session = Some(identity.session);
        Ok(access)
    }
}
