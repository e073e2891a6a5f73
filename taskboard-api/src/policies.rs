/// Guard policy of every protected operation
///
/// | Policy            | Auth | Tenant | Roles          | Plans          |
/// |-------------------|------|--------|----------------|----------------|
/// | `SIGNED_IN`       | yes  | no     |                |                |
/// | `PROJECT_READ`    | yes  | yes    | any member     |                |
/// | `PROJECT_WRITE`   | yes  | yes    | admin, member  |                |
/// | `PROJECT_ADMIN`   | yes  | yes    | admin          |                |
/// | `STATISTICS`      | yes  | yes    | any member     | pro, enterprise|

use taskboard_shared::analytics::ANALYTICS_PLANS;
use taskboard_shared::auth::GuardPolicy;
use taskboard_shared::models::membership::MemberRole;

pub const SIGNED_IN: GuardPolicy = GuardPolicy::AUTHENTICATED;

/// Tenant access check for read-only operations
pub const PROJECT_READ: GuardPolicy = GuardPolicy::MEMBER;

/// Board and document mutations; viewers are excluded
pub const PROJECT_WRITE: GuardPolicy = GuardPolicy::roles(MemberRole::WRITERS);

pub const PROJECT_ADMIN: GuardPolicy = GuardPolicy::roles(MemberRole::ADMINS);

pub const STATISTICS: GuardPolicy = GuardPolicy::MEMBER.with_plans(ANALYTICS_PLANS);
