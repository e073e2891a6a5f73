/// Membership policy
///
/// Checks that the user belongs to the resolved project and, when the
/// operation restricts roles, that the membership's role is one of them.

use std::sync::Arc;
use uuid::Uuid;

use super::guard::GuardError;
use crate::models::membership::{MemberRole, Membership};
use crate::store::Directory;

pub struct MembershipPolicy {
    directory: Arc<dyn Directory>,
}

impl MembershipPolicy {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Returns the membership if it satisfies `allowed`
    ///
    /// An empty `allowed` accepts any role.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        allowed: &[MemberRole],
    ) -> Result<Membership, GuardError> {
        let membership = self
            .directory
            .find_membership(project_id, user_id)
            .await?
            .ok_or(GuardError::NotAMember)?;

        if !allowed.is_empty() && !allowed.contains(&membership.role) {
            return Err(GuardError::InsufficientRole {
                actual: membership.role,
            });
        }

        Ok(membership)
    }
}
