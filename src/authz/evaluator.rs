use async_trait::async_trait;

use super::principal::{Actor, ResourceContext};
use super::{Capability, Role};
use crate::errors::{AppError, AppResult};

/// Policy evaluator trait for pluggable authorization logic
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Check if the actor may use a capability on the given resource
    async fn can(&self, actor: &Actor, capability: Capability, ctx: &ResourceContext) -> bool;
}

/// Default policy evaluator over the role/capability table.
///
/// Evaluation order:
/// 1. admin role -> allow
/// 2. a non-manager role granting the capability -> allow
/// 3. manager role granting the capability, and the resource is in the
///    manager's own department (or carries no department) -> allow
/// 4. deny
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicyEvaluator;

impl DefaultPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn department_matches(actor: &Actor, ctx: &ResourceContext) -> bool {
        match ctx.department_id {
            None => true,
            Some(department_id) => actor.department_id == Some(department_id),
        }
    }
}

#[async_trait]
impl PolicyEvaluator for DefaultPolicyEvaluator {
    async fn can(&self, actor: &Actor, capability: Capability, ctx: &ResourceContext) -> bool {
        if actor.is_admin() {
            tracing::debug!(user_id = %actor.user_id, capability = %capability, "admin bypass");
            return true;
        }

        let unscoped = actor
            .roles
            .iter()
            .filter(|role| **role != Role::Manager)
            .any(|role| role.grants(capability));
        if unscoped {
            tracing::debug!(user_id = %actor.user_id, capability = %capability, "role grant");
            return true;
        }

        if actor.has_role(Role::Manager)
            && Role::Manager.grants(capability)
            && Self::department_matches(actor, ctx)
        {
            tracing::debug!(
                user_id = %actor.user_id,
                capability = %capability,
                department_id = ?ctx.department_id,
                "manager grant within department"
            );
            return true;
        }

        tracing::debug!(user_id = %actor.user_id, capability = %capability, "capability denied");
        false
    }
}

/// Fails with `403 forbidden` unless the evaluator allows the capability.
pub async fn require(
    evaluator: &dyn PolicyEvaluator,
    actor: &Actor,
    capability: Capability,
    ctx: &ResourceContext,
) -> AppResult<()> {
    if evaluator.can(actor, capability, ctx).await {
        return Ok(());
    }

    tracing::warn!(
        user_id = %actor.user_id,
        capability = %capability,
        resource_type = ?ctx.resource_type,
        resource_id = ?ctx.resource_id,
        "authorization denied"
    );
    Err(AppError::forbidden(format!("missing capability {capability}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_admin_bypasses_all() {
        let evaluator = DefaultPolicyEvaluator::new();
        let actor = Actor::new(Uuid::new_v4()).with_roles([Role::Admin]);
        let ctx = ResourceContext::new().with_department(Uuid::new_v4());

        assert!(evaluator.can(&actor, Capability::ManageUsers, &ctx).await);
        assert!(evaluator.can(&actor, Capability::FinalizeRequests, &ctx).await);
    }

    #[tokio::test]
    async fn test_role_grant_allows() {
        let evaluator = DefaultPolicyEvaluator::new();
        let actor = Actor::new(Uuid::new_v4()).with_roles([Role::It]);
        let ctx = ResourceContext::new();

        assert!(evaluator.can(&actor, Capability::ProvisionSystems, &ctx).await);
        assert!(!evaluator.can(&actor, Capability::ManageCatalog, &ctx).await);
    }

    #[tokio::test]
    async fn test_manager_scoped_to_own_department() {
        let evaluator = DefaultPolicyEvaluator::new();
        let department = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4())
            .with_roles([Role::Manager])
            .with_department(department);

        let own = ResourceContext::new().with_department(department);
        assert!(evaluator.can(&actor, Capability::SubmitRequests, &own).await);

        let other = ResourceContext::new().with_department(Uuid::new_v4());
        assert!(!evaluator.can(&actor, Capability::SubmitRequests, &other).await);

        assert!(evaluator.can(&actor, Capability::SubmitRequests, &ResourceContext::new()).await);
    }

    #[tokio::test]
    async fn test_hr_is_not_department_scoped() {
        let evaluator = DefaultPolicyEvaluator::new();
        let actor = Actor::new(Uuid::new_v4()).with_roles([Role::Hr, Role::Manager]);
        let ctx = ResourceContext::new().with_department(Uuid::new_v4());

        assert!(evaluator.can(&actor, Capability::SubmitRequests, &ctx).await);
    }

    #[tokio::test]
    async fn test_require_maps_denial_to_forbidden() {
        let evaluator = DefaultPolicyEvaluator::new();
        let actor = Actor::new(Uuid::new_v4());
        let result = require(&evaluator, &actor, Capability::SubmitRequests, &ResourceContext::new()).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
