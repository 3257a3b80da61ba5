use crate::authz::{Actor, Capability};
use crate::models::access_request::{AccessRequest, RequestStatus, RequestedSystem};

/// Why a request cannot be finalized yet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FinalizeBlocker {
    #[error("request is withdrawn")]
    Withdrawn,
    #[error("request is {0}, not approved")]
    NotApproved(RequestStatus),
    #[error("{0} requested system(s) not provisioned")]
    NotProvisioned(usize),
}

/// State-only part of [`can_finalize`]: approved, not withdrawn, every
/// requested system provisioned.
pub fn finalize_blocker(request: &AccessRequest, systems: &[RequestedSystem]) -> Option<FinalizeBlocker> {
    if request.deleted_at.is_some() {
        return Some(FinalizeBlocker::Withdrawn);
    }
    if request.status != RequestStatus::Approved {
        return Some(FinalizeBlocker::NotApproved(request.status));
    }

    let missing = systems.iter().filter(|s| !s.is_provisioned()).count();
    if missing > 0 {
        return Some(FinalizeBlocker::NotProvisioned(missing));
    }

    None
}

/// Read-only: whether `actor` may finalize `request` now.
pub fn can_finalize(request: &AccessRequest, systems: &[RequestedSystem], actor: &Actor) -> bool {
    actor.can(Capability::FinalizeRequests) && finalize_blocker(request, systems).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn request(status: RequestStatus) -> AccessRequest {
        let now = Utc::now();
        AccessRequest {
            id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            justification: None,
            status,
            finalized_by: None,
            finalized_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn system(request_id: Uuid, provisioned: bool) -> RequestedSystem {
        RequestedSystem {
            id: Uuid::new_v4(),
            request_id,
            system_id: Uuid::new_v4(),
            provisioned_by: provisioned.then(Uuid::new_v4),
            provisioned_at: provisioned.then(Utc::now),
        }
    }

    fn it_user() -> Actor {
        Actor::new(Uuid::new_v4()).with_roles([Role::It])
    }

    #[test]
    fn approved_and_fully_provisioned_can_finalize() {
        let req = request(RequestStatus::Approved);
        let systems = vec![system(req.id, true), system(req.id, true)];

        assert!(can_finalize(&req, &systems, &it_user()));
    }

    #[test]
    fn unprovisioned_system_blocks() {
        let req = request(RequestStatus::Approved);
        let systems = vec![system(req.id, true), system(req.id, false)];

        assert!(!can_finalize(&req, &systems, &it_user()));
        assert_eq!(finalize_blocker(&req, &systems), Some(FinalizeBlocker::NotProvisioned(1)));
    }

    #[test]
    fn only_approved_requests_finalize() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Validating,
            RequestStatus::Rejected,
            RequestStatus::Finalized,
        ] {
            let req = request(status);
            let systems = vec![system(req.id, true)];
            assert!(!can_finalize(&req, &systems, &it_user()), "{status}");
        }
    }

    #[test]
    fn finalizing_needs_the_capability() {
        let req = request(RequestStatus::Approved);
        let systems = vec![system(req.id, true)];
        let hr = Actor::new(Uuid::new_v4()).with_roles([Role::Hr]);

        assert!(!can_finalize(&req, &systems, &hr));
    }

    #[test]
    fn withdrawn_requests_never_finalize() {
        let mut req = request(RequestStatus::Approved);
        req.deleted_at = Some(Utc::now());

        assert_eq!(finalize_blocker(&req, &[]), Some(FinalizeBlocker::Withdrawn));
    }
}
