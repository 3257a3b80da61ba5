use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::WorkflowError;
use crate::authz::{Actor, Capability};
use crate::models::validation::{Decision, ValidationRecord, ValidationStatus, ValidatorKind};

impl ValidationRecord {
    pub fn is_pending(&self) -> bool {
        self.status == ValidationStatus::Pending
    }

    /// Individual records accept only their approver; group records accept
    /// any member of the eligible set.
    pub fn is_eligible(&self, user_id: Uuid) -> bool {
        match self.kind {
            ValidatorKind::Individual => self.approver_id == Some(user_id),
            ValidatorKind::Group => self.eligible_approvers.contains(&user_id),
        }
    }

    /// Every user who may resolve this record.
    pub fn approvers(&self) -> Vec<Uuid> {
        match self.kind {
            ValidatorKind::Individual => self.approver_id.into_iter().collect(),
            ValidatorKind::Group => self.eligible_approvers.clone(),
        }
    }

    /// Checks whether `actor` may resolve the record right now.
    pub fn authorize(&self, actor: &Actor) -> Result<(), WorkflowError> {
        if !self.is_pending() {
            return Err(WorkflowError::AlreadyResolved);
        }

        if !actor.can(Capability::ResolveValidations) {
            return Err(WorkflowError::Unauthorized(format!(
                "missing capability {}",
                Capability::ResolveValidations
            )));
        }

        if !self.is_eligible(actor.user_id) {
            let reason = match self.kind {
                ValidatorKind::Individual => "not the assigned approver",
                ValidatorKind::Group => "not in the eligible approver group",
            };
            return Err(WorkflowError::Unauthorized(reason.to_string()));
        }

        Ok(())
    }

    /// Applies a decision. The record is left untouched on error.
    pub fn resolve(
        &mut self,
        actor: &Actor,
        decision: Decision,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        self.authorize(actor)?;

        self.status = decision.outcome();
        self.resolved_by = Some(actor.user_id);
        self.resolved_at = Some(now);
        self.comment = comment;
        self.updated_at = now;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use crate::models::access_request::RequestStatus;
    use crate::workflow::reconcile;

    fn record(kind: ValidatorKind, approver: Option<Uuid>, eligible: Vec<Uuid>) -> ValidationRecord {
        let now = Utc::now();
        ValidationRecord {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            system_id: Uuid::new_v4(),
            kind,
            approver_id: approver,
            department_id: match kind {
                ValidatorKind::Group => Some(Uuid::new_v4()),
                ValidatorKind::Individual => None,
            },
            eligible_approvers: eligible,
            status: ValidationStatus::Pending,
            resolved_by: None,
            resolved_at: None,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn validator() -> Actor {
        Actor::new(Uuid::new_v4()).with_roles([Role::Validator])
    }

    #[test]
    fn individual_approver_resolves() {
        let actor = validator();
        let mut rec = record(ValidatorKind::Individual, Some(actor.user_id), Vec::new());
        let now = Utc::now();

        rec.resolve(&actor, Decision::Approve, Some("ok".into()), now).unwrap();

        assert_eq!(rec.status, ValidationStatus::Approved);
        assert_eq!(rec.resolved_by, Some(actor.user_id));
        assert_eq!(rec.resolved_at, Some(now));
        assert_eq!(rec.comment.as_deref(), Some("ok"));
    }

    #[test]
    fn second_resolution_is_already_resolved() {
        let actor = validator();
        let mut rec = record(ValidatorKind::Individual, Some(actor.user_id), Vec::new());

        rec.resolve(&actor, Decision::Reject, None, Utc::now()).unwrap();
        let second = rec.resolve(&actor, Decision::Approve, None, Utc::now());

        assert_eq!(second, Err(WorkflowError::AlreadyResolved));
        assert_eq!(rec.status, ValidationStatus::Rejected);
    }

    #[test]
    fn group_is_first_come_first_served() {
        let first = validator();
        let second = validator();
        let mut rec = record(ValidatorKind::Group, None, vec![first.user_id, second.user_id]);

        rec.resolve(&first, Decision::Approve, None, Utc::now()).unwrap();

        assert_eq!(
            rec.resolve(&second, Decision::Reject, None, Utc::now()),
            Err(WorkflowError::AlreadyResolved)
        );
        assert_eq!(rec.resolved_by, Some(first.user_id));
    }

    #[test]
    fn non_member_is_unauthorized_and_record_unchanged() {
        let member = validator();
        let outsider = validator();
        let mut rec = record(ValidatorKind::Group, None, vec![member.user_id]);
        let before = rec.clone();

        let result = rec.resolve(&outsider, Decision::Approve, Some("sneaky".into()), Utc::now());

        assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
        assert_eq!(rec, before);
    }

    #[test]
    fn eligibility_without_capability_is_unauthorized() {
        let actor = Actor::new(Uuid::new_v4()).with_roles([Role::Hr]);
        let rec = record(ValidatorKind::Individual, Some(actor.user_id), Vec::new());

        assert!(matches!(rec.authorize(&actor), Err(WorkflowError::Unauthorized(_))));
    }

    #[test]
    fn admin_still_needs_to_be_eligible() {
        let admin = Actor::new(Uuid::new_v4()).with_roles([Role::Admin]);
        let rec = record(ValidatorKind::Individual, Some(Uuid::new_v4()), Vec::new());

        assert!(matches!(rec.authorize(&admin), Err(WorkflowError::Unauthorized(_))));
    }

    #[test]
    fn three_record_request_reaches_approval() {
        let individual = validator();
        let group_a = validator();
        let group_b = validator();

        let mut records = vec![
            record(ValidatorKind::Individual, Some(individual.user_id), Vec::new()),
            record(ValidatorKind::Group, None, vec![group_a.user_id]),
            record(ValidatorKind::Group, None, vec![group_b.user_id]),
        ];

        records[0].resolve(&individual, Decision::Approve, None, Utc::now()).unwrap();
        records[1].resolve(&group_a, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(reconcile(&records), RequestStatus::Validating);

        records[2].resolve(&group_b, Decision::Approve, None, Utc::now()).unwrap();
        assert_eq!(reconcile(&records), RequestStatus::Approved);
    }
}
