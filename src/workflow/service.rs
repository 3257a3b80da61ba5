use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{can_finalize, finalize_blocker, next_status, reconcile, WorkflowError};
use crate::authz::{can_resolve_validations, require, Actor, Capability, PolicyEvaluator, ResourceContext, Role};
use crate::db::row_parsers::{self, parse_uuid};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, notify_activity, EventBus, RequestContext};
use crate::models::access_request::{
    AccessRequest, AccessRequestCreateRequest, AccessRequestDetail, RequestStatus, RequestedSystem,
};
use crate::models::validation::{
    Decision, ValidationRecord, ValidationResolution, ValidationStatus, ValidatorKind,
};
use crate::utils::{non_blank, utc_now};

const REQUEST_COLUMNS: &str =
    "id, requester_id, employee_id, justification, status, finalized_by, finalized_at, created_at, updated_at, deleted_at";
const VALIDATION_COLUMNS: &str =
    "id, request_id, system_id, kind, approver_id, department_id, status, resolved_by, resolved_at, comment, created_at, updated_at";
const REQUEST_SYSTEM_COLUMNS: &str = "id, request_id, system_id, provisioned_by, provisioned_at";

/// Persists the approval workflow. Every operation takes the acting user
/// explicitly.
#[derive(Clone)]
pub struct WorkflowService {
    pool: SqlitePool,
    events: EventBus,
    policy: Arc<dyn PolicyEvaluator>,
}

impl WorkflowService {
    pub fn new(pool: SqlitePool, events: EventBus, policy: Arc<dyn PolicyEvaluator>) -> Self {
        Self { pool, events, policy }
    }

    /// Creates a request with one validation record per requested system and
    /// configured validator.
    pub async fn submit_request(
        &self,
        actor: &Actor,
        payload: AccessRequestCreateRequest,
        context: Option<RequestContext>,
    ) -> AppResult<AccessRequestDetail> {
        let employee_department = self.employee_department(payload.employee_id).await?;

        let mut ctx = ResourceContext::new().with_resource("employee", payload.employee_id);
        if let Some(department_id) = employee_department {
            ctx = ctx.with_department(department_id);
        }
        require(self.policy.as_ref(), actor, Capability::SubmitRequests, &ctx).await?;

        let mut seen = BTreeSet::new();
        let system_ids: Vec<Uuid> = payload
            .system_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();
        if system_ids.is_empty() {
            return Err(AppError::bad_request("at least one system must be requested"));
        }

        let justification = non_blank(payload.justification.as_deref());
        let now = utc_now();
        let request_id = Uuid::new_v4();

        let mut systems = Vec::with_capacity(system_ids.len());
        let mut records = Vec::new();

        for system_id in &system_ids {
            self.ensure_system_active(*system_id).await?;

            systems.push(RequestedSystem {
                id: Uuid::new_v4(),
                request_id,
                system_id: *system_id,
                provisioned_by: None,
                provisioned_at: None,
            });

            for validator in self.system_validators(*system_id).await? {
                let eligible_approvers = match validator.kind {
                    ValidatorKind::Individual => {
                        let approver_id = validator
                            .approver_id
                            .ok_or_else(|| AppError::internal("individual validator without approver"))?;
                        if !can_resolve_validations(&self.pool, approver_id).await? {
                            return Err(AppError::conflict(format!(
                                "approver {} can no longer resolve validations for system {}",
                                approver_id, system_id
                            )));
                        }
                        Vec::new()
                    }
                    ValidatorKind::Group => {
                        let department_id = validator
                            .department_id
                            .ok_or_else(|| AppError::internal("group validator without department"))?;
                        let members = self.eligible_members(department_id).await?;
                        if members.is_empty() {
                            return Err(AppError::conflict(format!(
                                "department {} has no eligible approvers for system {}",
                                department_id, system_id
                            )));
                        }
                        members
                    }
                };

                records.push(ValidationRecord {
                    id: Uuid::new_v4(),
                    request_id,
                    system_id: *system_id,
                    kind: validator.kind,
                    approver_id: validator.approver_id,
                    department_id: validator.department_id,
                    eligible_approvers,
                    status: ValidationStatus::Pending,
                    resolved_by: None,
                    resolved_at: None,
                    comment: None,
                    created_at: now,
                    updated_at: now,
                });
            }
        }

        if records.is_empty() {
            return Err(AppError::conflict("none of the requested systems has a validator configured"));
        }

        let request = AccessRequest {
            id: request_id,
            requester_id: actor.user_id,
            employee_id: payload.employee_id,
            justification,
            status: reconcile(&records),
            finalized_by: None,
            finalized_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO access_requests (id, requester_id, employee_id, justification, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.id.to_string())
        .bind(request.requester_id.to_string())
        .bind(request.employee_id.to_string())
        .bind(&request.justification)
        .bind(request.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for system in &systems {
            sqlx::query("INSERT INTO request_systems (id, request_id, system_id) VALUES (?, ?, ?)")
                .bind(system.id.to_string())
                .bind(request_id.to_string())
                .bind(system.system_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        for record in &records {
            sqlx::query(
                "INSERT INTO validations (id, request_id, system_id, kind, approver_id, department_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.id.to_string())
            .bind(request_id.to_string())
            .bind(record.system_id.to_string())
            .bind(record.kind.as_str())
            .bind(record.approver_id.map(|id| id.to_string()))
            .bind(record.department_id.map(|id| id.to_string()))
            .bind(record.status.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            for user_id in &record.eligible_approvers {
                sqlx::query("INSERT INTO validation_eligible (validation_id, user_id) VALUES (?, ?)")
                    .bind(record.id.to_string())
                    .bind(user_id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            requester_id = %actor.user_id,
            systems = systems.len(),
            validations = records.len(),
            "access request submitted"
        );

        let approvers: Vec<Uuid> = records.iter().flat_map(|r| r.approvers()).collect();
        notify_activity(&self.events, "submitted", Some(actor.user_id), &request, approvers, context);

        let can_finalize = can_finalize(&request, &systems, actor);
        Ok(AccessRequestDetail {
            request,
            systems,
            validations: records,
            can_finalize,
        })
    }

    /// Applies an approver's decision and reconciles the parent request in
    /// the same transaction. First writer wins.
    pub async fn resolve_validation(
        &self,
        actor: &Actor,
        validation_id: Uuid,
        decision: Decision,
        comment: Option<String>,
        context: Option<RequestContext>,
    ) -> AppResult<ValidationResolution> {
        let mut record = self.fetch_validation(validation_id).await?;
        let request = fetch_request(&self.pool, record.request_id, true).await?;

        if request.deleted_at.is_some() || request.status.is_terminal() {
            return Err(WorkflowError::AlreadyResolved.into());
        }

        if let Err(err) = record.authorize(actor) {
            if let WorkflowError::Unauthorized(reason) = &err {
                tracing::warn!(
                    user_id = %actor.user_id,
                    validation_id = %validation_id,
                    reason = %reason,
                    "validation resolution denied"
                );
            }
            return Err(err.into());
        }

        let comment = non_blank(comment.as_deref());
        let now = utc_now();
        let outcome = decision.outcome();

        let mut tx = self.pool.begin().await?;

        // The conditional update has to be the first statement so SQLite
        // takes the write lock before this transaction reads anything.
        let updated = sqlx::query(
            "UPDATE validations SET status = ?, resolved_by = ?, resolved_at = ?, comment = ?, updated_at = ? \
             WHERE id = ? AND status = 'pending' \
             AND EXISTS (SELECT 1 FROM access_requests r WHERE r.id = validations.request_id \
                         AND r.deleted_at IS NULL AND r.status NOT IN ('rejected', 'finalized'))",
        )
        .bind(outcome.as_str())
        .bind(actor.user_id.to_string())
        .bind(now)
        .bind(&comment)
        .bind(now)
        .bind(validation_id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::info!(validation_id = %validation_id, user_id = %actor.user_id, "validation already resolved");
            return Err(WorkflowError::AlreadyResolved.into());
        }

        let status_rows: Vec<String> = sqlx::query_scalar("SELECT status FROM validations WHERE request_id = ?")
            .bind(request.id.to_string())
            .fetch_all(&mut *tx)
            .await?;
        let statuses = status_rows
            .iter()
            .map(|s| {
                ValidationStatus::parse(s)
                    .ok_or_else(|| AppError::internal(format!("invalid validation status: {}", s)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let current_raw: String = sqlx::query_scalar("SELECT status FROM access_requests WHERE id = ?")
            .bind(request.id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let current = RequestStatus::parse(&current_raw)
            .ok_or_else(|| AppError::internal(format!("invalid request status: {}", current_raw)))?;

        let next = next_status(current, statuses);
        if next != current {
            sqlx::query("UPDATE access_requests SET status = ?, updated_at = ? WHERE id = ?")
                .bind(next.as_str())
                .bind(now)
                .bind(request.id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        // The row is committed; mirror the same transition on the loaded copy.
        record.resolve(actor, decision, comment, now)?;

        let mut updated_request = request.clone();
        updated_request.status = next;
        if next != current {
            updated_request.updated_at = now;
        }

        tracing::info!(
            validation_id = %record.id,
            request_id = %request.id,
            user_id = %actor.user_id,
            decision = ?decision,
            from = %current,
            to = %next,
            "validation resolved"
        );

        notify_activity(
            &self.events,
            outcome.as_str(),
            Some(actor.user_id),
            &record,
            [request.requester_id],
            context.clone(),
        );

        if next != current {
            let mut recipients = vec![request.requester_id];
            if next == RequestStatus::Approved {
                recipients.extend(self.users_with_role(Role::It).await?);
            }
            notify_activity(
                &self.events,
                next.as_str(),
                Some(actor.user_id),
                &updated_request,
                recipients,
                context,
            );
        }

        Ok(ValidationResolution {
            validation: record,
            request: updated_request,
        })
    }

    /// Marks one requested system as provisioned on an approved request.
    pub async fn mark_provisioned(
        &self,
        actor: &Actor,
        request_id: Uuid,
        system_id: Uuid,
        context: Option<RequestContext>,
    ) -> AppResult<RequestedSystem> {
        let ctx = ResourceContext::new().with_resource("access_request", request_id);
        require(self.policy.as_ref(), actor, Capability::ProvisionSystems, &ctx).await?;

        let request = fetch_request(&self.pool, request_id, false).await?;
        if request.status != RequestStatus::Approved {
            return Err(AppError::conflict(format!(
                "request is {}, systems are provisioned after approval",
                request.status
            )));
        }

        let mut entry = sqlx::query(&format!(
            "SELECT {} FROM request_systems WHERE request_id = ? AND system_id = ?",
            REQUEST_SYSTEM_COLUMNS
        ))
        .bind(request_id.to_string())
        .bind(system_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(|row| row_parsers::requested_system_from_row(&row))
        .transpose()?
        .ok_or(WorkflowError::NotFound("requested system"))?;

        let now = utc_now();
        let updated = sqlx::query(
            "UPDATE request_systems SET provisioned_by = ?, provisioned_at = ? WHERE id = ? AND provisioned_at IS NULL",
        )
        .bind(actor.user_id.to_string())
        .bind(now)
        .bind(entry.id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::conflict("system already provisioned"));
        }

        entry.provisioned_by = Some(actor.user_id);
        entry.provisioned_at = Some(now);

        tracing::info!(request_id = %request_id, system_id = %system_id, user_id = %actor.user_id, "system provisioned");
        notify_activity(
            &self.events,
            "provisioned",
            Some(actor.user_id),
            &entry,
            [request.requester_id],
            context,
        );

        Ok(entry)
    }

    /// approved -> finalized, once every requested system is provisioned.
    pub async fn finalize_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
        context: Option<RequestContext>,
    ) -> AppResult<AccessRequest> {
        let ctx = ResourceContext::new().with_resource("access_request", request_id);
        require(self.policy.as_ref(), actor, Capability::FinalizeRequests, &ctx).await?;

        let mut request = fetch_request(&self.pool, request_id, false).await?;
        let systems = self.requested_systems(request_id).await?;

        if let Some(blocker) = finalize_blocker(&request, &systems) {
            return Err(AppError::conflict(format!("request cannot be finalized: {blocker}")));
        }

        let now = utc_now();
        let updated = sqlx::query(
            "UPDATE access_requests SET status = 'finalized', finalized_by = ?, finalized_at = ?, updated_at = ? \
             WHERE id = ? AND status = 'approved' AND deleted_at IS NULL \
             AND NOT EXISTS (SELECT 1 FROM request_systems s WHERE s.request_id = access_requests.id AND s.provisioned_at IS NULL)",
        )
        .bind(actor.user_id.to_string())
        .bind(now)
        .bind(now)
        .bind(request_id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::conflict("request changed while finalizing"));
        }

        let previous = request.clone();
        request.status = RequestStatus::Finalized;
        request.finalized_by = Some(actor.user_id);
        request.finalized_at = Some(now);
        request.updated_at = now;

        tracing::info!(request_id = %request_id, user_id = %actor.user_id, "access request finalized");
        notify_activity(
            &self.events,
            "finalized",
            Some(actor.user_id),
            &request,
            [previous.requester_id],
            context,
        );

        Ok(request)
    }

    /// Pending requests are deleted outright; anything else is soft-deleted
    /// and stays in the audit trail.
    pub async fn withdraw_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
        context: Option<RequestContext>,
    ) -> AppResult<()> {
        let request = fetch_request(&self.pool, request_id, false).await?;
        if request.requester_id != actor.user_id && !actor.is_admin() {
            return Err(AppError::forbidden("only the requester or an admin may withdraw a request"));
        }

        let now = utc_now();
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM access_requests WHERE id = ? AND status = 'pending'")
            .bind(request_id.to_string())
            .execute(&mut *tx)
            .await?;

        let action = if deleted.rows_affected() > 0 {
            "withdrawn"
        } else {
            sqlx::query("UPDATE access_requests SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(now)
                .bind(now)
                .bind(request_id.to_string())
                .execute(&mut *tx)
                .await?;
            "deleted"
        };

        tx.commit().await?;

        tracing::info!(request_id = %request_id, user_id = %actor.user_id, action, "access request removed");
        log_activity_with_context(&self.events, action, Some(actor.user_id), &request, None, context);

        Ok(())
    }

    /// Request with systems, validations and the actor's finalize ability.
    pub async fn load_detail(&self, actor: &Actor, request_id: Uuid) -> AppResult<AccessRequestDetail> {
        let request = fetch_request(&self.pool, request_id, false).await?;
        let systems = self.requested_systems(request_id).await?;
        let validations = self.request_validations(request_id).await?;

        let visible = request.requester_id == actor.user_id
            || actor.can(Capability::ViewAllRequests)
            || validations.iter().any(|v| v.is_eligible(actor.user_id));
        if !visible {
            return Err(AppError::forbidden("not allowed to view this request"));
        }

        let can_finalize = can_finalize(&request, &systems, actor);
        Ok(AccessRequestDetail {
            request,
            systems,
            validations,
            can_finalize,
        })
    }

    /// Own requests, or every request for actors allowed to view all.
    pub async fn list_requests(&self, actor: &Actor, status: Option<RequestStatus>) -> AppResult<Vec<AccessRequest>> {
        let mut sql = format!("SELECT {} FROM access_requests WHERE deleted_at IS NULL", REQUEST_COLUMNS);
        let view_all = actor.can(Capability::ViewAllRequests);
        if !view_all {
            sql.push_str(" AND requester_id = ?");
        }
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query(&sql);
        if !view_all {
            query = query.bind(actor.user_id.to_string());
        }
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_parsers::access_request_from_row).collect()
    }

    /// Pending validations the actor could resolve right now.
    pub async fn pending_for(&self, actor: &Actor) -> AppResult<Vec<ValidationRecord>> {
        if !actor.can(Capability::ResolveValidations) {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM validations v \
             WHERE v.status = 'pending' \
             AND (v.approver_id = ? OR EXISTS (SELECT 1 FROM validation_eligible e WHERE e.validation_id = v.id AND e.user_id = ?)) \
             AND EXISTS (SELECT 1 FROM access_requests r WHERE r.id = v.request_id AND r.deleted_at IS NULL AND r.status NOT IN ('rejected', 'finalized')) \
             ORDER BY v.created_at ASC",
            qualified(VALIDATION_COLUMNS, "v")
        );

        let rows = sqlx::query(&sql)
            .bind(actor.user_id.to_string())
            .bind(actor.user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut records = rows
            .iter()
            .map(row_parsers::validation_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        self.attach_eligible(&mut records).await?;
        Ok(records)
    }

    pub async fn fetch_validation(&self, validation_id: Uuid) -> AppResult<ValidationRecord> {
        let row = sqlx::query(&format!("SELECT {} FROM validations WHERE id = ?", VALIDATION_COLUMNS))
            .bind(validation_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(WorkflowError::NotFound("validation"))?;

        let mut records = vec![row_parsers::validation_from_row(&row)?];
        self.attach_eligible(&mut records).await?;
        Ok(records.remove(0))
    }

    async fn request_validations(&self, request_id: Uuid) -> AppResult<Vec<ValidationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM validations WHERE request_id = ? ORDER BY created_at ASC, system_id ASC",
            VALIDATION_COLUMNS
        ))
        .bind(request_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut records = rows
            .iter()
            .map(row_parsers::validation_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        self.attach_eligible(&mut records).await?;
        Ok(records)
    }

    /// Fills `eligible_approvers` of the group records with one query.
    async fn attach_eligible(&self, records: &mut [ValidationRecord]) -> AppResult<()> {
        let group_ids: Vec<String> = records
            .iter()
            .filter(|r| r.kind == ValidatorKind::Group)
            .map(|r| r.id.to_string())
            .collect();
        if group_ids.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "SELECT validation_id, user_id FROM validation_eligible WHERE validation_id IN ({}) ORDER BY user_id",
            vec!["?"; group_ids.len()].join(", ")
        );
        let mut query = sqlx::query(&sql);
        for id in &group_ids {
            query = query.bind(id);
        }

        let mut eligible: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for row in query.fetch_all(&self.pool).await? {
            let validation_id = parse_uuid(&row.try_get::<String, _>("validation_id")?)?;
            let user_id = parse_uuid(&row.try_get::<String, _>("user_id")?)?;
            eligible.entry(validation_id).or_default().push(user_id);
        }

        for record in records.iter_mut().filter(|r| r.kind == ValidatorKind::Group) {
            record.eligible_approvers = eligible.remove(&record.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn requested_systems(&self, request_id: Uuid) -> AppResult<Vec<RequestedSystem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM request_systems WHERE request_id = ? ORDER BY system_id",
            REQUEST_SYSTEM_COLUMNS
        ))
        .bind(request_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_parsers::requested_system_from_row).collect()
    }

    async fn employee_department(&self, employee_id: Uuid) -> AppResult<Option<Uuid>> {
        let row = sqlx::query("SELECT department_id FROM employees WHERE id = ?")
            .bind(employee_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(WorkflowError::NotFound("employee"))?;

        let department: Option<String> = row.try_get("department_id")?;
        department.map(|s| parse_uuid(&s)).transpose()
    }

    async fn ensure_system_active(&self, system_id: Uuid) -> AppResult<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM systems WHERE id = ? AND deleted_at IS NULL")
            .bind(system_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        if count == 0 {
            return Err(WorkflowError::NotFound("system").into());
        }
        Ok(())
    }

    async fn system_validators(&self, system_id: Uuid) -> AppResult<Vec<crate::models::system::SystemValidator>> {
        let rows = sqlx::query(
            "SELECT id, system_id, kind, approver_id, department_id, created_at FROM system_validators WHERE system_id = ? ORDER BY created_at ASC",
        )
        .bind(system_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_parsers::system_validator_from_row).collect()
    }

    /// Active department members holding a role that may resolve validations.
    async fn eligible_members(&self, department_id: Uuid) -> AppResult<Vec<Uuid>> {
        let roles: Vec<&'static str> = Role::ALL
            .iter()
            .filter(|role| role.grants(Capability::ResolveValidations))
            .map(|role| role.as_str())
            .collect();
        let placeholders = vec!["?"; roles.len()].join(", ");

        let sql = format!(
            "SELECT DISTINCT u.id FROM users u JOIN user_roles r ON r.user_id = u.id \
             WHERE u.department_id = ? AND u.deleted_at IS NULL AND r.role IN ({}) ORDER BY u.id",
            placeholders
        );

        let mut query = sqlx::query_scalar::<_, String>(&sql).bind(department_id.to_string());
        for role in roles {
            query = query.bind(role);
        }

        let ids = query.fetch_all(&self.pool).await?;
        ids.iter().map(|s| parse_uuid(s)).collect()
    }

    async fn users_with_role(&self, role: Role) -> AppResult<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT r.user_id FROM user_roles r JOIN users u ON u.id = r.user_id WHERE r.role = ? AND u.deleted_at IS NULL",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        ids.iter().map(|s| parse_uuid(s)).collect()
    }
}

/// Loads a request; soft-deleted ones count as missing unless asked for.
pub async fn fetch_request(pool: &SqlitePool, request_id: Uuid, include_deleted: bool) -> AppResult<AccessRequest> {
    let mut sql = format!("SELECT {} FROM access_requests WHERE id = ?", REQUEST_COLUMNS);
    if !include_deleted {
        sql.push_str(" AND deleted_at IS NULL");
    }

    let row = sqlx::query(&sql)
        .bind(request_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(WorkflowError::NotFound("access request"))?;

    row_parsers::access_request_from_row(&row)
}

fn qualified(columns: &str, alias: &str) -> String {
    columns
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
