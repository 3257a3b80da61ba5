mod common;

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use access_hub::authz::{Actor, DefaultPolicyEvaluator};
use access_hub::events::init_event_bus;
use access_hub::models::access_request::{AccessRequestCreateRequest, RequestStatus};
use access_hub::models::validation::{Decision, ValidationStatus};
use access_hub::utils::utc_now;
use access_hub::workflow::{WorkflowError, WorkflowService};
use access_hub::errors::AppError;

use common::migrated_pool;

async fn insert_user(pool: &SqlitePool, name: &str, department_id: Option<Uuid>, role: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = utc_now();
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, department_id, created_at, updated_at) VALUES (?, ?, ?, 'unused', ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(name)
    .bind(format!("{}@example.com", name.to_lowercase()))
    .bind(department_id.map(|d| d.to_string()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role, created_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(role)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(id)
}

/// One system guarded by a single group validator on the Security department.
async fn seed(pool: &SqlitePool) -> Result<(Uuid, Uuid, Uuid, Uuid, Uuid)> {
    let now = utc_now();
    let department_id = Uuid::new_v4();
    sqlx::query("INSERT INTO departments (id, name, created_at, updated_at) VALUES (?, 'Security', ?, ?)")
        .bind(department_id.to_string())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

    let hr = insert_user(pool, "Hana", None, "hr").await?;
    let greg = insert_user(pool, "Greg", Some(department_id), "validator").await?;
    let gina = insert_user(pool, "Gina", Some(department_id), "validator").await?;

    let system_id = Uuid::new_v4();
    sqlx::query("INSERT INTO systems (id, name, created_at, updated_at) VALUES (?, 'VPN', ?, ?)")
        .bind(system_id.to_string())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
    sqlx::query(
        "INSERT INTO system_validators (id, system_id, kind, department_id, created_at) VALUES (?, ?, 'group', ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(system_id.to_string())
    .bind(department_id.to_string())
    .bind(now)
    .execute(pool)
    .await?;

    let employee_id = Uuid::new_v4();
    sqlx::query("INSERT INTO employees (id, full_name, created_at, updated_at) VALUES (?, 'Grace Hopper', ?, ?)")
        .bind(employee_id.to_string())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

    Ok((hr, greg, gina, system_id, employee_id))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_group_resolutions_have_exactly_one_winner() -> Result<()> {
    let (pool, _dir) = migrated_pool().await?;
    let (hr, greg, gina, system_id, employee_id) = seed(&pool).await?;

    // Events are fire and forget; keep the receiver alive so sends succeed.
    let (bus, _rx) = init_event_bus();
    let service = WorkflowService::new(pool.clone(), bus, Arc::new(DefaultPolicyEvaluator::new()));

    let hr = Actor::load(&pool, hr).await?;
    let greg = Actor::load(&pool, greg).await?;
    let gina = Actor::load(&pool, gina).await?;

    for round in 0..5 {
        let detail = service
            .submit_request(
                &hr,
                AccessRequestCreateRequest {
                    employee_id,
                    justification: Some(format!("round {}", round)),
                    system_ids: vec![system_id],
                },
                None,
            )
            .await?;
        let validation_id = detail.validations[0].id;
        assert_eq!(detail.validations[0].eligible_approvers.len(), 2);

        let first = {
            let service = service.clone();
            let actor = greg.clone();
            tokio::spawn(async move {
                service
                    .resolve_validation(&actor, validation_id, Decision::Approve, None, None)
                    .await
            })
        };
        let second = {
            let service = service.clone();
            let actor = gina.clone();
            tokio::spawn(async move {
                service
                    .resolve_validation(&actor, validation_id, Decision::Reject, None, None)
                    .await
            })
        };

        let outcomes = [first.await?, second.await?];
        let winners: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        let losers: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().err()).collect();

        assert_eq!(winners.len(), 1, "round {}: exactly one approver wins", round);
        assert_eq!(losers.len(), 1);
        assert!(
            matches!(losers[0], AppError::Workflow(WorkflowError::AlreadyResolved)),
            "round {}: loser got {:?}",
            round,
            losers[0]
        );

        // The stored request agrees with the winning decision.
        let winner = winners[0];
        let stored = service.fetch_validation(validation_id).await?;
        assert_eq!(stored.status, winner.validation.status);
        assert_eq!(stored.resolved_by, winner.validation.resolved_by);

        let status: String = sqlx::query_scalar("SELECT status FROM access_requests WHERE id = ?")
            .bind(detail.request.id.to_string())
            .fetch_one(&pool)
            .await?;
        let expected = match winner.validation.status {
            ValidationStatus::Approved => RequestStatus::Approved,
            _ => RequestStatus::Rejected,
        };
        assert_eq!(status, expected.as_str());
    }

    Ok(())
}
