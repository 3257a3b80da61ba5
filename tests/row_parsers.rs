use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use access_hub::db::row_parsers::{access_request_from_row, parse_datetime, parse_uuid, validation_from_row};
use access_hub::models::access_request::RequestStatus;
use access_hub::models::validation::{ValidationStatus, ValidatorKind};

async fn setup_pool() -> SqlitePool {
    SqlitePool::connect("sqlite::memory:").await.expect("connect")
}

#[tokio::test]
async fn parse_access_request_row_text_uuid() {
    let pool = setup_pool().await;
    sqlx::query(
        "CREATE TABLE access_requests (id TEXT, requester_id TEXT, employee_id TEXT, justification TEXT, status TEXT, finalized_by TEXT, finalized_at TEXT, created_at TEXT, updated_at TEXT, deleted_at TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let id = Uuid::new_v4();
    let requester_id = Uuid::new_v4();
    let employee_id = Uuid::new_v4();
    let created = Utc::now().to_rfc3339();

    sqlx::query("INSERT INTO access_requests (id, requester_id, employee_id, justification, status, finalized_by, finalized_at, created_at, updated_at, deleted_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(requester_id.to_string())
        .bind(employee_id.to_string())
        .bind("")
        .bind("validating")
        .bind(Option::<String>::None)
        .bind(Option::<String>::None)
        .bind(created.clone())
        .bind("2026-10-01 09:00:00")
        .bind(Option::<String>::None)
        .execute(&pool)
        .await
        .unwrap();

    let row = sqlx::query("SELECT * FROM access_requests WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();

    let parsed = access_request_from_row(&row).expect("parse");
    assert_eq!(parsed.id, id);
    assert_eq!(parsed.requester_id, requester_id);
    assert_eq!(parsed.employee_id, employee_id);
    assert_eq!(parsed.status, RequestStatus::Validating);
    assert_eq!(parsed.justification, None, "blank text reads as none");
    assert!(parsed.finalized_at.is_none());
    assert_eq!(parsed.updated_at, parse_datetime("2026-10-01T09:00:00Z").unwrap());
}

#[tokio::test]
async fn unknown_status_is_an_error() {
    let pool = setup_pool().await;
    sqlx::query(
        "CREATE TABLE validations (id TEXT, request_id TEXT, system_id TEXT, kind TEXT, approver_id TEXT, department_id TEXT, status TEXT, resolved_by TEXT, resolved_at TEXT, comment TEXT, created_at TEXT, updated_at TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let now = Utc::now().to_rfc3339();
    for (status, kind) in [("approved", "group"), ("maybe", "individual")] {
        sqlx::query("INSERT INTO validations (id, request_id, system_id, kind, department_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(Uuid::new_v4().to_string())
            .bind(Uuid::new_v4().to_string())
            .bind(kind)
            .bind(Uuid::new_v4().to_string())
            .bind(status)
            .bind(&now)
            .bind(&now)
            .execute(&pool)
            .await
            .unwrap();
    }

    let rows = sqlx::query("SELECT * FROM validations ORDER BY status ASC")
        .fetch_all(&pool)
        .await
        .unwrap();

    let approved = validation_from_row(&rows[0]).expect("parse");
    assert_eq!(approved.status, ValidationStatus::Approved);
    assert_eq!(approved.kind, ValidatorKind::Group);
    assert!(approved.eligible_approvers.is_empty());

    assert!(validation_from_row(&rows[1]).is_err());
}

#[test]
fn malformed_uuid_is_an_error() {
    let id = Uuid::new_v4();
    assert_eq!(parse_uuid(&format!(" {} ", id)).unwrap(), id);
    assert!(parse_uuid("not-a-uuid").is_err());
    assert!(parse_uuid("").is_err());
}
