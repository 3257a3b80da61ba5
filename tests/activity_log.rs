mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde_json::{json, Value};
use sqlx::Row;

use access_hub::events::verify_event_chain;
use common::{id_of, spawn_app, wait_for_count};

#[tokio::test]
async fn approvals_are_audited_and_notified() -> Result<()> {
    let app = spawn_app().await?;

    let (admin, admin_id) = app.register("Admin", "admin@example.com").await?;
    let (vera, vera_id) = app.register("Vera", "vera@example.com").await?;
    app.grant(&admin, &vera_id, "validator").await?;

    let system = app.create(&admin, "/systems", json!({ "name": "Payroll" })).await?;
    let system_id = id_of(&system)?;
    app.create(
        &admin,
        &format!("/systems/{}/validators", system_id),
        json!({ "kind": "individual", "approver_id": vera_id }),
    )
    .await?;
    let employee = app.create(&admin, "/employees", json!({ "full_name": "Alan Turing" })).await?;

    let detail = app
        .create(
            &admin,
            "/access-requests",
            json!({ "employee_id": id_of(&employee)?, "system_ids": [system_id] }),
        )
        .await?;
    let request_id = detail["request"]["id"].as_str().context("request id")?.to_string();
    let validation_id = detail["validations"][0]["id"].as_str().context("validation id")?.to_string();

    // The approver is told about the new request.
    let assigned = wait_for_count(
        &app.pool,
        "SELECT COUNT(1) FROM notifications WHERE recipient_id = ? AND event_name = 'access_request.submitted'",
        &vera_id,
        1,
    )
    .await?;
    assert_eq!(assigned, 1);

    let (status, value) = app
        .send(
            "POST",
            &format!("/validations/{}/resolve", validation_id),
            Some(&vera),
            Some(json!({ "decision": "approve", "comment": "  " })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", value);
    assert_eq!(value["request"]["status"], "approved");
    assert_eq!(value["validation"]["comment"], Value::Null, "blank comments are dropped");

    let approved_logs = wait_for_count(
        &app.pool,
        "SELECT COUNT(1) FROM activity_log WHERE subject_id = ? AND event_name = 'access_request.approved'",
        &request_id,
        1,
    )
    .await?;
    assert_eq!(approved_logs, 1);

    let row = sqlx::query("SELECT actor_id, severity, properties FROM activity_log WHERE subject_id = ? AND event_name = 'validation.approved'")
        .bind(&validation_id)
        .fetch_one(&app.pool)
        .await?;
    let actor_id: String = row.try_get("actor_id")?;
    let severity: String = row.try_get("severity")?;
    let properties: String = row.try_get("properties")?;
    assert_eq!(actor_id, vera_id);
    assert_eq!(severity, "critical");
    let properties: Value = serde_json::from_str(&properties)?;
    assert_eq!(properties["payload"]["new"]["status"], "approved");

    // Requester is notified of the decision, the approver is not notified of their own action.
    let requester = wait_for_count(
        &app.pool,
        "SELECT COUNT(1) FROM notifications WHERE recipient_id = ? AND event_name = 'validation.approved'",
        &admin_id,
        1,
    )
    .await?;
    assert_eq!(requester, 1);
    let own: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM notifications WHERE recipient_id = ? AND event_name = 'validation.approved'")
        .bind(&vera_id)
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(own, 0);

    assert_eq!(verify_event_chain(&app.pool).await?, None, "hash chain intact");

    sqlx::query("UPDATE event_store SET payload = '{}' WHERE seq = 2")
        .execute(&app.pool)
        .await?;
    assert_eq!(verify_event_chain(&app.pool).await?, Some(2), "tampering is detected");

    Ok(())
}
