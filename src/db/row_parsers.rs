//! Decoders from raw SQLite rows. Uuids and timestamps are stored as TEXT.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::access_request::{AccessRequest, RequestStatus, RequestedSystem};
use crate::models::department::Department;
use crate::models::employee::Employee;
use crate::models::notification::Notification;
use crate::models::system::{System, SystemValidator};
use crate::models::user::DbUser;
use crate::models::validation::{ValidationRecord, ValidationStatus, ValidatorKind};

pub fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid {:?}: {}", s, e)))
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339, which is how chrono values are bound
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP format
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date.and_hms_opt(0, 0, 0).ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn text(row: &SqliteRow, col: &str) -> Result<String, AppError> {
    row.try_get(col).map_err(|e| AppError::internal(format!("missing {}: {}", col, e)))
}

fn opt_text(row: &SqliteRow, col: &str) -> Result<Option<String>, AppError> {
    let value: Option<String> = row.try_get(col).map_err(|e| AppError::internal(format!("missing {}: {}", col, e)))?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

fn uuid(row: &SqliteRow, col: &str) -> Result<Uuid, AppError> {
    parse_uuid(&text(row, col)?)
}

fn opt_uuid(row: &SqliteRow, col: &str) -> Result<Option<Uuid>, AppError> {
    opt_text(row, col)?.map(|s| parse_uuid(&s)).transpose()
}

fn datetime(row: &SqliteRow, col: &str) -> Result<DateTime<Utc>, AppError> {
    parse_datetime(&text(row, col)?)
}

fn opt_datetime(row: &SqliteRow, col: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    opt_text(row, col)?.map(|s| parse_datetime(&s)).transpose()
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    Ok(DbUser {
        id: uuid(row, "id")?,
        name: text(row, "name")?,
        email: text(row, "email")?,
        password_hash: text(row, "password_hash")?,
        department_id: opt_uuid(row, "department_id")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
        deleted_at: opt_datetime(row, "deleted_at")?,
    })
}

pub fn department_from_row(row: &SqliteRow) -> Result<Department, AppError> {
    Ok(Department {
        id: uuid(row, "id")?,
        name: text(row, "name")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
    })
}

pub fn employee_from_row(row: &SqliteRow) -> Result<Employee, AppError> {
    Ok(Employee {
        id: uuid(row, "id")?,
        full_name: text(row, "full_name")?,
        email: opt_text(row, "email")?,
        department_id: opt_uuid(row, "department_id")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
    })
}

pub fn system_from_row(row: &SqliteRow) -> Result<System, AppError> {
    Ok(System {
        id: uuid(row, "id")?,
        name: text(row, "name")?,
        description: opt_text(row, "description")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
        deleted_at: opt_datetime(row, "deleted_at")?,
    })
}

fn validator_kind(row: &SqliteRow) -> Result<ValidatorKind, AppError> {
    let kind_s = text(row, "kind")?;
    ValidatorKind::parse(&kind_s).ok_or_else(|| AppError::internal(format!("invalid validator kind: {}", kind_s)))
}

pub fn system_validator_from_row(row: &SqliteRow) -> Result<SystemValidator, AppError> {
    Ok(SystemValidator {
        id: uuid(row, "id")?,
        system_id: uuid(row, "system_id")?,
        kind: validator_kind(row)?,
        approver_id: opt_uuid(row, "approver_id")?,
        department_id: opt_uuid(row, "department_id")?,
        created_at: datetime(row, "created_at")?,
    })
}

pub fn access_request_from_row(row: &SqliteRow) -> Result<AccessRequest, AppError> {
    let status_s = text(row, "status")?;
    let status = RequestStatus::parse(&status_s)
        .ok_or_else(|| AppError::internal(format!("invalid request status: {}", status_s)))?;

    Ok(AccessRequest {
        id: uuid(row, "id")?,
        requester_id: uuid(row, "requester_id")?,
        employee_id: uuid(row, "employee_id")?,
        justification: opt_text(row, "justification")?,
        status,
        finalized_by: opt_uuid(row, "finalized_by")?,
        finalized_at: opt_datetime(row, "finalized_at")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
        deleted_at: opt_datetime(row, "deleted_at")?,
    })
}

pub fn requested_system_from_row(row: &SqliteRow) -> Result<RequestedSystem, AppError> {
    Ok(RequestedSystem {
        id: uuid(row, "id")?,
        request_id: uuid(row, "request_id")?,
        system_id: uuid(row, "system_id")?,
        provisioned_by: opt_uuid(row, "provisioned_by")?,
        provisioned_at: opt_datetime(row, "provisioned_at")?,
    })
}

/// `eligible_approvers` is left empty; it lives in `validation_eligible`.
pub fn validation_from_row(row: &SqliteRow) -> Result<ValidationRecord, AppError> {
    let status_s = text(row, "status")?;
    let status = ValidationStatus::parse(&status_s)
        .ok_or_else(|| AppError::internal(format!("invalid validation status: {}", status_s)))?;

    Ok(ValidationRecord {
        id: uuid(row, "id")?,
        request_id: uuid(row, "request_id")?,
        system_id: uuid(row, "system_id")?,
        kind: validator_kind(row)?,
        approver_id: opt_uuid(row, "approver_id")?,
        department_id: opt_uuid(row, "department_id")?,
        eligible_approvers: Vec::new(),
        status,
        resolved_by: opt_uuid(row, "resolved_by")?,
        resolved_at: opt_datetime(row, "resolved_at")?,
        comment: opt_text(row, "comment")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
    })
}

pub fn notification_from_row(row: &SqliteRow) -> Result<Notification, AppError> {
    Ok(Notification {
        id: uuid(row, "id")?,
        recipient_id: uuid(row, "recipient_id")?,
        event_name: text(row, "event_name")?,
        subject_id: opt_uuid(row, "subject_id")?,
        message: text(row, "message")?,
        created_at: datetime(row, "created_at")?,
        read_at: opt_datetime(row, "read_at")?,
    })
}
